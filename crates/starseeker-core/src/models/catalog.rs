//! Catalog snapshots and favorite sets.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Gate;

/// An immutable capture of the whole gate catalog at one instant.
///
/// Every gate in the snapshot shares `captured_at`. A newer fetch produces a
/// new snapshot that replaces this one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub gates: Vec<Gate>,
    pub captured_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Capture `gates` as of now.
    pub fn new(gates: Vec<Gate>) -> Self {
        Self::captured(gates, Utc::now())
    }

    pub fn captured(gates: Vec<Gate>, captured_at: DateTime<Utc>) -> Self {
        Self { gates, captured_at }
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Strictly younger than `ttl` at `now`. An age equal to the TTL is stale.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.captured_at).to_std() {
            Ok(age) => age < ttl,
            // Captured "in the future" (clock skew); treat as brand new
            Err(_) => true,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.captured_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        age_display(self.age_minutes())
    }
}

/// Human-readable age for status lines: "just now", "5m ago", "2h ago", "3d ago".
pub fn age_display(minutes: i64) -> String {
    if minutes < 1 {
        // Also covers clock skew (negative ages)
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Gate codes the user has marked.
///
/// Membership is what matters; insertion order is kept so the persisted
/// list reads the way the user built it. A code may point at a gate that is
/// no longer in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteSet {
    codes: Vec<String>,
}

impl FavoriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    /// Returns false if the code was already present.
    pub fn insert(&mut self, code: impl Into<String>) -> bool {
        let code = code.into();
        if self.contains(&code) {
            return false;
        }
        self.codes.push(code);
        true
    }

    /// Returns false if the code was not present.
    pub fn remove(&mut self, code: &str) -> bool {
        let before = self.codes.len();
        self.codes.retain(|c| c != code);
        self.codes.len() != before
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    /// Favorites whose gate is missing from `gates`.
    pub fn orphans<'a>(&'a self, gates: &[Gate]) -> Vec<&'a str> {
        self.iter()
            .filter(|code| !gates.iter().any(|g| g.code == *code))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = FavoriteSet::new();
        for code in iter {
            set.insert(code);
        }
        set
    }
}

/// Apply the favorites filter (when given) and then the search query.
pub fn filter_gates<'a>(
    gates: &'a [Gate],
    query: &str,
    favorites_only: Option<&FavoriteSet>,
) -> Vec<&'a Gate> {
    gates
        .iter()
        .filter(|g| favorites_only.map_or(true, |favs| favs.contains(&g.code)))
        .filter(|g| g.matches_search(query))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn gate(code: &str, name: &str) -> Gate {
        Gate {
            uuid: String::new(),
            code: code.to_string(),
            name: name.to_string(),
            created_at: 0,
            updated_at: None,
            links: vec![],
        }
    }

    #[test]
    fn test_is_fresh_boundary() {
        let ttl = Duration::from_secs(300);
        let captured = Utc::now();
        let snapshot = CatalogSnapshot::captured(vec![], captured);

        assert!(snapshot.is_fresh_at(captured, ttl));
        assert!(snapshot.is_fresh_at(captured + ChronoDuration::seconds(299), ttl));
        assert!(!snapshot.is_fresh_at(captured + ChronoDuration::seconds(300), ttl));
        assert!(!snapshot.is_fresh_at(captured + ChronoDuration::minutes(61), ttl));
    }

    #[test]
    fn test_is_fresh_with_clock_skew() {
        let now = Utc::now();
        let snapshot = CatalogSnapshot::captured(vec![], now + ChronoDuration::minutes(2));
        assert!(snapshot.is_fresh_at(now, Duration::from_secs(60)));
    }

    #[test]
    fn test_age_display() {
        assert_eq!(age_display(-3), "just now");
        assert_eq!(age_display(0), "just now");
        assert_eq!(age_display(5), "5m ago");
        assert_eq!(age_display(89), "1h ago");
        assert_eq!(age_display(90), "2h ago");
        assert_eq!(age_display(1440 + 60), "1d ago");
        assert_eq!(age_display(1440 + 12 * 60), "2d ago");
    }

    #[test]
    fn test_snapshot_age_display_just_now() {
        let snapshot = CatalogSnapshot::new(vec![gate("SOL", "Sol")]);
        assert_eq!(snapshot.age_display(), "just now");
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_favorite_set_no_duplicates() {
        let mut favs = FavoriteSet::new();
        assert!(favs.insert("SOL"));
        assert!(!favs.insert("SOL"));
        assert!(favs.insert("SIR"));
        assert_eq!(favs.iter().collect::<Vec<_>>(), vec!["SOL", "SIR"]);

        assert!(favs.remove("SOL"));
        assert!(!favs.remove("SOL"));
        assert_eq!(favs.len(), 1);
    }

    #[test]
    fn test_favorite_set_serializes_as_plain_list() {
        let favs: FavoriteSet = ["SOL", "SIR", "SOL"].into_iter().collect();
        assert_eq!(serde_json::to_string(&favs).unwrap(), r#"["SOL","SIR"]"#);

        let parsed: FavoriteSet = serde_json::from_str(r#"["PRX"]"#).unwrap();
        assert!(parsed.contains("PRX"));
    }

    #[test]
    fn test_orphaned_favorites() {
        let favs: FavoriteSet = ["SOL", "GONE"].into_iter().collect();
        let gates = vec![gate("SOL", "Sol")];
        assert_eq!(favs.orphans(&gates), vec!["GONE"]);
    }

    #[test]
    fn test_filter_gates_favorites_then_search() {
        let gates = vec![
            gate("SOL", "Sol"),
            gate("SIR", "Sirius"),
            gate("PRX", "Proxima"),
        ];
        let favs: FavoriteSet = ["SIR", "PRX"].into_iter().collect();

        let all = filter_gates(&gates, "", None);
        assert_eq!(all.len(), 3);

        let searched: Vec<_> = filter_gates(&gates, "s", None)
            .into_iter()
            .map(|g| g.code.as_str())
            .collect();
        assert_eq!(searched, vec!["SOL", "SIR"]);

        let fav_search: Vec<_> = filter_gates(&gates, "s", Some(&favs))
            .into_iter()
            .map(|g| g.code.as_str())
            .collect();
        assert_eq!(fav_search, vec!["SIR"]);
    }
}
