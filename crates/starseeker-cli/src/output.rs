//! Plain-text rendering of gates and sync status.

use starseeker_core::models::{FavoriteSet, Gate};
use starseeker_core::sync::{GateSync, SyncUpdate};
use starseeker_core::utils::{format_distance, truncate_string};

/// Width of the name column in gate listings.
const NAME_WIDTH: usize = 28;

pub fn gate_line(gate: &Gate, favorites: &FavoriteSet) -> String {
    let marker = if favorites.contains(&gate.code) { "*" } else { " " };
    format!(
        "{} {:<6} {:<width$} {:>3} links",
        marker,
        gate.code,
        truncate_string(&gate.name, NAME_WIDTH),
        gate.link_count(),
        width = NAME_WIDTH,
    )
}

pub fn gate_detail(gate: &Gate, favorite: bool) -> String {
    let mut out = format!("{}{}\n", gate.label(), if favorite { "  [favorite]" } else { "" });
    if gate.links.is_empty() {
        out.push_str("  no outgoing links\n");
    }
    for link in &gate.links {
        out.push_str(&format!("  -> {:<6} {}\n", link.target_code, format_distance(link.distance)));
    }
    out
}

pub fn status_lines(sync: &GateSync) -> Vec<String> {
    let mut lines = vec![format!("state: {}", sync.state().label())];
    match sync.snapshot() {
        Some(snapshot) => lines.push(format!(
            "gates: {} (updated {})",
            snapshot.len(),
            snapshot.age_display()
        )),
        None => lines.push("gates: none cached".to_string()),
    }
    if let Some(captured_at) = sync.state().captured_at() {
        lines.push(format!("captured: {}", captured_at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if sync.is_stale() {
        lines.push(format!("stale: older than {} minutes", sync.ttl().as_secs() / 60));
    }
    if let Some(error) = sync.last_error() {
        lines.push(format!("error: {}", error));
    }
    lines
}

pub fn update_line(update: &SyncUpdate) -> String {
    match update {
        SyncUpdate::Updated { count } => format!("updated: {} gates", count),
        SyncUpdate::Superseded => "ignored an out-of-date response".to_string(),
        SyncUpdate::Failed { error } => error.clone(),
        SyncUpdate::Online { refreshing: true } => "back online, refreshing".to_string(),
        SyncUpdate::Online { refreshing: false } => "online".to_string(),
        SyncUpdate::Offline => "offline, serving cached gates".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starseeker_core::models::Link;

    fn sol() -> Gate {
        Gate {
            uuid: String::new(),
            code: "SOL".to_string(),
            name: "Sol".to_string(),
            created_at: 0,
            updated_at: None,
            links: vec![Link::new("RAN", 100.0), Link::new("PRX", 90.5)],
        }
    }

    #[test]
    fn test_gate_line_marks_favorites() {
        let favorites: FavoriteSet = ["SOL"].into_iter().collect();
        let line = gate_line(&sol(), &favorites);
        assert!(line.starts_with("* SOL"));
        assert!(line.ends_with("2 links"));

        let plain = gate_line(&sol(), &FavoriteSet::new());
        assert!(plain.starts_with("  SOL"));
    }

    #[test]
    fn test_gate_detail_lists_links() {
        let detail = gate_detail(&sol(), true);
        assert!(detail.starts_with("Sol (SOL)  [favorite]"));
        assert!(detail.contains("-> RAN    100.00 HU"));
        assert!(detail.contains("-> PRX    90.50 HU"));
    }

    #[test]
    fn test_update_line() {
        assert_eq!(update_line(&SyncUpdate::Updated { count: 3 }), "updated: 3 gates");
        assert_eq!(update_line(&SyncUpdate::Offline), "offline, serving cached gates");
    }
}
