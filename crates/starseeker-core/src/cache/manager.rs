use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{CatalogSnapshot, Gate};

use super::store::{PersistentStore, StorageError};

/// Store key holding the serialized gate list.
pub const GATES_KEY: &str = "@starseeker:gates";

/// Store key holding the capture time in epoch milliseconds.
pub const GATES_TIMESTAMP_KEY: &str = "@starseeker:gates_timestamp";

/// Consider a cached catalog stale after 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// What the cache currently holds. Either a complete snapshot or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheRecord {
    pub snapshot: Option<CatalogSnapshot>,
}

impl CacheRecord {
    pub fn absent() -> Self {
        Self { snapshot: None }
    }

    pub fn present(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.captured_at)
    }

    pub fn gates(&self) -> &[Gate] {
        self.snapshot.as_ref().map(|s| s.gates.as_slice()).unwrap_or(&[])
    }
}

/// Freshness is a caller policy; `load` never filters on it.
/// `now - captured_at == ttl` is already stale.
pub fn is_fresh(record: &CacheRecord, now: DateTime<Utc>, ttl: Duration) -> bool {
    record
        .snapshot
        .as_ref()
        .map_or(false, |s| s.is_fresh_at(now, ttl))
}

/// Owns the durable catalog snapshot and its capture time.
///
/// Storage failures never escape: reads degrade to an absent record and
/// writes are logged and dropped. The cache is an optimization, the remote
/// service is the source of truth.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn PersistentStore>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Persist `snapshot`. Returns whether it was written.
    ///
    /// The timestamp is removed first and written last, so an interrupted
    /// save leaves the record absent rather than pairing new gates with an
    /// old timestamp (or the reverse).
    pub async fn save(&self, snapshot: &CatalogSnapshot) -> bool {
        match self.try_save(snapshot).await {
            Ok(()) => {
                debug!(count = snapshot.len(), "Cached gate catalog");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to cache gate catalog");
                false
            }
        }
    }

    async fn try_save(&self, snapshot: &CatalogSnapshot) -> Result<(), StorageError> {
        let gates = serde_json::to_vec(&snapshot.gates)?;
        let timestamp = snapshot.captured_at.timestamp_millis().to_string();

        self.store.delete(GATES_TIMESTAMP_KEY).await?;
        self.store.set(GATES_KEY, &gates).await?;
        self.store.set(GATES_TIMESTAMP_KEY, timestamp.as_bytes()).await?;
        Ok(())
    }

    /// Read the cached snapshot. Missing or unreadable data is `absent`.
    pub async fn load(&self) -> CacheRecord {
        match self.try_load().await {
            Ok(Some(snapshot)) => {
                debug!(
                    count = snapshot.len(),
                    age = %snapshot.age_display(),
                    "Loaded cached gate catalog"
                );
                CacheRecord::present(snapshot)
            }
            Ok(None) => CacheRecord::absent(),
            Err(e) => {
                warn!(error = %e, "Failed to load cached gate catalog");
                CacheRecord::absent()
            }
        }
    }

    async fn try_load(&self) -> Result<Option<CatalogSnapshot>, StorageError> {
        let Some(timestamp) = self.store.get(GATES_TIMESTAMP_KEY).await? else {
            return Ok(None);
        };
        let Some(gates) = self.store.get(GATES_KEY).await? else {
            return Ok(None);
        };

        let captured_at = parse_timestamp(&timestamp)?;
        let gates: Vec<Gate> = serde_json::from_slice(&gates)?;
        Ok(Some(CatalogSnapshot::captured(gates, captured_at)))
    }

    /// Remove the cached snapshot (logout/reset).
    pub async fn clear(&self) {
        for key in [GATES_TIMESTAMP_KEY, GATES_KEY] {
            if let Err(e) = self.store.delete(key).await {
                warn!(key = key, error = %e, "Failed to clear cache entry");
            }
        }
    }
}

fn parse_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>, StorageError> {
    let corrupt = |reason: &str| StorageError::Corrupt {
        key: GATES_TIMESTAMP_KEY.to_string(),
        reason: reason.to_string(),
    };

    let text = std::str::from_utf8(bytes).map_err(|_| corrupt("not UTF-8"))?;
    let millis: i64 = text.trim().parse().map_err(|_| corrupt("not an integer"))?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| corrupt("out of range"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::models::Link;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    fn gate(code: &str) -> Gate {
        Gate {
            uuid: format!("uuid-{}", code),
            code: code.to_string(),
            name: code.to_lowercase(),
            created_at: 1_700_000_000_000,
            updated_at: Some(1_700_000_100_000),
            links: vec![Link::new("SOL", 100.0)],
        }
    }

    /// Delegates to a MemoryStore but fails every write to one key.
    struct FailingStore {
        inner: MemoryStore,
        fail_key: &'static str,
    }

    #[async_trait]
    impl PersistentStore for FailingStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
            if key == self.fail_key {
                return Err(StorageError::Backend("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key).await
        }
    }

    #[test]
    fn test_is_fresh() {
        let now = Utc::now();
        let ttl = DEFAULT_TTL;

        assert!(!is_fresh(&CacheRecord::absent(), now, ttl));

        let record = CacheRecord::present(CatalogSnapshot::captured(vec![], now));
        assert!(is_fresh(&record, now, ttl));
        assert!(is_fresh(&record, now + ChronoDuration::seconds(299), ttl));
        assert!(!is_fresh(&record, now + ChronoDuration::seconds(300), ttl));
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let gates = vec![gate("SOL"), gate("SIR")];

        let before = Utc::now().timestamp_millis();
        assert!(cache.save(&CatalogSnapshot::new(gates.clone())).await);
        let after = Utc::now().timestamp_millis();

        let record = cache.load().await;
        assert_eq!(record.gates(), gates.as_slice());
        let captured = record.captured_at().unwrap().timestamp_millis();
        assert!(captured >= before && captured <= after);
    }

    #[tokio::test]
    async fn test_load_empty_store_is_absent() {
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        assert!(cache.load().await.is_absent());
    }

    #[tokio::test]
    async fn test_load_ignores_ttl() {
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        let captured_at = Utc::now() - ChronoDuration::days(3);
        let old = CatalogSnapshot::captured(vec![gate("SOL")], captured_at);
        cache.save(&old).await;

        let record = cache.load().await;
        assert_eq!(record.gates().len(), 1);
        assert!(!is_fresh(&record, Utc::now(), DEFAULT_TTL));
    }

    #[tokio::test]
    async fn test_corrupt_entries_load_as_absent() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheManager::new(store.clone());

        store.set(GATES_KEY, b"not json").await.unwrap();
        store.set(GATES_TIMESTAMP_KEY, b"1700000000000").await.unwrap();
        assert!(cache.load().await.is_absent());

        store.set(GATES_KEY, b"[]").await.unwrap();
        store.set(GATES_TIMESTAMP_KEY, b"yesterday").await.unwrap();
        assert!(cache.load().await.is_absent());

        store.delete(GATES_TIMESTAMP_KEY).await.unwrap();
        assert!(cache.load().await.is_absent());
    }

    #[tokio::test]
    async fn test_failed_timestamp_write_never_pairs_with_old_timestamp() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::new(),
            fail_key: GATES_TIMESTAMP_KEY,
        });
        // Seed an older, consistent pair directly.
        store.inner.set(GATES_KEY, b"[]").await.unwrap();
        store.inner.set(GATES_TIMESTAMP_KEY, b"1700000000000").await.unwrap();

        let cache = CacheManager::new(store);
        assert!(!cache.save(&CatalogSnapshot::new(vec![gate("SOL")])).await);

        // New gates without a timestamp must read as absent, not as stale-new.
        assert!(cache.load().await.is_absent());
    }

    #[tokio::test]
    async fn test_failed_gates_write_is_swallowed() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::new(),
            fail_key: GATES_KEY,
        });
        let cache = CacheManager::new(store);

        assert!(!cache.save(&CatalogSnapshot::new(vec![gate("SOL")])).await);
        assert!(cache.load().await.is_absent());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = CacheManager::new(Arc::new(MemoryStore::new()));
        cache.save(&CatalogSnapshot::new(vec![gate("SOL")])).await;
        assert!(!cache.load().await.is_absent());

        cache.clear().await;
        assert!(cache.load().await.is_absent());
    }
}
