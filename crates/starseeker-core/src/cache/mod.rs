//! Local caching module for offline data access.
//!
//! This module provides:
//! - `PersistentStore`: the key/value seam, with `FileStore` and `MemoryStore`
//! - `CacheManager`: the cached gate catalog and its capture time
//! - `FavoritesStore`: the user's favorite gate codes
//!
//! A cached catalog is considered stale after 5 minutes, but staleness is
//! decided by the caller; the cache itself never hides old data.

pub mod favorites;
pub mod manager;
pub mod store;

pub use favorites::{FavoritesStore, FAVORITES_KEY};
pub use manager::{is_fresh, CacheManager, CacheRecord, DEFAULT_TTL, GATES_KEY, GATES_TIMESTAMP_KEY};
pub use store::{FileStore, MemoryStore, PersistentStore, StorageError};
