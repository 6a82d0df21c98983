//! Starseeker core library.
//!
//! Keeps a local copy of the hyperspace gate catalog in step with the gates
//! service: a TTL-aware cache, stale-while-revalidate loading, refreshes on
//! reconnection, and a persisted set of favorite gates.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod sync;
pub mod utils;

pub use api::{ApiClient, ApiError, CatalogSource};
pub use cache::{CacheManager, CacheRecord, FavoritesStore, FileStore, MemoryStore, PersistentStore};
pub use config::Config;
pub use models::{CatalogSnapshot, FavoriteSet, Gate, Link};
pub use sync::{ConnectivityHub, GateSync, SyncState, SyncUpdate};
