//! Session wiring: one store, one sync controller, one favorites store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use starseeker_core::api::ApiClient;
use starseeker_core::cache::{CacheManager, FavoritesStore, FileStore, PersistentStore};
use starseeker_core::config::Config;
use starseeker_core::sync::{ConnectivityHub, GateSync, SyncUpdate};

/// Local persistence only. Opening it never needs the service URL.
pub struct Storage {
    pub cache: CacheManager,
    pub favorites: FavoritesStore,
}

impl Storage {
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?data_dir, "Data directory configured");

        let store: Arc<dyn PersistentStore> = Arc::new(FileStore::new(data_dir)?);
        Ok(Self {
            cache: CacheManager::new(Arc::clone(&store)),
            favorites: FavoritesStore::new(store),
        })
    }
}

/// Build the service client from the configured URL and key.
pub fn connect(config: &Config) -> Result<ApiClient> {
    let client = ApiClient::new(config.api_url()?)?;
    match config.api_key {
        Some(ref key) => Ok(client.with_api_key(key.clone())),
        None => {
            warn!("No API key configured");
            Ok(client)
        }
    }
}

pub struct Session {
    pub config: Config,
    pub client: ApiClient,
    pub cache: CacheManager,
    pub sync: GateSync,
    pub favorites: FavoritesStore,
    pub hub: Arc<ConnectivityHub>,
}

impl Session {
    /// Build the session without touching the network.
    pub fn open(config: Config) -> Result<Self> {
        let Storage { cache, favorites } = Storage::open(&config)?;
        let client = connect(&config)?;
        let sync = GateSync::new(cache.clone(), Arc::new(client.clone()))
            .with_ttl(config.cache_ttl());

        Ok(Self {
            config,
            client,
            cache,
            sync,
            favorites,
            // Assume online until something says otherwise
            hub: Arc::new(ConnectivityHub::new(true)),
        })
    }

    /// Run the initial load and wait for the background revalidation, so a
    /// one-shot command leaves the cache refreshed.
    pub async fn start_and_settle(&mut self) -> Vec<SyncUpdate> {
        self.sync.start(self.hub.as_ref()).await;
        self.settle().await
    }

    pub async fn settle(&mut self) -> Vec<SyncUpdate> {
        let mut updates = self.sync.process_pending().await;
        while self.sync.pending_fetches() > 0 {
            match self.sync.next_event().await {
                Some(update) => updates.push(update),
                None => break,
            }
        }
        updates
    }
}
