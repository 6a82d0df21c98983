use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::FavoriteSet;

use super::store::{PersistentStore, StorageError};

/// Store key holding the favorite gate codes as a JSON array.
pub const FAVORITES_KEY: &str = "@starseeker:favorites";

/// Persisted set of favorite gate codes.
///
/// Every `toggle` reads, modifies and writes the whole set. Two toggles
/// issued without awaiting the first can race and lose an update, so callers
/// must await each toggle before issuing the next. The store does not queue.
#[derive(Clone)]
pub struct FavoritesStore {
    store: Arc<dyn PersistentStore>,
}

impl FavoritesStore {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Current favorites. Missing or corrupt data is an empty set.
    pub async fn list(&self) -> FavoriteSet {
        match self.try_list().await {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!(error = %e, "Failed to load favorites");
                FavoriteSet::new()
            }
        }
    }

    async fn try_list(&self) -> Result<FavoriteSet, StorageError> {
        match self.store.get(FAVORITES_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(FavoriteSet::new()),
        }
    }

    pub async fn is_favorite(&self, code: &str) -> bool {
        self.list().await.contains(code)
    }

    /// Flip membership of `code` and persist. Returns the new status:
    /// true if it is now a favorite.
    pub async fn toggle(&self, code: &str) -> bool {
        let mut favorites = self.list().await;

        let now_favorite = if favorites.remove(code) {
            false
        } else {
            favorites.insert(code);
            true
        };

        if let Err(e) = self.save(&favorites).await {
            warn!(code = code, error = %e, "Failed to save favorites");
        }
        debug!(code = code, favorite = now_favorite, "Toggled favorite");
        now_favorite
    }

    async fn save(&self, favorites: &FavoriteSet) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(favorites)?;
        self.store.set(FAVORITES_KEY, &bytes).await
    }

    /// Forget every favorite (logout/reset).
    pub async fn clear(&self) {
        if let Err(e) = self.store.delete(FAVORITES_KEY).await {
            warn!(error = %e, "Failed to clear favorites");
        }
    }
}
