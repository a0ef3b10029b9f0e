//! Persisted service state.

use phpdock_core::{JsonStore, ServiceId, ServiceState, StoreError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

type StateMap = BTreeMap<ServiceId, ServiceState>;

/// Keyed map of [`ServiceState`] records, cached in memory and persisted
/// atomically on every change.
pub struct ServiceStore {
    store: JsonStore<StateMap>,
    cache: RwLock<StateMap>,
}

impl ServiceStore {
    /// Creates a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { store: JsonStore::new(path), cache: RwLock::new(StateMap::new()) }
    }

    /// Loads persisted state and seeds a default entry for every known
    /// service id that has none yet.
    pub async fn initialize(&self, known: impl Iterator<Item = ServiceId>) -> Result<(), StoreError> {
        let mut data = self.store.load_or_default().await?;
        let mut changed = false;
        for id in known {
            if !data.contains_key(&id) {
                data.insert(id, ServiceState::default());
                changed = true;
            }
        }
        if changed {
            self.store.save(&data).await?;
        }
        *self.cache.write().await = data;
        Ok(())
    }

    /// Returns the state for a service (default if never seeded).
    pub async fn get(&self, id: &ServiceId) -> ServiceState {
        self.cache.read().await.get(id).cloned().unwrap_or_default()
    }

    /// Replaces the state for a service and persists the map.
    pub async fn set(&self, id: &ServiceId, state: ServiceState) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        cache.insert(id.clone(), state);
        self.store.save(&cache).await
    }
}
