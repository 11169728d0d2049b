//! Entity store trait definition.
//!
//! This module defines the keyed store the restart bookkeeping lives in.
//! Every read-modify-write goes through [`EntityStore::update`] or
//! [`EntityStore::put_or_update`], which apply the mutator atomically per key.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::StoreSettings;
use crate::error::Result;

use super::local::FileEntityStore;
use super::memory::MemoryEntityStore;
use super::types::ModuleState;

/// Mutator applied to a stored value.
pub type Mutator<'a, V> = &'a (dyn Fn(&V) -> V + Send + Sync);

/// Trait for keyed entity storage backends.
#[async_trait]
pub trait EntityStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Gets the value stored under `key`.
    ///
    /// Returns `None` if nothing is stored yet.
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Replaces the value under `key` with `mutator(current)`.
    ///
    /// Fails with `StoreError::NotFound` when the key is absent.
    async fn update(&self, key: &str, mutator: Mutator<'_, V>) -> Result<V>;

    /// Stores `initial` if the key is absent, otherwise applies `mutator`.
    async fn put_or_update(&self, key: &str, initial: V, mutator: Mutator<'_, V>) -> Result<V>;

    /// Removes the value under `key`, if any.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Lists stored keys in ascending order.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl<V, S> EntityStore<V> for Arc<S>
where
    V: Clone + Send + Sync + 'static,
    S: EntityStore<V> + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        (**self).get(key).await
    }

    async fn update(&self, key: &str, mutator: Mutator<'_, V>) -> Result<V> {
        (**self).update(key, mutator).await
    }

    async fn put_or_update(&self, key: &str, initial: V, mutator: Mutator<'_, V>) -> Result<V> {
        (**self).put_or_update(key, initial, mutator).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        (**self).keys().await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

/// Opens the module-state store described by `settings`.
///
/// A configured path selects the file backend; otherwise state lives in memory.
///
/// # Errors
///
/// Returns an error if the state file exists but cannot be read.
pub async fn open_module_state_store(
    settings: &StoreSettings,
) -> Result<Arc<dyn EntityStore<ModuleState>>> {
    match &settings.path {
        Some(dir) => {
            let store = FileEntityStore::<ModuleState>::open_dir(dir).await?;
            info!("Using file module-state store at {}", store.path().display());
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory module-state store");
            Ok(Arc::new(MemoryEntityStore::<ModuleState>::new()))
        }
    }
}
