//! In-memory entity store.
//!
//! Entries live in a [`DashMap`]; each mutation holds the shard lock of its
//! key only, so concurrent updates of different modules never contend on a
//! global lock and updates of the same module are never lost.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Result, StoreError};

use super::store::{EntityStore, Mutator};

/// In-memory entity store with per-key atomic updates.
#[derive(Debug)]
pub struct MemoryEntityStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryEntityStore<V>
where
    V: Clone,
{
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Creates a store pre-populated with entries.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (String, V)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies all entries, sorted by key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, V)> {
        let mut entries: Vec<(String, V)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub(crate) fn get_sync(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub(crate) fn update_sync(&self, key: &str, mutator: Mutator<'_, V>) -> Result<V> {
        let mut entry = self.entries.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        let next = mutator(entry.value());
        *entry.value_mut() = next.clone();
        Ok(next)
    }

    pub(crate) fn put_or_update_sync(&self, key: &str, initial: V, mutator: Mutator<'_, V>) -> V {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = mutator(occupied.get());
                occupied.insert(next.clone());
                next
            }
            Entry::Vacant(vacant) => {
                vacant.insert(initial.clone());
                initial
            }
        }
    }

    pub(crate) fn insert_sync(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    pub(crate) fn remove_sync(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub(crate) fn keys_sync(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl<V> Default for MemoryEntityStore<V>
where
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> EntityStore<V> for MemoryEntityStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.get_sync(key))
    }

    async fn update(&self, key: &str, mutator: Mutator<'_, V>) -> Result<V> {
        self.update_sync(key, mutator)
    }

    async fn put_or_update(&self, key: &str, initial: V, mutator: Mutator<'_, V>) -> Result<V> {
        Ok(self.put_or_update_sync(key, initial, mutator))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_sync(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.keys_sync())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
