use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::entry::Entry;
use crate::error::CacheResult;

use super::Store;

/// An in-memory [`Store`] backed by a single `RwLock<HashMap<...>>`.
///
/// Every method is infallible in practice (there is no I/O to fail), but
/// still returns [`CacheResult`] to satisfy the trait's async/fallible
/// signature uniformly with [`super::FileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync> Store<V> for MemoryStore<V> {
    async fn put(&self, key: &str, entry: Entry<V>) -> CacheResult<()> {
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Entry<V>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> CacheResult<Option<Entry<V>>> {
        Ok(self.entries.write().remove(key))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    async fn contains_key(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.write().clear();
        Ok(())
    }

    async fn len(&self) -> CacheResult<u64> {
        Ok(self.entries.read().len() as u64)
    }
}
