//! Abstract persistence interface used as the L2 layer by
//! [`crate::TieredCache`], with two concrete implementations.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::entry::Entry;
use crate::error::CacheResult;

/// A persistence layer for [`Entry`] values keyed by string.
///
/// Every operation is fallible and asynchronous so that a disk- or
/// network-backed implementation (like [`FileStore`]) can suspend without
/// blocking the caller's executor thread; [`MemoryStore`] happens never to
/// fail, but still honors the signature.
#[async_trait]
pub trait Store<V>: Send + Sync {
    async fn put(&self, key: &str, entry: Entry<V>) -> CacheResult<()>;

    async fn get(&self, key: &str) -> CacheResult<Option<Entry<V>>>;

    async fn remove(&self, key: &str) -> CacheResult<Option<Entry<V>>>;

    async fn keys(&self) -> CacheResult<Vec<String>>;

    async fn contains_key(&self, key: &str) -> CacheResult<bool>;

    async fn clear(&self) -> CacheResult<()>;

    async fn len(&self) -> CacheResult<u64>;

    async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Releases any resources held by this store (open file handles,
    /// background tasks). A no-op for [`MemoryStore`].
    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}
