//! Two-tier L1 (in-memory `Cache`) / L2 (`Store`) orchestration with
//! write-through and read-promotion.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::Cache;
use crate::error::CacheResult;
use crate::store::Store;

/// Orchestrates an in-memory L1 [`Cache`] in front of a persistent L2
/// [`Store`]. On an L1 miss, `get` falls through to L2 and (by default)
/// promotes the hit back into L1, preserving its remaining TTL.
pub struct TieredCache<V> {
    l1: Cache<V>,
    l2: Arc<dyn Store<V>>,
    write_through: bool,
    promote_on_access: bool,
}

impl<V: Clone + Send + Sync + 'static> TieredCache<V> {
    pub fn new(l1: Cache<V>, l2: Arc<dyn Store<V>>) -> Self {
        Self {
            l1,
            l2,
            write_through: true,
            promote_on_access: true,
        }
    }

    pub fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }

    pub fn with_promote_on_access(mut self, promote_on_access: bool) -> Self {
        self.promote_on_access = promote_on_access;
        self
    }

    pub fn l1(&self) -> &Cache<V> {
        &self.l1
    }

    pub async fn get(&self, key: &str) -> CacheResult<Option<V>> {
        if let Some(value) = self.l1.get(key) {
            return Ok(Some(value));
        }

        let l2_entry = match self.l2.get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                // L2 failures downgrade to a miss; they never demote an L1
                // hit (there wasn't one, we already checked above).
                tracing::debug!(key, error = %err, "L2 read failed, treating as miss");
                return Ok(None);
            }
        };

        match l2_entry {
            None => Ok(None),
            Some(entry) if entry.is_expired() => {
                let _ = self.l2.remove(key).await;
                Ok(None)
            }
            Some(entry) => {
                let value = entry.value.clone();
                if self.promote_on_access {
                    self.l1.set(key.to_string(), value.clone(), entry.ttl_remaining());
                }
                Ok(Some(value))
            }
        }
    }

    /// Always writes to L1. If `write_through` is set, also mirrors the
    /// entry L1 actually applied (after any `default_ttl` resolution) to
    /// L2.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<std::time::Duration>) -> CacheResult<()> {
        let key = key.into();
        self.l1.set(key.clone(), value, ttl);
        if self.write_through {
            if let Some(entry) = self.l1.get_entry(&key) {
                self.l2.put(&key, entry).await?;
            }
        }
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> CacheResult<Option<V>> {
        let from_l1 = self.l1.remove(key);
        let from_l2 = self.l2.remove(key).await?;
        Ok(from_l1.or_else(|| from_l2.map(|e| e.value)))
    }

    pub async fn clear(&self) -> CacheResult<()> {
        self.l1.clear();
        self.l2.clear().await?;
        Ok(())
    }

    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut union: HashSet<String> = self.l1.keys().into_iter().collect();
        union.extend(self.l2.keys().await?);
        Ok(union.into_iter().collect())
    }

    /// Writes every current L1 entry through to L2, then clears L1.
    pub async fn flush_l1_to_l2(&self) -> CacheResult<()> {
        for key in self.l1.keys() {
            if let Some(entry) = self.l1.get_entry(&key) {
                self.l2.put(&key, entry).await?;
            }
        }
        self.l1.clear();
        Ok(())
    }

    /// For each key, reads L2 and — if present and valid — inserts it into
    /// L1 with its remaining TTL preserved.
    pub async fn warm_up_l1(&self, keys: &[&str]) -> CacheResult<()> {
        for key in keys {
            if let Some(entry) = self.l2.get(key).await? {
                if entry.is_valid() {
                    let ttl = entry.ttl_remaining();
                    self.l1.set(key.to_string(), entry.value, ttl);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn tiered(l1_cap: Option<u64>) -> TieredCache<i32> {
        let mut config = CacheConfig::new();
        if let Some(cap) = l1_cap {
            config = config.with_max_entries(cap);
        }
        let l1 = Cache::new(config);
        let l2: Arc<dyn Store<i32>> = Arc::new(MemoryStore::new());
        TieredCache::new(l1, l2)
    }

    #[tokio::test]
    async fn set_then_get_hits_l1() {
        let tc = tiered(None);
        tc.set("a", 1, None).await.unwrap();
        assert_eq!(tc.get("a").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn l1_eviction_falls_through_to_l2_and_promotes() {
        let tc = tiered(Some(1));
        tc.set("x", 1, None).await.unwrap();
        tc.set("y", 2, None).await.unwrap(); // evicts x from L1 (write-through already wrote it to L2)
        assert!(tc.l1().get("x").is_none());

        let value = tc.get("x").await.unwrap();
        assert_eq!(value, Some(1));
        assert!(tc.l1().get("x").is_some(), "promoted back into L1");
        assert!(tc.l1().get("y").is_some() || tc.l1().get("x").is_some());
    }

    #[tokio::test]
    async fn write_through_disabled_keeps_l2_untouched() {
        let l1 = Cache::new(CacheConfig::new());
        let l2: Arc<dyn Store<i32>> = Arc::new(MemoryStore::new());
        let tc = TieredCache::new(l1, l2.clone()).with_write_through(false);
        tc.set("a", 1, None).await.unwrap();
        assert!(l2.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_clears_both_tiers() {
        let tc = tiered(None);
        tc.set("a", 1, None).await.unwrap();
        tc.remove("a").await.unwrap();
        assert_eq!(tc.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_l2_entry_is_reaped_on_read() {
        let tc = tiered(None);
        tc.set("a", 1, Some(Duration::from_millis(5))).await.unwrap();
        tc.l1().remove("a"); // force the read to fall through to L2
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(tc.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn warm_up_l1_preloads_from_l2() {
        let tc = tiered(None);
        tc.set("a", 1, None).await.unwrap();
        tc.l1().remove("a");
        tc.warm_up_l1(&["a"]).await.unwrap();
        assert_eq!(tc.l1().get("a"), Some(1));
    }
}
