//! Fluent assembler over [`CacheConfig`], producing a [`Cache`], a
//! [`LoadingCache`], or a synchronous [`SyncCache`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, RemovalCause};
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::eviction::PolicyKind;
use crate::loading_cache::LoadingCache;

/// Builds a [`CacheConfig`] step by step and hands it off to whichever of
/// `build`, `build_async`, or `build_sync` matches the caller's loading
/// style.
///
/// `expire_after_access` has no dedicated enforcement path of its own (this
/// crate only expires on write-time TTL, never on access recency); it is
/// stored and, if `expire_after_write` was never set, used as the
/// `default_ttl` fallback so `with_expire_after_access` alone still gives
/// every entry a TTL.
pub struct CacheBuilder<V> {
    expire_after_write: Option<Duration>,
    expire_after_access: Option<Duration>,
    max_entries: Option<u64>,
    eviction_policy: PolicyKind,
    record_stats: bool,
    enable_event_stream: bool,
    stale_while_revalidate: bool,
    stale_time: Option<Duration>,
    auto_trim: Option<Duration>,
    removal_listener: Option<Arc<dyn Fn(&str, &V, RemovalCause) + Send + Sync>>,
}

impl<V> Default for CacheBuilder<V> {
    fn default() -> Self {
        Self {
            expire_after_write: None,
            expire_after_access: None,
            max_entries: None,
            eviction_policy: PolicyKind::default(),
            record_stats: false,
            enable_event_stream: false,
            stale_while_revalidate: false,
            stale_time: None,
            auto_trim: None,
            removal_listener: None,
        }
    }
}

impl<V: Clone + Send + Sync + 'static> CacheBuilder<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn expire_after_write(mut self, ttl: Duration) -> Self {
        self.expire_after_write = Some(ttl);
        self
    }

    pub fn expire_after_access(mut self, ttl: Duration) -> Self {
        self.expire_after_access = Some(ttl);
        self
    }

    pub fn eviction_policy(mut self, policy: PolicyKind) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn record_stats(mut self, record_stats: bool) -> Self {
        self.record_stats = record_stats;
        self
    }

    pub fn event_stream(mut self, enable: bool) -> Self {
        self.enable_event_stream = enable;
        self
    }

    pub fn stale_while_revalidate(mut self, stale_time: Option<Duration>) -> Self {
        self.stale_while_revalidate = true;
        self.stale_time = stale_time;
        self
    }

    pub fn auto_trim(mut self, interval: Duration) -> Self {
        self.auto_trim = Some(interval);
        self
    }

    pub fn removal_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, &V, RemovalCause) + Send + Sync + 'static,
    {
        self.removal_listener = Some(Arc::new(listener));
        self
    }

    fn into_config(self) -> CacheConfig<V> {
        let default_ttl = self.expire_after_write.or(self.expire_after_access);
        let mut config = CacheConfig::new()
            .with_eviction_policy(self.eviction_policy)
            .with_record_stats(self.record_stats)
            .with_event_stream(self.enable_event_stream);
        if let Some(ttl) = default_ttl {
            config = config.with_default_ttl(ttl);
        }
        if let Some(max_entries) = self.max_entries {
            config = config.with_max_entries(max_entries);
        }
        if let Some(interval) = self.auto_trim {
            config = config.with_auto_trim(interval);
        }
        if self.stale_while_revalidate {
            config = config.with_stale_while_revalidate(self.stale_time);
        }
        if let Some(listener) = self.removal_listener {
            let listener = listener.clone();
            config = config.with_on_evicted(move |key, value, cause| listener(key, value, cause));
        }
        config
    }

    pub fn build(self) -> Cache<V> {
        Cache::new(self.into_config())
    }

    pub fn build_async<F, Fut>(self, loader: F) -> LoadingCache<V, F>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CacheResult<V>> + Send + 'static,
    {
        LoadingCache::new(self.into_config(), loader)
    }

    pub fn build_sync<F>(self, loader: F) -> SyncCache<V, F>
    where
        F: Fn(&str) -> CacheResult<V> + Send + Sync + 'static,
    {
        SyncCache::new(self.into_config(), loader)
    }
}

/// A synchronous counterpart to [`LoadingCache`]: `get` blocks the calling
/// thread and computes the value on first call, using the same single-entry
/// insertion race as [`Cache::get_or`] (whichever caller wins the `get_mut`
/// race stores the result; a loser's computation is simply discarded).
/// Unlike `LoadingCache`, there is no cross-thread single-flight broadcast
/// here — concurrent misses for the same key may both run the loader, the
/// way `Cache::get_or` behaves under a synchronous closure.
pub struct SyncCache<V, F> {
    cache: Cache<V>,
    loader: F,
}

impl<V, F> SyncCache<V, F>
where
    V: Clone + Send + Sync + 'static,
    F: Fn(&str) -> CacheResult<V> + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig<V>, loader: F) -> Self {
        Self {
            cache: Cache::new(config),
            loader,
        }
    }

    /// Returns the cached value, computing and storing it on a miss.
    pub fn get(&self, key: &str) -> CacheResult<V> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }
        let value = (self.loader)(key)?;
        self.cache.set(key.to_string(), value.clone(), None);
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) -> Option<V> {
        self.cache.remove(key)
    }

    pub fn cache(&self) -> &Cache<V> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn expire_after_access_alone_becomes_the_default_ttl() {
        let cache: Cache<i32> = CacheBuilder::new()
            .expire_after_access(Duration::from_millis(10))
            .build();
        cache.set("a", 1, None);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn expire_after_write_takes_precedence_over_expire_after_access() {
        let cache: Cache<i32> = CacheBuilder::new()
            .expire_after_write(Duration::from_secs(60))
            .expire_after_access(Duration::from_millis(1))
            .build();
        cache.set("a", 1, None);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn max_entries_and_eviction_policy_are_wired_through() {
        let cache: Cache<i32> = CacheBuilder::new()
            .max_entries(2)
            .eviction_policy(PolicyKind::Fifo)
            .build();
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        cache.set("c", 3, None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn removal_listener_fires_with_a_cause() {
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_clone = fired.clone();
        let cache: Cache<i32> = CacheBuilder::new()
            .removal_listener(move |_k, _v, cause| {
                if cause == RemovalCause::Explicit {
                    fired_clone.store(true, Ordering::SeqCst);
                }
            })
            .build();
        cache.set("a", 1, None);
        cache.remove("a");
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn sync_cache_computes_once_per_key_on_miss() {
        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();
        let sync_cache: SyncCache<i32, _> = CacheBuilder::new().build_sync(move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        });
        assert_eq!(sync_cache.get("a").unwrap(), 42);
        assert_eq!(sync_cache.get("a").unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sync_cache_invalidate_forces_a_recompute() {
        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();
        let sync_cache: SyncCache<u32, _> = CacheBuilder::new()
            .build_sync(move |_key| Ok(counter.fetch_add(1, Ordering::SeqCst)));
        let first = sync_cache.get("a").unwrap();
        sync_cache.invalidate("a");
        let second = sync_cache.get("a").unwrap();
        assert_ne!(first, second);
    }
}
