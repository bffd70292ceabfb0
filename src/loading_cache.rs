//! Single-flight loading on top of [`Cache`]: concurrent misses for the
//! same key share one loader invocation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry as DashEntry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Capacity of each per-key single-flight broadcast channel. One slot is
/// enough: the leader sends exactly one result and every waiter receives
/// its own clone of it.
const SINGLE_FLIGHT_CHANNEL_CAPACITY: usize = 1;

/// Outcome of a loader invocation, broadcast to every waiter racing the
/// same key. Errors are carried as a message rather than the original
/// `CacheError` because `broadcast::Sender` requires `Clone` and
/// `CacheError`'s boxed source is not `Clone`.
#[derive(Clone)]
enum LoadOutcome<V> {
    Loaded(V),
    Failed(String),
}

/// Wraps a [`Cache`] with an asynchronous loader `K -> V` and a single-
/// flight table so concurrent misses for the same key invoke the loader at
/// most once.
pub struct LoadingCache<V, F> {
    cache: Cache<V>,
    loader: Arc<F>,
    in_flight: DashMap<String, Arc<broadcast::Sender<LoadOutcome<V>>>>,
}

impl<V, F, Fut> LoadingCache<V, F>
where
    V: Clone + Send + Sync + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CacheResult<V>> + Send + 'static,
{
    pub fn new(config: CacheConfig<V>, loader: F) -> Self {
        Self {
            cache: Cache::new(config),
            loader: Arc::new(loader),
            in_flight: DashMap::new(),
        }
    }

    pub fn from_cache(cache: Cache<V>, loader: F) -> Self {
        Self {
            cache,
            loader: Arc::new(loader),
            in_flight: DashMap::new(),
        }
    }

    /// Looks up `key`, loading it (at most once across all concurrent
    /// callers) on a miss.
    pub async fn get(&self, key: &str) -> CacheResult<V> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }

        loop {
            if let Some(sender) = self.in_flight.get(key).map(|r| r.clone()) {
                let mut receiver = sender.subscribe();
                drop(sender);
                match receiver.recv().await {
                    Ok(LoadOutcome::Loaded(value)) => return Ok(value),
                    Ok(LoadOutcome::Failed(message)) => {
                        return Err(CacheError::loader_failed_msg(key, message))
                    }
                    Err(broadcast::error::RecvError::Closed | broadcast::error::RecvError::Lagged(_)) => {
                        // The leader finished between our lookup and our
                        // subscribe; re-check the cache and retry the race.
                        if let Some(value) = self.cache.get(key) {
                            return Ok(value);
                        }
                        continue;
                    }
                }
            }

            // No in-flight leader right now. It may simply not have started
            // yet, or it may have just finished and populated the cache
            // between our last lookup and here — re-check before becoming
            // the leader ourselves, or we'd invoke the loader a second time
            // for a key the cache already has an answer for.
            if let Some(value) = self.cache.get(key) {
                return Ok(value);
            }

            let (sender, _receiver) = broadcast::channel(SINGLE_FLIGHT_CHANNEL_CAPACITY);
            let sender = Arc::new(sender);
            match self.in_flight.entry(key.to_string()) {
                DashEntry::Vacant(slot) => {
                    slot.insert(sender.clone());
                }
                DashEntry::Occupied(_) => continue,
            }

            tracing::info!(key, "loading");
            let result = (self.loader)(key.to_string()).await;

            // Populate the cache (or broadcast the failure) before removing
            // the in-flight slot — a waiter's cache re-check above must see
            // the value if it observes the slot gone, or it would re-enter
            // the loader and break single-flight.
            return match result {
                Ok(value) => {
                    self.cache.set(key.to_string(), value.clone(), None);
                    let _ = sender.send(LoadOutcome::Loaded(value.clone()));
                    self.in_flight.remove(key);
                    Ok(value)
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "loader failed");
                    let _ = sender.send(LoadOutcome::Failed(err.to_string()));
                    self.in_flight.remove(key);
                    Err(err)
                }
            };
        }
    }

    pub async fn get_all(&self, keys: &[&str]) -> HashMap<String, V> {
        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Ok(value) = self.get(key).await {
                results.insert(key.to_string(), value);
            }
        }
        results
    }

    pub fn put(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.cache.set(key, value, ttl);
    }

    pub fn put_all(&self, entries: Vec<(String, V)>, ttl: Option<Duration>) {
        self.cache.set_all(entries, ttl);
    }

    pub fn invalidate(&self, key: &str) -> Option<V> {
        self.cache.remove(key)
    }

    /// Invalidates `key`, then reloads it unconditionally (forcing a
    /// reload even if a valid entry already existed before the call).
    pub async fn refresh(&self, key: &str) -> CacheResult<V> {
        self.invalidate(key);
        self.get(key).await
    }

    pub fn cache(&self) -> &Cache<V> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn loader_runs_once_under_concurrent_callers() {
        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();
        let loading: LoadingCache<String, _> = LoadingCache::new(CacheConfig::new(), move |key| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(format!("{key}!"))
            }
        });
        let loading = Arc::new(loading);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let loading = loading.clone();
            handles.push(tokio::spawn(async move { loading.get("x").await.unwrap() }));
        }
        let results = futures::future::join_all(handles).await;
        for result in results {
            assert_eq!(result.unwrap(), "x!");
        }
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn staggered_callers_never_trigger_a_second_load() {
        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();
        let loading: LoadingCache<String, _> = LoadingCache::new(CacheConfig::new(), move |key| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(format!("{key}!"))
            }
        });
        let loading = Arc::new(loading);

        let leader = {
            let loading = loading.clone();
            tokio::spawn(async move { loading.get("x").await.unwrap() })
        };
        // Gives the leader time to claim the in-flight slot and start
        // loading before a straggler arrives mid-flight, and a second
        // straggler arrives only after the leader has almost certainly
        // finished and removed the slot.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mid_flight = {
            let loading = loading.clone();
            tokio::spawn(async move { loading.get("x").await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_completion = loading.get("x").await.unwrap();

        assert_eq!(leader.await.unwrap(), "x!");
        assert_eq!(mid_flight.await.unwrap(), "x!");
        assert_eq!(after_completion, "x!");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_value_short_circuits_the_loader() {
        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();
        let loading: LoadingCache<i32, _> = LoadingCache::new(CacheConfig::new(), move |_key| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        });
        loading.put("a", 1, None);
        assert_eq!(loading.get("a").await.unwrap(), 1);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_loads_cache_nothing_and_propagate() {
        let loading: LoadingCache<i32, _> = LoadingCache::new(CacheConfig::new(), |key| async move {
            Err(CacheError::loader_failed_msg(key, "boom"))
        });
        assert!(loading.get("a").await.is_err());
        assert!(!loading.cache().contains_key("a"));
    }

    #[tokio::test]
    async fn refresh_forces_a_reload() {
        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();
        let loading: LoadingCache<u32, _> = LoadingCache::new(CacheConfig::new(), move |_key| {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
        });
        let first = loading.get("a").await.unwrap();
        let refreshed = loading.refresh("a").await.unwrap();
        assert_ne!(first, refreshed);
    }
}
