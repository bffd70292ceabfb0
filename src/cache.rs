//! The core cache engine: entry store, TTL model, eviction, metrics, events,
//! capacity enforcement, expiration sweep, and stale-while-revalidate.
//!
//! A `parking_lot::RwLock` guards the entry map and a `parking_lot::Mutex`
//! guards the eviction policy's order bookkeeping. Every mutating operation
//! acquires the policy lock before the entries lock, consistently, so the
//! two together behave as one exclusive region.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::config::CacheConfig;
use crate::entry::Entry;
use crate::events::{CacheEvent, EventBus, Subscription};
use crate::eviction::EvictionPolicy;
use crate::metrics::{LatencyKind, LatencyTimer, Metrics};
use crate::path;

/// The reason an entry left the cache, shared by `on_evicted` callbacks and
/// [`crate::CacheBuilder`]'s removal listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalCause {
    /// Caller called `remove` directly.
    Explicit,
    /// Caller called `set` on a key that already had a mapping.
    Replaced,
    /// Capacity enforcement selected this key via the eviction policy.
    Evicted,
    /// TTL elapsed; reclaimed lazily or by the periodic sweep.
    Expired,
    /// Removed by `clear`/`clear_preserving`.
    Cleared,
}

/// Point-in-time summary of store contents (not access counters — see
/// [`Metrics`] for those).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub total: u64,
    pub valid: u64,
    pub expired: u64,
    pub permanent: u64,
}

enum EntrySnapshot<V> {
    Absent,
    Expired,
    Present(V, Duration),
}

/// Private, `Arc`-shared engine state. [`Cache`] is a thin handle around
/// this; background tasks (the auto-trim sweep, stale-while-revalidate
/// background reloads) hold their own clone of the `Arc` so they keep
/// running independently of any particular `Cache` handle's lifetime.
struct Inner<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    policy: Mutex<Box<dyn EvictionPolicy>>,
    config: CacheConfig<V>,
    metrics: Metrics,
    events: Mutex<Option<EventBus<V>>>,
    revalidating: DashMap<String, ()>,
    sweep_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<V: Clone + Send + Sync + 'static> Inner<V> {
    fn new(config: CacheConfig<V>) -> Self {
        let metrics = if config.record_stats {
            Metrics::enabled()
        } else {
            Metrics::disabled()
        };
        let events = if config.enable_event_stream {
            Some(EventBus::new())
        } else {
            None
        };
        let policy = Mutex::new(config.eviction_policy.build());
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
            metrics,
            events: Mutex::new(events),
            revalidating: DashMap::new(),
            sweep_handle: Mutex::new(None),
            config,
        }
    }

    fn publish(&self, event: CacheEvent<V>) {
        if let Some(bus) = self.events.lock().as_ref() {
            bus.publish(event);
        }
    }

    fn insert_entry(&self, key: String, value: V, entry: Entry<V>) {
        let previous = {
            let mut policy = self.policy.lock();
            let mut entries = self.entries.write();
            let previous = entries.insert(key.clone(), entry);
            policy.on_add(&key);
            previous
        };
        self.metrics.record_put();
        match previous {
            Some(prev) => {
                if let Some(cb) = &self.config.on_evicted {
                    cb(&key, &prev.value, RemovalCause::Replaced);
                }
                self.publish(CacheEvent::Updated {
                    key: key.clone(),
                    value: value.clone(),
                    previous: prev.value,
                    at: Instant::now(),
                });
            }
            None => self.publish(CacheEvent::Created {
                key: key.clone(),
                value,
                at: Instant::now(),
            }),
        }
        tracing::trace!(key = %key, "cache set");
        self.enforce_capacity();
    }

    fn enforce_capacity(&self) {
        let Some(max) = self.config.max_entries else {
            return;
        };
        loop {
            let len = self.entries.read().len() as u64;
            if len <= max {
                break;
            }
            let candidate = self.policy.lock().get_eviction_candidate();
            let Some(candidate) = candidate else {
                break;
            };
            if self
                .remove_one(&candidate, RemovalCause::Evicted, true, true)
                .is_none()
            {
                // Policy nominated a key already gone (shouldn't happen,
                // but avoid looping forever on a stale candidate).
                break;
            }
        }
    }

    fn remove_one(&self, key: &str, cause: RemovalCause, emit_event: bool, record_metrics: bool) -> Option<V> {
        let removed = {
            let mut policy = self.policy.lock();
            let mut entries = self.entries.write();
            let removed = entries.remove(key);
            if removed.is_some() {
                policy.on_remove(key);
            }
            removed
        };
        let entry = removed?;

        if record_metrics {
            match cause {
                RemovalCause::Explicit => self.metrics.record_remove(),
                RemovalCause::Evicted => self.metrics.record_eviction(),
                RemovalCause::Expired => self.metrics.record_expiration(),
                RemovalCause::Replaced | RemovalCause::Cleared => {}
            }
        }

        if let Some(cb) = &self.config.on_evicted {
            cb(key, &entry.value, cause);
        }

        if emit_event {
            let event = match cause {
                RemovalCause::Explicit | RemovalCause::Cleared => CacheEvent::Removed {
                    key: key.to_string(),
                    value: entry.value.clone(),
                    at: Instant::now(),
                },
                RemovalCause::Evicted => CacheEvent::Evicted {
                    key: key.to_string(),
                    value: entry.value.clone(),
                    at: Instant::now(),
                },
                RemovalCause::Expired => CacheEvent::Expired {
                    key: key.to_string(),
                    value: entry.value.clone(),
                    at: Instant::now(),
                },
                RemovalCause::Replaced => {
                    unreachable!(
                        "insert_entry handles its own on_evicted call and Updated event for a \
                         replace; remove_one is never invoked with RemovalCause::Replaced"
                    )
                }
            };
            self.publish(event);
        }

        tracing::debug!(key, cause = ?cause, "cache entry removed");
        Some(entry.value)
    }

    fn get(&self, key: &str) -> Option<V> {
        let _timer = LatencyTimer::start(&self.metrics, LatencyKind::Get);
        let now = Instant::now();
        let hit = {
            let entries = self.entries.read();
            match entries.get(key) {
                None => None,
                Some(e) if e.is_expired_at(now) => Some(None),
                Some(e) => Some(Some(e.value.clone())),
            }
        };
        match hit {
            None => {
                self.metrics.record_miss();
                tracing::trace!(key, "cache miss");
                None
            }
            Some(None) => {
                self.remove_one(key, RemovalCause::Expired, true, true);
                self.metrics.record_miss();
                tracing::trace!(key, "cache miss (expired)");
                None
            }
            Some(Some(value)) => {
                self.policy.lock().on_access(key);
                self.metrics.record_hit();
                tracing::trace!(key, "cache hit");
                Some(value)
            }
        }
    }

    fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        let status = { self.entries.read().get(key).map(|e| e.is_expired_at(now)) };
        match status {
            None => false,
            Some(false) => true,
            Some(true) => {
                self.remove_one(key, RemovalCause::Expired, true, false);
                false
            }
        }
    }

    fn entry_snapshot(&self, key: &str, now: Instant) -> EntrySnapshot<V> {
        match self.entries.read().get(key) {
            None => EntrySnapshot::Absent,
            Some(e) if e.is_expired_at(now) => EntrySnapshot::Expired,
            Some(e) => EntrySnapshot::Present(e.value.clone(), e.age_at(now)),
        }
    }

    fn drain_except(&self, preserve: Option<&HashSet<String>>) -> Vec<(String, V)> {
        let mut policy = self.policy.lock();
        let mut entries = self.entries.write();
        let keys_to_remove: Vec<String> = entries
            .keys()
            .filter(|k| !preserve.map(|p| p.contains(*k)).unwrap_or(false))
            .cloned()
            .collect();
        let mut removed = Vec::with_capacity(keys_to_remove.len());
        for k in &keys_to_remove {
            if let Some(e) = entries.remove(k) {
                policy.on_remove(k);
                removed.push((k.clone(), e.value));
            }
        }
        drop(entries);
        drop(policy);
        for (k, v) in &removed {
            if let Some(cb) = &self.config.on_evicted {
                cb(k, v, RemovalCause::Cleared);
            }
        }
        removed
    }

    fn trim_expired(&self) -> u64 {
        let now = Instant::now();
        let (mut policy, mut entries) = (self.policy.lock(), self.entries.write());
        let expired_keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        let mut removed = Vec::with_capacity(expired_keys.len());
        for k in &expired_keys {
            if let Some(e) = entries.remove(k) {
                policy.on_remove(k);
                removed.push((k.clone(), e.value));
            }
        }
        drop(entries);
        drop(policy);

        let count = removed.len() as u64;
        for (k, v) in &removed {
            self.metrics.record_expiration();
            if let Some(cb) = &self.config.on_evicted {
                cb(k, v, RemovalCause::Expired);
            }
        }
        for (k, v) in removed {
            self.publish(CacheEvent::Expired { key: k, value: v, at: now });
        }
        if count > 0 {
            tracing::debug!(count, "expiration sweep reclaimed entries");
        }
        count
    }

    fn stats(&self) -> CacheSnapshot {
        let now = Instant::now();
        let entries = self.entries.read();
        let mut snapshot = CacheSnapshot {
            total: entries.len() as u64,
            ..Default::default()
        };
        for e in entries.values() {
            if e.is_valid_at(now) {
                snapshot.valid += 1;
            } else {
                snapshot.expired += 1;
            }
            if e.is_permanent() {
                snapshot.permanent += 1;
            }
        }
        snapshot
    }
}

/// A general-purpose in-process cache: TTL-aware entries, a pluggable
/// eviction policy, optional access metrics, an optional lifecycle event
/// stream, and optional stale-while-revalidate semantics.
///
/// Cheap to clone — every clone shares the same underlying state, the way a
/// `tokio::sync::mpsc::Sender` or an `Arc<Mutex<_>>` handle does.
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Cache {
            inner: self.inner.clone(),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    /// Builds a new cache from `config`. If `config.auto_trim` is set, this
    /// spawns a background sweep task — callers must be inside a running
    /// Tokio runtime, the same requirement `async-ttl`'s background-task
    /// pattern places on its callers.
    pub fn new(config: CacheConfig<V>) -> Self {
        let auto_trim = config.auto_trim;
        let interval = config.auto_trim_interval;
        let inner = Arc::new(Inner::new(config));

        if auto_trim {
            let weak = Arc::downgrade(&inner);
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    match weak.upgrade() {
                        Some(inner) => {
                            inner.trim_expired();
                        }
                        None => break,
                    }
                }
            });
            *inner.sweep_handle.lock() = Some(handle);
        }

        Cache { inner }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    pub fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    pub fn get_or_set(&self, key: impl Into<String>, compute: impl FnOnce() -> V, ttl: Option<Duration>) -> V {
        let key = key.into();
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.set(key, value.clone(), ttl);
        value
    }

    pub async fn get_or_set_async<Fut>(&self, key: impl Into<String>, compute: Fut, ttl: Option<Duration>) -> V
    where
        Fut: Future<Output = V>,
    {
        let key = key.into();
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute.await;
        self.set(key, value.clone(), ttl);
        value
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let _timer = LatencyTimer::start(&self.inner.metrics, LatencyKind::Put);
        let key = key.into();
        let effective_ttl = ttl.or(self.inner.config.default_ttl);
        let entry = Entry::new(value.clone(), effective_ttl);
        self.inner.insert_entry(key, value, entry);
    }

    pub fn set_permanent(&self, key: impl Into<String>, value: V) {
        let _timer = LatencyTimer::start(&self.inner.metrics, LatencyKind::Put);
        let key = key.into();
        let entry = Entry::permanent(value.clone());
        self.inner.insert_entry(key, value, entry);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.remove_one(key, RemovalCause::Explicit, true, true)
    }

    pub fn get_path(&self, segments: &[&str]) -> Option<V> {
        if segments.is_empty() {
            return None;
        }
        self.get(&path::join(segments))
    }

    pub fn set_path(&self, segments: &[&str], value: V, ttl: Option<Duration>) {
        if segments.is_empty() {
            return;
        }
        self.set(path::join(segments), value, ttl);
    }

    pub fn contains_path(&self, segments: &[&str]) -> bool {
        if segments.is_empty() {
            return false;
        }
        self.contains_key(&path::join(segments))
    }

    pub fn remove_path(&self, segments: &[&str]) -> Option<V> {
        if segments.is_empty() {
            return None;
        }
        self.remove(&path::join(segments))
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner.trim_expired();
        self.inner
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn remove_with_prefix(&self, prefix: &str) -> u64 {
        let matching: Vec<String> = self
            .inner
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        matching
            .into_iter()
            .filter(|k| self.remove(k).is_some())
            .count() as u64
    }

    pub fn get_all(&self, keys: &[&str]) -> HashMap<String, V> {
        keys.iter()
            .filter_map(|k| self.get(k).map(|v| (k.to_string(), v)))
            .collect()
    }

    pub fn set_all(&self, entries: Vec<(String, V)>, ttl: Option<Duration>) {
        for (key, value) in entries {
            self.set(key, value, ttl);
        }
    }

    pub fn remove_all(&self, keys: &[&str]) -> HashMap<String, V> {
        keys.iter()
            .filter_map(|k| self.remove(k).map(|v| (k.to_string(), v)))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.trim_expired();
        self.inner.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.trim_expired();
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_not_empty(&self) -> bool {
        !self.is_empty()
    }

    /// Removes every entry. Emits a single `Cleared` event for a non-empty
    /// cache (none for an already-empty one), per the source's collapsed
    /// bulk-clear behavior. To preserve a set of keys, use
    /// [`Cache::clear_preserving`] instead, which always emits per-entry
    /// `Removed` events.
    pub fn clear(&self) {
        let removed = self.inner.drain_except(None);
        if !removed.is_empty() {
            self.inner.publish(CacheEvent::Cleared { at: Instant::now() });
        }
    }

    /// Removes every entry except those whose key is in `preserve`. Always
    /// emits one `Removed` event per destroyed entry, even when `preserve`
    /// is empty — only the no-argument [`Cache::clear`] collapses to a
    /// single `Cleared` event.
    pub fn clear_preserving(&self, preserve: &HashSet<String>) {
        let removed = self.inner.drain_except(Some(preserve));
        for (key, value) in removed {
            self.inner.publish(CacheEvent::Removed {
                key,
                value,
                at: Instant::now(),
            });
        }
    }

    pub fn clear_where(&self, predicate: impl Fn(&str, &V) -> bool) -> u64 {
        let now = Instant::now();
        let removed = {
            let mut policy = self.inner.policy.lock();
            let mut entries = self.inner.entries.write();
            let keys_to_remove: Vec<String> = entries
                .iter()
                .filter(|(k, e)| e.is_valid_at(now) && predicate(k, &e.value))
                .map(|(k, _)| k.clone())
                .collect();
            let mut removed = Vec::with_capacity(keys_to_remove.len());
            for k in &keys_to_remove {
                if let Some(e) = entries.remove(k) {
                    policy.on_remove(k);
                    removed.push((k.clone(), e.value));
                }
            }
            removed
        };
        let count = removed.len() as u64;
        for (key, value) in &removed {
            if let Some(cb) = &self.inner.config.on_evicted {
                cb(key, value, RemovalCause::Cleared);
            }
        }
        for (key, value) in removed {
            self.inner.publish(CacheEvent::Removed { key, value, at: now });
        }
        count
    }

    pub fn trim_expired(&self) -> u64 {
        self.inner.trim_expired()
    }

    pub fn get_entry(&self, key: &str) -> Option<Entry<V>> {
        let now = Instant::now();
        self.inner
            .entries
            .read()
            .get(key)
            .filter(|e| e.is_valid_at(now))
            .cloned()
    }

    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        self.get_entry(key).and_then(|e| e.ttl_remaining())
    }

    pub fn get_age(&self, key: &str) -> Option<Duration> {
        self.get_entry(key).map(|e| e.age())
    }

    pub fn extend_ttl(&self, key: &str, additional: Duration) -> bool {
        let now = Instant::now();
        let mut entries = self.inner.entries.write();
        match entries.get_mut(key) {
            Some(e) if e.is_valid_at(now) => {
                e.extend_ttl_by(additional);
                true
            }
            _ => false,
        }
    }

    pub fn refresh(&self, key: &str, ttl: Option<Duration>) -> bool {
        let now = Instant::now();
        let mut entries = self.inner.entries.write();
        match entries.get_mut(key) {
            Some(e) if e.is_valid_at(now) => {
                let effective_ttl = ttl.or(self.inner.config.default_ttl);
                e.created_at = now;
                e.expires_at = effective_ttl.map(|t| now + t);
                true
            }
            _ => false,
        }
    }

    /// Stale-while-revalidate read. Returns the cached value immediately if
    /// present (valid or merely stale); spawns at most one background
    /// revalidation per key when the cached value has aged past the
    /// effective stale threshold. See §4.1 for the full decision table.
    pub async fn get_stale<F, Fut>(&self, key: &str, revalidate: F, stale_ttl: Option<Duration>) -> V
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = V> + Send + 'static,
    {
        let now = Instant::now();
        match self.inner.entry_snapshot(key, now) {
            EntrySnapshot::Absent | EntrySnapshot::Expired => {
                let value = revalidate(key.to_string()).await;
                self.set(key.to_string(), value.clone(), None);
                value
            }
            EntrySnapshot::Present(value, age) => {
                let effective_stale = self.inner.config.effective_stale_time(stale_ttl);
                if age > effective_stale && self.inner.revalidating.insert(key.to_string(), ()).is_none() {
                    let inner = self.inner.clone();
                    let key_owned = key.to_string();
                    tokio::spawn(async move {
                        let new_value = revalidate(key_owned.clone()).await;
                        let entry = Entry::new(new_value.clone(), inner.config.default_ttl);
                        inner.insert_entry(key_owned.clone(), new_value, entry);
                        inner.revalidating.remove(&key_owned);
                    });
                }
                value
            }
        }
    }

    pub fn warm_up(&self, entries: Vec<(String, V)>, ttl: Option<Duration>) {
        self.set_all(entries, ttl);
    }

    /// Bulk pre-population issuing parallel loads.
    pub async fn warm_up_async<F, Fut>(&self, keys: Vec<String>, loader: F, ttl: Option<Duration>)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = V> + Send + 'static,
    {
        let loader = Arc::new(loader);
        let loads = keys.into_iter().map(|key| {
            let loader = loader.clone();
            let cache = self.clone();
            async move {
                let value = loader(key.clone()).await;
                cache.set(key, value, ttl);
            }
        });
        futures::future::join_all(loads).await;
    }

    /// A point-in-time `{total, valid, expired, permanent}` summary of
    /// store contents. Does not trigger a sweep.
    pub fn stats(&self) -> CacheSnapshot {
        self.inner.stats()
    }

    /// Present only when `config.record_stats` was set.
    pub fn metrics(&self) -> Option<&Metrics> {
        match &self.inner.metrics {
            Metrics::Enabled(_) => Some(&self.inner.metrics),
            Metrics::Disabled => None,
        }
    }

    /// Present only when `config.enable_event_stream` was set.
    pub fn subscribe(&self) -> Option<Subscription<V>> {
        self.inner.events.lock().as_ref().map(|bus| bus.subscribe())
    }

    /// Cancels the auto-trim sweep task, closes the event bus, clears the
    /// stale-while-revalidate in-flight table, and clears the store.
    pub fn dispose(&self) {
        if let Some(handle) = self.inner.sweep_handle.lock().take() {
            handle.abort();
        }
        *self.inner.events.lock() = None;
        self.inner.revalidating.clear();
        self.inner.entries.write().clear();
        self.inner.policy.lock().clear();
    }
}
