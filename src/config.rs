//! The crate's entire configuration surface: a plain constructible struct,
//! never read from environment variables or files (§3).

use std::sync::Arc;
use std::time::Duration;

use crate::cache::RemovalCause;
use crate::eviction::PolicyKind;

/// Callback invoked synchronously whenever an entry is removed for any
/// reason (explicit remove, eviction, expiration, clear). Carries the
/// [`RemovalCause`] so a single callback can distinguish, e.g., an explicit
/// `remove` from a capacity eviction — the same information
/// [`crate::CacheBuilder`]'s three-argument removal listener exposes.
pub type OnEvicted<V> = Arc<dyn Fn(&str, &V, RemovalCause) + Send + Sync>;

/// Configuration for a [`crate::Cache`].
///
/// Every field has a sensible default via [`Default`]; `with_*` setters
/// mirror [`crate::CacheBuilder`]'s fields so the two surfaces stay in sync.
/// This struct has no knowledge of environment variables or config files —
/// applications that want those translate into a `CacheConfig` themselves.
pub struct CacheConfig<V> {
    pub default_ttl: Option<Duration>,
    pub max_entries: Option<u64>,
    pub auto_trim: bool,
    pub auto_trim_interval: Duration,
    pub eviction_policy: PolicyKind,
    pub record_stats: bool,
    pub enable_event_stream: bool,
    pub stale_while_revalidate: bool,
    pub stale_time: Option<Duration>,
    pub on_evicted: Option<OnEvicted<V>>,
}

impl<V> Clone for CacheConfig<V> {
    fn clone(&self) -> Self {
        Self {
            default_ttl: self.default_ttl,
            max_entries: self.max_entries,
            auto_trim: self.auto_trim,
            auto_trim_interval: self.auto_trim_interval,
            eviction_policy: self.eviction_policy,
            record_stats: self.record_stats,
            enable_event_stream: self.enable_event_stream,
            stale_while_revalidate: self.stale_while_revalidate,
            stale_time: self.stale_time,
            on_evicted: self.on_evicted.clone(),
        }
    }
}

/// Default auto-trim sweep interval when `auto_trim` is enabled without an
/// explicit interval.
const DEFAULT_AUTO_TRIM_INTERVAL: Duration = Duration::from_secs(60);

/// Fallback used by `get_stale` when neither an explicit `stale_ttl`
/// argument nor `config.stale_time` nor `default_ttl / 2` is available.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

impl<V> Default for CacheConfig<V> {
    fn default() -> Self {
        Self {
            default_ttl: None,
            max_entries: None,
            auto_trim: false,
            auto_trim_interval: DEFAULT_AUTO_TRIM_INTERVAL,
            eviction_policy: PolicyKind::default(),
            record_stats: false,
            enable_event_stream: false,
            stale_while_revalidate: false,
            stale_time: None,
            on_evicted: None,
        }
    }
}

impl<V> CacheConfig<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_auto_trim(mut self, interval: Duration) -> Self {
        self.auto_trim = true;
        self.auto_trim_interval = interval;
        self
    }

    pub fn with_eviction_policy(mut self, policy: PolicyKind) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_record_stats(mut self, record_stats: bool) -> Self {
        self.record_stats = record_stats;
        self
    }

    pub fn with_event_stream(mut self, enable: bool) -> Self {
        self.enable_event_stream = enable;
        self
    }

    pub fn with_stale_while_revalidate(mut self, stale_time: Option<Duration>) -> Self {
        self.stale_while_revalidate = true;
        self.stale_time = stale_time;
        self
    }

    pub fn with_on_evicted<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &V, RemovalCause) + Send + Sync + 'static,
    {
        self.on_evicted = Some(Arc::new(callback));
        self
    }

    /// Resolves the effective stale-while-revalidate threshold, per §4.1:
    /// `stale_ttl ?? config.stale_time ?? (default_ttl / 2) ?? 5 minutes`.
    pub fn effective_stale_time(&self, stale_ttl: Option<Duration>) -> Duration {
        stale_ttl
            .or(self.stale_time)
            .or_else(|| self.default_ttl.map(|ttl| ttl / 2))
            .unwrap_or(DEFAULT_STALE_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_ceiling_and_fifo_policy() {
        let config: CacheConfig<i32> = CacheConfig::default();
        assert_eq!(config.max_entries, None);
        assert_eq!(config.eviction_policy, PolicyKind::Fifo);
        assert!(!config.auto_trim);
    }

    #[test]
    fn effective_stale_time_prefers_explicit_argument() {
        let config: CacheConfig<i32> = CacheConfig::new().with_stale_while_revalidate(Some(Duration::from_secs(30)));
        assert_eq!(
            config.effective_stale_time(Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(config.effective_stale_time(None), Duration::from_secs(30));
    }

    #[test]
    fn effective_stale_time_falls_back_to_half_default_ttl() {
        let config: CacheConfig<i32> = CacheConfig::new().with_default_ttl(Duration::from_secs(20));
        assert_eq!(config.effective_stale_time(None), Duration::from_secs(10));
    }

    #[test]
    fn effective_stale_time_falls_back_to_five_minutes() {
        let config: CacheConfig<i32> = CacheConfig::new();
        assert_eq!(config.effective_stale_time(None), DEFAULT_STALE_TIME);
    }

    #[test]
    fn on_evicted_callback_fires() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let config: CacheConfig<i32> = CacheConfig::new().with_on_evicted(move |_k, _v, _cause| {
            fired_clone.store(true, Ordering::SeqCst);
        });
        (config.on_evicted.unwrap())("k", &1, RemovalCause::Explicit);
        assert!(fired.load(Ordering::SeqCst));
    }
}
