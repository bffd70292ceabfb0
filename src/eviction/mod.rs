//! Eviction policies: pluggable bookkeeping objects that track access/
//! insertion order and nominate a victim when the cache is over capacity.
//!
//! Each policy tracks only key order, never values — [`crate::Cache`] owns
//! the value store separately and asks the policy "who goes next" when
//! `max_entries` is exceeded, keeping a `HashMap` of entries and a separate
//! order structure rather than folding order into the map.

mod fifo;
mod lfu;
mod lru;
mod none;

pub use fifo::FifoPolicy;
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;
pub use none::NonePolicy;

use std::fmt;

/// Capability every eviction policy implements.
///
/// Implementations are not `Send + Sync` by themselves — [`crate::Cache`]
/// wraps the trait object in a `parking_lot::Mutex` to share it across
/// threads, while the entry map uses a separate `RwLock`.
pub trait EvictionPolicy: fmt::Debug + Send {
    /// Called when `key` is read as a cache hit.
    fn on_access(&mut self, key: &str);

    /// Called when `key` is inserted (new or replacing an existing entry).
    fn on_add(&mut self, key: &str);

    /// Called when `key` is removed for any reason (explicit remove,
    /// eviction, expiration, clear).
    fn on_remove(&mut self, key: &str);

    /// Nominates a key to evict, or `None` if the policy has nothing to
    /// offer (only possible for [`NonePolicy`]).
    fn get_eviction_candidate(&mut self) -> Option<String>;

    /// Drops all tracked state.
    fn clear(&mut self);

    /// Number of keys currently tracked by the policy.
    fn len(&self) -> usize;

    /// True iff the policy tracks no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Selects which [`EvictionPolicy`] implementation a [`crate::Cache`] uses.
///
/// This is the `Copy` selector threaded through [`crate::CacheConfig`] and
/// [`crate::CacheBuilder`]; the trait object it resolves to is an
/// implementation detail the cache owns privately.
///
/// `Fifo`/`Lru` extended with `Lfu` and `None`; `Arc`/`Random`/`Tlru` have no
/// counterpart here and were dropped (see DESIGN.md).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    #[default]
    Fifo,
    Lru,
    Lfu,
    None,
}

impl PolicyKind {
    /// Builds a fresh, empty policy instance for this kind.
    pub fn build(self) -> Box<dyn EvictionPolicy> {
        match self {
            PolicyKind::Fifo => Box::new(FifoPolicy::new()),
            PolicyKind::Lru => Box::new(LruPolicy::new()),
            PolicyKind::Lfu => Box::new(LfuPolicy::new()),
            PolicyKind::None => Box::new(NonePolicy::new()),
        }
    }
}

impl From<&str> for PolicyKind {
    /// Case-insensitive conversion, defaulting to `Fifo` for unrecognized
    /// values.
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "lru" => PolicyKind::Lru,
            "lfu" => PolicyKind::Lfu,
            "none" => PolicyKind::None,
            _ => PolicyKind::Fifo,
        }
    }
}
