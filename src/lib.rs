//! # cachecore
//!
//! A general-purpose, in-process caching library. Values of any type are
//! stored under string keys with optional TTL metadata, reclaimed on
//! expiration, and evicted under a configurable capacity according to a
//! selectable policy (LRU, LFU, FIFO, or none).
//!
//! ## Module organization
//!
//! - [`entry`] - the TTL-aware value wrapper every other module builds on
//! - [`eviction`] - pluggable LRU/LFU/FIFO/None eviction policies
//! - [`cache`] - the core engine: capacity enforcement, expiration sweeps,
//!   lifecycle events, stale-while-revalidate
//! - [`config`] / [`builder`] - the two ways to assemble a [`Cache`]
//! - [`metrics`] - hit/miss counters and latency percentiles
//! - [`events`] - the lifecycle event stream
//! - [`store`] - the `Store` trait plus in-memory and on-disk implementations
//! - [`path`] - the namespace key-prefixing convention
//! - [`loading_cache`] - single-flight async loading on top of `Cache`
//! - [`namespaced_cache`] - prefix-scoped views onto a shared `Cache`
//! - [`tiered_cache`] - L1/L2 orchestration with write-through and promotion
//! - [`error`] - the crate's `CacheError`/`CacheResult`
//!
//! This crate never reads environment variables or config files, and never
//! installs a global `tracing` subscriber — both remain the embedding
//! application's responsibility.

pub mod builder;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod eviction;
pub mod loading_cache;
pub mod metrics;
pub mod namespaced_cache;
pub mod path;
pub mod store;
pub mod tiered_cache;

pub use builder::{CacheBuilder, SyncCache};
pub use cache::{Cache, CacheSnapshot, RemovalCause};
pub use config::{CacheConfig, OnEvicted};
pub use entry::Entry;
pub use error::{CacheError, CacheResult};
pub use events::{CacheEvent, CacheEventKind, EventBus, Subscription};
pub use eviction::{EvictionPolicy, FifoPolicy, LfuPolicy, LruPolicy, NonePolicy, PolicyKind};
pub use loading_cache::LoadingCache;
pub use metrics::{LatencySummary, Metrics, MetricsSnapshot};
pub use namespaced_cache::{NamespaceView, NamespacedCache};
pub use store::{FileStore, MemoryStore, Store};
pub use tiered_cache::TieredCache;
