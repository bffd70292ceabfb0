//! Access-pattern counters and latency reservoirs.
//!
//! Grounded on the teacher's `CacheStats` (`stats.rs`): atomic counters with
//! `Relaxed` ordering for hit/miss bookkeeping, extended per the
//! specification with put/remove/eviction/expiration counters and bounded
//! latency reservoirs for P50/P95/P99 reporting.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum number of recent latency samples kept per operation kind.
const RESERVOIR_CAPACITY: usize = 1000;

/// Access-pattern counters and latency reservoirs for a single [`crate::Cache`].
///
/// Installed only when `CacheConfig::record_stats` is set; otherwise
/// [`crate::Cache`] holds [`Metrics::Disabled`], whose recording methods are
/// no-ops, matching §4.4's "A `Disabled` variant silently drops all
/// recordings."
#[derive(Debug)]
pub enum Metrics {
    Enabled(MetricsInner),
    Disabled,
}

impl Metrics {
    pub fn enabled() -> Self {
        Metrics::Enabled(MetricsInner::new())
    }

    pub fn disabled() -> Self {
        Metrics::Disabled
    }

    pub fn record_hit(&self) {
        if let Metrics::Enabled(inner) = self {
            inner.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self) {
        if let Metrics::Enabled(inner) = self {
            inner.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_put(&self) {
        if let Metrics::Enabled(inner) = self {
            inner.puts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_remove(&self) {
        if let Metrics::Enabled(inner) = self {
            inner.removes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_eviction(&self) {
        if let Metrics::Enabled(inner) = self {
            inner.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_expiration(&self) {
        if let Metrics::Enabled(inner) = self {
            inner.expirations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_get_latency(&self, elapsed: Duration) {
        if let Metrics::Enabled(inner) = self {
            inner.get_latency.record(elapsed);
        }
    }

    pub fn record_put_latency(&self, elapsed: Duration) {
        if let Metrics::Enabled(inner) = self {
            inner.put_latency.record(elapsed);
        }
    }

    /// Point-in-time summary of every counter and latency quantile.
    /// Returns all-zero values when disabled.
    pub fn snapshot(&self) -> MetricsSnapshot {
        match self {
            Metrics::Enabled(inner) => inner.snapshot(),
            Metrics::Disabled => MetricsSnapshot::default(),
        }
    }
}

/// The enabled backing store for [`Metrics`]: atomic counters plus two
/// latency reservoirs (get/put).
#[derive(Debug, Default)]
pub struct MetricsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removes: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    get_latency: LatencyReservoir,
    put_latency: LatencyReservoir,
}

impl MetricsInner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn removes(&self) -> u64 {
        self.removes.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn gets(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets();
        if gets == 0 {
            0.0
        } else {
            self.hits() as f64 / gets as f64
        }
    }

    pub fn miss_ratio(&self) -> f64 {
        1.0 - self.hit_ratio()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            puts: self.puts(),
            removes: self.removes(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            gets: self.gets(),
            hit_ratio: self.hit_ratio(),
            miss_ratio: self.miss_ratio(),
            get_latency: self.get_latency.summary(),
            put_latency: self.put_latency.summary(),
        }
    }
}

/// A bounded ring buffer of the most recent [`RESERVOIR_CAPACITY`] samples,
/// plus running totals that are independent of the reservoir (averages are
/// computed from the totals, never from the windowed reservoir, per §4.4).
#[derive(Debug, Default)]
struct LatencyReservoir {
    samples: Mutex<VecDeque<Duration>>,
    total_nanos: AtomicU64,
    count: AtomicU64,
}

impl LatencyReservoir {
    fn record(&self, elapsed: Duration) {
        self.total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let mut samples = self.samples.lock();
        samples.push_back(elapsed);
        if samples.len() > RESERVOIR_CAPACITY {
            samples.pop_front();
        }
    }

    fn average(&self) -> Duration {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        let total = self.total_nanos.load(Ordering::Relaxed);
        Duration::from_nanos(total / count)
    }

    fn summary(&self) -> LatencySummary {
        let mut sorted: Vec<Duration> = self.samples.lock().iter().copied().collect();
        sorted.sort_unstable();
        LatencySummary {
            average: self.average(),
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            sample_count: sorted.len(),
        }
    }
}

/// Indexes a sorted sample set at `round((n-1)*q)`, per §4.4.
fn percentile(sorted: &[Duration], q: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let n = sorted.len();
    let idx = ((n - 1) as f64 * q).round() as usize;
    sorted[idx.min(n - 1)]
}

/// Latency quantiles for one operation kind (`get` or `put`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub average: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub sample_count: usize,
}

/// Immutable point-in-time copy of all counters and latency summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub removes: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub gets: u64,
    pub hit_ratio: f64,
    pub miss_ratio: f64,
    pub get_latency: LatencySummary,
    pub put_latency: LatencySummary,
}

/// A timing scope that records its elapsed duration into a [`Metrics`] on
/// drop — used internally so `Cache::get`/`set` don't have to manually
/// thread `Instant::now()` through every early return.
pub struct LatencyTimer<'a> {
    start: std::time::Instant,
    metrics: &'a Metrics,
    kind: LatencyKind,
}

#[derive(Clone, Copy)]
pub enum LatencyKind {
    Get,
    Put,
}

impl<'a> LatencyTimer<'a> {
    pub fn start(metrics: &'a Metrics, kind: LatencyKind) -> Self {
        Self {
            start: std::time::Instant::now(),
            metrics,
            kind,
        }
    }
}

impl Drop for LatencyTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        match self.kind {
            LatencyKind::Get => self.metrics.record_get_latency(elapsed),
            LatencyKind::Put => self.metrics.record_put_latency(elapsed),
        }
    }
}
