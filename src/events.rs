//! Change notification: a broadcast bus of [`CacheEvent`]s, with filtering
//! combinators over [`Subscription`] streams.
//!
//! Grounded on the async-cache background-task pattern in
//! `examples/other_examples/576255da_baptiste0928-async-ttl__src-lib.rs.rs`,
//! adapted from a single expiration callback into a general-purpose
//! multi-subscriber bus via `tokio::sync::broadcast`, matching §6's
//! "stateless signal hook point" framing: this crate only emits events, it
//! never formats or exports them.

use std::time::{Duration, Instant};

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// A single observed change to a cache entry.
///
/// Every variant carries the affected `key`; value-carrying variants clone
/// the value into the event, so subscribers never have to re-acquire the
/// cache's internal lock to see what changed.
#[derive(Clone, Debug)]
pub enum CacheEvent<V> {
    Created { key: String, value: V, at: Instant },
    Updated { key: String, value: V, previous: V, at: Instant },
    Removed { key: String, value: V, at: Instant },
    Expired { key: String, value: V, at: Instant },
    Evicted { key: String, value: V, at: Instant },
    Cleared { at: Instant },
}

impl<V> CacheEvent<V> {
    /// The key this event concerns, if any (`Cleared` has none).
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Created { key, .. }
            | CacheEvent::Updated { key, .. }
            | CacheEvent::Removed { key, .. }
            | CacheEvent::Expired { key, .. }
            | CacheEvent::Evicted { key, .. } => Some(key.as_str()),
            CacheEvent::Cleared { .. } => None,
        }
    }

    pub fn at(&self) -> Instant {
        match self {
            CacheEvent::Created { at, .. }
            | CacheEvent::Updated { at, .. }
            | CacheEvent::Removed { at, .. }
            | CacheEvent::Expired { at, .. }
            | CacheEvent::Evicted { at, .. }
            | CacheEvent::Cleared { at } => *at,
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, CacheEvent::Created { .. } | CacheEvent::Updated { .. })
    }

    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            CacheEvent::Removed { .. } | CacheEvent::Expired { .. } | CacheEvent::Evicted { .. } | CacheEvent::Cleared { .. }
        )
    }

    pub fn is_expiration(&self) -> bool {
        matches!(self, CacheEvent::Expired { .. })
    }

    pub fn is_eviction(&self) -> bool {
        matches!(self, CacheEvent::Evicted { .. })
    }

    /// The variant tag, stripped of its payload — what [`Subscription::where_type`]
    /// matches on.
    pub fn kind(&self) -> CacheEventKind {
        match self {
            CacheEvent::Created { .. } => CacheEventKind::Created,
            CacheEvent::Updated { .. } => CacheEventKind::Updated,
            CacheEvent::Removed { .. } => CacheEventKind::Removed,
            CacheEvent::Expired { .. } => CacheEventKind::Expired,
            CacheEvent::Evicted { .. } => CacheEventKind::Evicted,
            CacheEvent::Cleared { .. } => CacheEventKind::Cleared,
        }
    }
}

/// The variant tag of a [`CacheEvent`], without its payload — lets
/// [`Subscription::where_type`] filter a stream without requiring `V: PartialEq`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    Created,
    Updated,
    Removed,
    Expired,
    Evicted,
    Cleared,
}

/// How many buffered events a lagging subscriber may miss before it starts
/// receiving `RecvError::Lagged` — mirrors a typical broadcast-channel
/// capacity used for best-effort notification buses.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Owns the sending half of the event broadcast; cheap to clone, held by
/// [`crate::Cache`] and every collaborator that wraps it.
#[derive(Clone)]
pub struct EventBus<V> {
    sender: broadcast::Sender<CacheEvent<V>>,
}

impl<V: Clone + Send + 'static> EventBus<V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event. Silently drops it if there are no subscribers
    /// (broadcast channels do not buffer for zero receivers).
    pub fn publish(&self, event: CacheEvent<V>) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Subscription<V> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<V: Clone + Send + 'static> Default for EventBus<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A single subscriber's handle onto the event bus.
///
/// Wraps `tokio::sync::broadcast::Receiver` directly for `recv`/`try_recv`,
/// and exposes `into_stream` plus the filtering combinators for
/// `Stream`-based consumption.
pub struct Subscription<V> {
    receiver: broadcast::Receiver<CacheEvent<V>>,
}

impl<V: Clone + Send + 'static> Subscription<V> {
    pub async fn recv(&mut self) -> Result<CacheEvent<V>, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<CacheEvent<V>, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Converts this subscription into a `Stream`, silently skipping
    /// `Lagged` gaps rather than surfacing them as stream errors — a
    /// best-effort notification bus has no obligation to replay what a slow
    /// subscriber missed.
    pub fn into_stream(self) -> impl Stream<Item = CacheEvent<V>> {
        BroadcastStream::new(self.receiver).filter_map(|item| item.ok())
    }

    pub fn where_type(self, kind: CacheEventKind) -> impl Stream<Item = CacheEvent<V>>
    where
        V: 'static,
    {
        self.into_stream().filter(move |event| event.kind() == kind)
    }

    pub fn where_key(self, key: impl Into<String>) -> impl Stream<Item = CacheEvent<V>>
    where
        V: 'static,
    {
        let key = key.into();
        self.into_stream().filter(move |event| event.key() == Some(key.as_str()))
    }

    pub fn where_key_prefix(self, prefix: impl Into<String>) -> impl Stream<Item = CacheEvent<V>>
    where
        V: 'static,
    {
        let prefix = prefix.into();
        self.into_stream()
            .filter(move |event| event.key().is_some_and(|k| k.starts_with(&prefix)))
    }

    pub fn additions(self) -> impl Stream<Item = CacheEvent<V>>
    where
        V: 'static,
    {
        self.into_stream().filter(CacheEvent::is_addition)
    }

    pub fn removals(self) -> impl Stream<Item = CacheEvent<V>>
    where
        V: 'static,
    {
        self.into_stream().filter(CacheEvent::is_removal)
    }

    pub fn expirations(self) -> impl Stream<Item = CacheEvent<V>>
    where
        V: 'static,
    {
        self.into_stream().filter(CacheEvent::is_expiration)
    }

    pub fn evictions(self) -> impl Stream<Item = CacheEvent<V>>
    where
        V: 'static,
    {
        self.into_stream().filter(CacheEvent::is_eviction)
    }
}

/// Returns the elapsed time since a point previously captured with
/// `Instant::now()` — exists so event timestamps stay testable without
/// reaching for wall-clock time directly in business logic.
pub fn since(earlier: Instant) -> Duration {
    earlier.elapsed()
}
