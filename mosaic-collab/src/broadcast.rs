//! Fan-out of whole snapshots to live subscribers.
//!
//! Uses tokio broadcast channels: one send reaches every subscriber, in
//! send order. Each subscriber buffers up to `capacity` snapshots; a lagging
//! subscriber skips ahead, which is harmless because every message is a full
//! snapshot rather than a delta.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::RwLock;

/// Statistics for monitoring feed health.
#[derive(Debug, Clone, Default)]
pub struct FeedStats {
    pub snapshots_sent: u64,
    /// Sends that found no subscriber.
    pub snapshots_unobserved: u64,
    pub subscribers: usize,
}

/// Atomic feed stats, so publishing never takes a lock.
struct AtomicFeedStats {
    snapshots_sent: AtomicU64,
    snapshots_unobserved: AtomicU64,
}

impl AtomicFeedStats {
    fn new() -> Self {
        Self {
            snapshots_sent: AtomicU64::new(0),
            snapshots_unobserved: AtomicU64::new(0),
        }
    }
}

/// Broadcast channel for the snapshots of one key (a project, a user's list).
pub struct ChangeFeed<T> {
    sender: broadcast::Sender<T>,
    capacity: usize,
    atomic_stats: AtomicFeedStats,
}

impl<T: Clone> ChangeFeed<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            capacity: capacity.max(1),
            atomic_stats: AtomicFeedStats::new(),
        }
    }

    /// Send to every current subscriber. Returns how many received it.
    pub fn publish(&self, snapshot: T) -> usize {
        self.atomic_stats.snapshots_sent.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(snapshot) {
            Ok(count) => count,
            Err(_) => {
                self.atomic_stats
                    .snapshots_unobserved
                    .fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Live subscription whose first item is `initial`.
    pub fn subscribe(&self, initial: T, label: impl Into<String>) -> Subscription<T> {
        Subscription {
            initial: Some(initial),
            rx: self.sender.subscribe(),
            label: label.into(),
            closed: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            snapshots_sent: self.atomic_stats.snapshots_sent.load(Ordering::Relaxed),
            snapshots_unobserved: self.atomic_stats.snapshots_unobserved.load(Ordering::Relaxed),
            subscribers: self.sender.receiver_count(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Push-based live query: the current value first, then every change.
///
/// Ends (`None`) when the feed is dropped, e.g. because the document was
/// deleted.
pub struct Subscription<T> {
    initial: Option<T>,
    rx: broadcast::Receiver<T>,
    label: String,
    closed: bool,
}

impl<T: Clone> Subscription<T> {
    /// Next snapshot. Cancel-safe, so it can sit in a `tokio::select!`.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Feed {}: subscriber lagged, skipped {skipped} snapshots", self.label);
                }
                Err(RecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    /// Next snapshot if one is already buffered.
    pub fn try_next(&mut self) -> Option<T> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Feed {}: subscriber lagged, skipped {skipped} snapshots", self.label);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    /// Drain everything buffered and return the newest snapshot.
    pub fn latest(&mut self) -> Option<T> {
        let mut last = None;
        while let Some(snapshot) = self.try_next() {
            last = Some(snapshot);
        }
        last
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the feed has ended and everything buffered was consumed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Maps keys to change feeds.
///
/// Each key gets its own feed so that subscribers of one project never see
/// another project's traffic.
pub struct FeedRegistry<K, T> {
    feeds: Arc<RwLock<HashMap<K, Arc<ChangeFeed<T>>>>>,
    default_capacity: usize,
}

impl<K, T> FeedRegistry<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    pub fn new(default_capacity: usize) -> Self {
        Self {
            feeds: Arc::new(RwLock::new(HashMap::new())),
            default_capacity,
        }
    }

    /// Get or create the feed for `key`.
    pub async fn get_or_create(&self, key: &K) -> Arc<ChangeFeed<T>> {
        // Fast path: read lock
        {
            let feeds = self.feeds.read().await;
            if let Some(feed) = feeds.get(key) {
                return feed.clone();
            }
        }

        let mut feeds = self.feeds.write().await;
        // Double-check after acquiring write lock
        if let Some(feed) = feeds.get(key) {
            return feed.clone();
        }
        let feed = Arc::new(ChangeFeed::new(self.default_capacity));
        feeds.insert(key.clone(), feed.clone());
        feed
    }

    /// Existing feed for `key`, if anyone ever subscribed.
    pub async fn get(&self, key: &K) -> Option<Arc<ChangeFeed<T>>> {
        self.feeds.read().await.get(key).cloned()
    }

    /// Publish to `key`'s feed if it exists. Returns the receiver count.
    pub async fn publish(&self, key: &K, snapshot: T) -> usize {
        match self.get(key).await {
            Some(feed) => feed.publish(snapshot),
            None => 0,
        }
    }

    /// Drop a feed, ending its subscriptions.
    pub async fn close(&self, key: &K) -> bool {
        self.feeds.write().await.remove(key).is_some()
    }

    /// Drop the feed if nobody listens any more.
    pub async fn remove_if_idle(&self, key: &K) -> bool {
        let mut feeds = self.feeds.write().await;
        if let Some(feed) = feeds.get(key) {
            if feed.subscriber_count() == 0 {
                feeds.remove(key);
                return true;
            }
        }
        false
    }

    pub async fn feed_count(&self) -> usize {
        self.feeds.read().await.len()
    }
}
