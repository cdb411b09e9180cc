//! Snapshot subscriptions.
//!
//! The source UI resynced through ambient database callbacks firing into
//! global state. The replacement is explicit: a feed publishes full-state
//! snapshots into a watch channel, subscribers pull them as a lazy sequence
//! and unsubscribe when torn down.

use std::sync::Mutex;

use rustc_hash::FxHashMap;
use tokio::sync::watch;

/// One snapshot feed. Subscribers always observe the latest published state;
/// intermediate snapshots may be skipped, never reordered.
#[derive(Debug)]
pub struct SnapshotFeed<T> {
    sender: watch::Sender<T>,
}

impl<T: Clone> SnapshotFeed<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);

        Self { sender }
    }

    /// Publish a new snapshot to all current subscribers.
    pub fn publish(&self, snapshot: T) {
        // send_replace keeps the value fresh even with zero subscribers, so a
        // later subscriber starts from the latest state.
        let _previous = self.sender.send_replace(snapshot);
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A handle onto a feed's snapshot sequence.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: watch::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    /// The most recently published snapshot.
    #[must_use]
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next snapshot published after the last one observed.
    ///
    /// Returns `None` once the feed has been dropped and no further
    /// snapshots can arrive.
    pub async fn next(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;

        Some(self.receiver.borrow_and_update().clone())
    }

    /// Explicitly end this subscription.
    pub fn unsubscribe(self) {}
}

/// Keyed registry of feeds, one per key, created on first use.
///
/// Feeds with no remaining subscribers are pruned on publish so a long-lived
/// registry does not accumulate state for every identity that ever looked.
#[derive(Debug)]
pub struct FeedRegistry<K, T> {
    feeds: Mutex<FxHashMap<K, SnapshotFeed<T>>>,
}

impl<K, T> FeedRegistry<K, T>
where
    K: Copy + Eq + std::hash::Hash,
    T: Clone + Default,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            feeds: Mutex::new(FxHashMap::default()),
        }
    }

    /// Subscribe to the feed for `key`, creating it if absent.
    ///
    /// # Panics
    ///
    /// Panics if the registry mutex is poisoned.
    #[must_use]
    pub fn subscribe(&self, key: K) -> Subscription<T> {
        let mut feeds = self.feeds.lock().expect("feed registry lock poisoned");

        feeds
            .entry(key)
            .or_insert_with(|| SnapshotFeed::new(T::default()))
            .subscribe()
    }

    /// Publish a snapshot for `key`. A no-op when nobody ever subscribed.
    ///
    /// # Panics
    ///
    /// Panics if the registry mutex is poisoned.
    pub fn publish(&self, key: K, snapshot: T) {
        let mut feeds = self.feeds.lock().expect("feed registry lock poisoned");

        if let Some(feed) = feeds.get(&key) {
            if feed.subscriber_count() == 0 {
                feeds.remove(&key);
            } else {
                feed.publish(snapshot);
            }
        }
    }
}

impl<K, T> Default for FeedRegistry<K, T>
where
    K: Copy + Eq + std::hash::Hash,
    T: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_sees_published_snapshots() {
        let feed = SnapshotFeed::new(0_u32);
        let mut subscription = feed.subscribe();

        feed.publish(7);

        assert_eq!(subscription.next().await, Some(7));
        assert_eq!(subscription.current(), 7);
    }

    #[tokio::test]
    async fn next_returns_none_after_feed_drop() {
        let feed = SnapshotFeed::new(0_u32);
        let mut subscription = feed.subscribe();

        drop(feed);

        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn late_subscriber_starts_from_latest_state() {
        let feed = SnapshotFeed::new(0_u32);

        feed.publish(3);
        feed.publish(9);

        let subscription = feed.subscribe();

        assert_eq!(subscription.current(), 9);
    }

    #[tokio::test]
    async fn registry_isolates_keys() {
        let registry: FeedRegistry<u8, u32> = FeedRegistry::new();

        let mut a = registry.subscribe(1);
        let b = registry.subscribe(2);

        registry.publish(1, 42);

        assert_eq!(a.next().await, Some(42));
        assert_eq!(b.current(), 0, "other key must not observe the publish");
    }

    #[tokio::test]
    async fn registry_prunes_abandoned_feeds() {
        let registry: FeedRegistry<u8, u32> = FeedRegistry::new();

        let subscription = registry.subscribe(1);
        subscription.unsubscribe();

        // First publish after the last unsubscribe prunes the feed.
        registry.publish(1, 5);

        let fresh = registry.subscribe(1);
        assert_eq!(fresh.current(), 0, "pruned feed must restart from default");
    }
}
