//! In-memory remote message store.
//!
//! Behaves like the hosted document store from the engine's point of view:
//! ordered collections, full-snapshot delivery on subscribe and on every
//! change, and listeners that stop on unsubscribe. Also records what
//! happened (subscribe/unsubscribe counts, peak open listeners, writes) and
//! lets tests inject failures.

use super::{RemoteError, RemoteEvent, RemoteStream, SnapshotSink, SubscriptionHandle};
use async_trait::async_trait;
use chat_sync_types::{Message, Snapshot};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Closed listeners kept for [`MemoryRemote::deliver_to_closed`].
const CLOSED_LISTENER_LIMIT: usize = 8;

/// In-memory remote store.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// engine owns another.
#[derive(Default, Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryRemoteInner>>,
}

#[derive(Default)]
struct MemoryRemoteInner {
    collections: HashMap<String, Vec<Message>>,
    listeners: HashMap<u64, Listener>,
    closed_listeners: Vec<Listener>,
    next_listener: u64,
    subscribe_calls: usize,
    unsubscribe_calls: usize,
    peak_open: usize,
    written: Vec<Message>,
    held_writes: Vec<(String, Message)>,
    hold_writes: bool,
    fail_next_subscribe: Option<String>,
    fail_next_write: Option<String>,
}

struct Listener {
    collection: String,
    sink: SnapshotSink,
}

impl MemoryRemoteInner {
    fn ordered(&self, collection: &str) -> Vec<Message> {
        let messages = self.collections.get(collection).cloned().unwrap_or_default();
        Snapshot::new(messages).into_messages()
    }

    fn sinks_for(&self, collection: &str) -> Vec<SnapshotSink> {
        self.listeners
            .values()
            .filter(|l| l.collection == collection)
            .map(|l| Arc::clone(&l.sink))
            .collect()
    }
}

fn lock(inner: &Mutex<MemoryRemoteInner>) -> MutexGuard<'_, MemoryRemoteInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn deliver(sinks: Vec<SnapshotSink>, event: RemoteEvent) {
    for sink in sinks {
        sink(event.clone());
    }
}

impl MemoryRemote {
    /// Create an empty remote store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message as if another client had written it.
    ///
    /// Every open listener on the collection gets the new snapshot.
    pub fn insert(&self, collection: &str, message: Message) {
        let (sinks, snapshot) = {
            let mut inner = lock(&self.inner);
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(message);
            (inner.sinks_for(collection), inner.ordered(collection))
        };
        deliver(sinks, RemoteEvent::Snapshot(snapshot));
    }

    /// Re-deliver the current snapshot to every open listener on the collection.
    pub fn redeliver(&self, collection: &str) {
        let (sinks, snapshot) = {
            let inner = lock(&self.inner);
            (inner.sinks_for(collection), inner.ordered(collection))
        };
        deliver(sinks, RemoteEvent::Snapshot(snapshot));
    }

    /// Break every open listener on the collection.
    ///
    /// Listeners stay registered until their owner unsubscribes, like a
    /// real SDK listener whose error callback fired.
    pub fn fail_listeners(&self, collection: &str, error: &str) {
        let sinks = lock(&self.inner).sinks_for(collection);
        deliver(
            sinks,
            RemoteEvent::Failed(RemoteError::Subscription(error.to_string())),
        );
    }

    /// Deliver a snapshot to listeners that were already unsubscribed.
    ///
    /// Simulates a transport that flushes a late callback after teardown.
    /// Only the most recently closed listeners are kept.
    pub fn deliver_to_closed(&self, messages: Vec<Message>) {
        let sinks: Vec<SnapshotSink> = lock(&self.inner)
            .closed_listeners
            .iter()
            .map(|l| Arc::clone(&l.sink))
            .collect();
        deliver(sinks, RemoteEvent::Snapshot(messages));
    }

    /// Accept writes without applying them until `release_held_writes()`.
    pub fn hold_writes(&self, hold: bool) {
        lock(&self.inner).hold_writes = hold;
    }

    /// Apply writes accepted while holding, notifying listeners.
    pub fn release_held_writes(&self) {
        let held = std::mem::take(&mut lock(&self.inner).held_writes);
        for (collection, message) in held {
            self.insert(&collection, message);
        }
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        lock(&self.inner).fail_next_subscribe = Some(error.to_string());
    }

    /// Cause the next write() to fail with the given error.
    pub fn fail_next_write(&self, error: &str) {
        lock(&self.inner).fail_next_write = Some(error.to_string());
    }

    /// Messages stored in a collection, newest first.
    pub fn messages(&self, collection: &str) -> Vec<Message> {
        lock(&self.inner).ordered(collection)
    }

    /// Every message accepted by write(), in call order.
    pub fn written(&self) -> Vec<Message> {
        lock(&self.inner).written.clone()
    }

    /// Number of listeners currently open.
    pub fn open_subscriptions(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// Highest number of listeners ever open at the same time.
    pub fn peak_open_subscriptions(&self) -> usize {
        lock(&self.inner).peak_open
    }

    /// Number of successful subscribe() calls.
    pub fn subscribe_calls(&self) -> usize {
        lock(&self.inner).subscribe_calls
    }

    /// Number of listeners closed through their handle.
    pub fn unsubscribe_calls(&self) -> usize {
        lock(&self.inner).unsubscribe_calls
    }
}

impl fmt::Debug for MemoryRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MemoryRemote")
            .field("collections", &inner.collections.len())
            .field("open_subscriptions", &inner.listeners.len())
            .field("written", &inner.written.len())
            .finish()
    }
}

#[async_trait]
impl RemoteStream for MemoryRemote {
    async fn subscribe(
        &self,
        collection: &str,
        sink: SnapshotSink,
    ) -> Result<SubscriptionHandle, RemoteError> {
        let (id, snapshot) = {
            let mut inner = lock(&self.inner);

            // Check for forced failure
            if let Some(error) = inner.fail_next_subscribe.take() {
                return Err(RemoteError::Subscription(error));
            }

            inner.next_listener += 1;
            let id = inner.next_listener;
            inner.subscribe_calls += 1;
            inner.listeners.insert(
                id,
                Listener {
                    collection: collection.to_string(),
                    sink: Arc::clone(&sink),
                },
            );
            inner.peak_open = inner.peak_open.max(inner.listeners.len());
            (id, inner.ordered(collection))
        };

        sink(RemoteEvent::Snapshot(snapshot));

        let shared = Arc::clone(&self.inner);
        Ok(SubscriptionHandle::new(id, move || {
            let mut inner = lock(&shared);
            if let Some(listener) = inner.listeners.remove(&id) {
                inner.unsubscribe_calls += 1;
                if inner.closed_listeners.len() == CLOSED_LISTENER_LIMIT {
                    inner.closed_listeners.remove(0);
                }
                inner.closed_listeners.push(listener);
            }
        }))
    }

    async fn write(&self, collection: &str, message: &Message) -> Result<(), RemoteError> {
        {
            let mut inner = lock(&self.inner);

            // Check for forced failure
            if let Some(error) = inner.fail_next_write.take() {
                return Err(RemoteError::Write(error));
            }

            inner.written.push(message.clone());
            if inner.hold_writes {
                inner
                    .held_writes
                    .push((collection.to_string(), message.clone()));
                return Ok(());
            }
        }

        self.insert(collection, message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_sync_types::{Author, MessageId};
    use chrono::{TimeZone, Utc};

    const COLLECTION: &str = "messages";

    fn msg(id: &str, secs: i64) -> Message {
        Message::new(
            MessageId::new(id),
            "hi",
            Utc.timestamp_opt(secs, 0).unwrap(),
            Author::new("u1", "Ada"),
            None,
        )
        .unwrap()
    }

    fn recording_sink() -> (SnapshotSink, Arc<Mutex<Vec<RemoteEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let sink: SnapshotSink = Arc::new(move |event: RemoteEvent| log.lock().unwrap().push(event));
        (sink, seen)
    }

    fn snapshot_ids(event: &RemoteEvent) -> Vec<String> {
        match event {
            RemoteEvent::Snapshot(messages) => {
                messages.iter().map(|m| m.id().to_string()).collect()
            }
            RemoteEvent::Failed(e) => panic!("unexpected failure {e}"),
        }
    }

    // ===========================================
    // Subscription Tests
    // ===========================================

    #[tokio::test]
    async fn subscribe_delivers_current_snapshot_immediately() {
        let remote = MemoryRemote::new();
        remote.insert(COLLECTION, msg("a", 1));
        let (sink, seen) = recording_sink();

        let _handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(snapshot_ids(&seen[0]), vec!["a"]);
    }

    #[tokio::test]
    async fn snapshots_are_full_and_newest_first() {
        let remote = MemoryRemote::new();
        let (sink, seen) = recording_sink();
        let _handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        remote.insert(COLLECTION, msg("a", 1));
        remote.insert(COLLECTION, msg("b", 2));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(snapshot_ids(&seen[2]), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let remote = MemoryRemote::new();
        let (sink, seen) = recording_sink();
        let mut handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        handle.unsubscribe();
        remote.insert(COLLECTION, msg("a", 1));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(remote.open_subscriptions(), 0);
        assert_eq!(remote.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let remote = MemoryRemote::new();
        let (sink, _) = recording_sink();
        let mut handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        handle.unsubscribe();
        handle.unsubscribe();
        drop(handle);

        assert_eq!(remote.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn other_collections_are_not_delivered() {
        let remote = MemoryRemote::new();
        let (sink, seen) = recording_sink();
        let _handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        remote.insert("other", msg("x", 1));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn peak_tracks_concurrent_listeners() {
        let remote = MemoryRemote::new();
        let (sink, _) = recording_sink();

        let first = remote.subscribe(COLLECTION, Arc::clone(&sink)).await.unwrap();
        let second = remote.subscribe(COLLECTION, sink).await.unwrap();
        drop(first);
        drop(second);

        assert_eq!(remote.peak_open_subscriptions(), 2);
        assert_eq!(remote.subscribe_calls(), 2);
        assert_eq!(remote.open_subscriptions(), 0);
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn forced_subscribe_failure() {
        let remote = MemoryRemote::new();
        remote.fail_next_subscribe("permission denied");
        let (sink, seen) = recording_sink();

        let result = remote.subscribe(COLLECTION, Arc::clone(&sink)).await;
        assert!(matches!(result, Err(RemoteError::Subscription(_))));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(remote.open_subscriptions(), 0);

        // Next subscribe should work
        let _handle = remote.subscribe(COLLECTION, sink).await.unwrap();
        assert_eq!(remote.open_subscriptions(), 1);
    }

    #[tokio::test]
    async fn forced_write_failure() {
        let remote = MemoryRemote::new();
        remote.fail_next_write("quota exceeded");

        let result = remote.write(COLLECTION, &msg("a", 1)).await;
        assert!(matches!(result, Err(RemoteError::Write(_))));
        assert!(remote.written().is_empty());

        // Next write should work
        remote.write(COLLECTION, &msg("a", 1)).await.unwrap();
        assert_eq!(remote.written().len(), 1);
    }

    #[tokio::test]
    async fn failing_listeners_reports_error() {
        let remote = MemoryRemote::new();
        let (sink, seen) = recording_sink();
        let _handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        remote.fail_listeners(COLLECTION, "stream reset");

        let seen = seen.lock().unwrap();
        assert!(matches!(
            &seen[1],
            RemoteEvent::Failed(RemoteError::Subscription(e)) if e == "stream reset"
        ));
    }

    // ===========================================
    // Write Tests
    // ===========================================

    #[tokio::test]
    async fn write_echoes_to_listeners() {
        let remote = MemoryRemote::new();
        let (sink, seen) = recording_sink();
        let _handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        remote.write(COLLECTION, &msg("w", 1)).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(snapshot_ids(&seen[1]), vec!["w"]);
    }

    #[tokio::test]
    async fn held_writes_apply_on_release() {
        let remote = MemoryRemote::new();
        remote.hold_writes(true);
        let (sink, seen) = recording_sink();
        let _handle = remote.subscribe(COLLECTION, sink).await.unwrap();

        remote.write(COLLECTION, &msg("w", 1)).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(remote.messages(COLLECTION).is_empty());

        remote.release_held_writes();
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(remote.messages(COLLECTION).len(), 1);
    }

    #[tokio::test]
    async fn closed_listeners_can_receive_late_deliveries() {
        let remote = MemoryRemote::new();
        let (sink, seen) = recording_sink();
        let mut handle = remote.subscribe(COLLECTION, sink).await.unwrap();
        handle.unsubscribe();

        remote.deliver_to_closed(vec![msg("late", 1)]);

        let seen = seen.lock().unwrap();
        assert_eq!(snapshot_ids(&seen[1]), vec!["late"]);
    }

    #[tokio::test]
    async fn closed_listeners_are_bounded() {
        let remote = MemoryRemote::new();
        let (sink, seen) = recording_sink();

        for _ in 0..CLOSED_LISTENER_LIMIT * 3 {
            let mut handle = remote.subscribe(COLLECTION, Arc::clone(&sink)).await.unwrap();
            handle.unsubscribe();
        }
        seen.lock().unwrap().clear();

        remote.deliver_to_closed(vec![msg("late", 1)]);

        assert_eq!(seen.lock().unwrap().len(), CLOSED_LISTENER_LIMIT);
        assert_eq!(lock(&remote.inner).closed_listeners.len(), CLOSED_LISTENER_LIMIT);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let remote1 = MemoryRemote::new();
        let remote2 = remote1.clone();

        remote1.write(COLLECTION, &msg("a", 1)).await.unwrap();

        assert_eq!(remote2.messages(COLLECTION).len(), 1);
    }
}
