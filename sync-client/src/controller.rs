//! SyncController - drives the sync state machine.
//!
//! The controller owns the single remote subscription and the local cache.
//! It feeds connectivity readings and remote deliveries into
//! [`SyncState::on_event`] and performs the returned actions.
//!
//! ```text
//! ConnectivityMonitor ─┐
//!                      ├─> events ─> SyncController ─> MessagePublisher
//! RemoteStream sink  ──┘                 ↓
//!                          sync-core (pure state machine)
//! ```
//!
//! Two ways to run it:
//!
//! - **Session mode:** [`SyncController::spawn`] moves the controller onto a
//!   tokio task wired to a connectivity monitor and returns a
//!   [`SessionHandle`].
//! - **Step mode:** the host calls [`SyncController::handle`] and
//!   [`SyncController::process_pending`] itself. Used by the replay command
//!   and by tests, where every effect is observable right after the call.
//!
//! Falling back to the cache never hides messages already on screen: an
//! unreadable cache keeps the published snapshot, and a live snapshot the
//! cache never took is written (or served from memory) before loading.
//!
//! After a subscription failure the controller resubscribes on its own once
//! [`SyncConfig::retry_delay`] has passed, unless connectivity dropped in
//! the meantime.
//!
//! # Example
//!
//! ```ignore
//! let (controller, publisher) = SyncController::new(config, Arc::new(remote), store);
//! let session = controller.spawn(&monitor);
//!
//! let mut updates = publisher.updates();
//! updates.changed().await?;
//! publisher.send(OutgoingMessage::text("hello")).await?;
//!
//! session.shutdown().await?;
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use chat_sync_core::{Action, Connectivity, Event, SyncNotice, SyncState};
use chat_sync_types::{Snapshot, SubscriptionId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{KeyValueStore, LocalCache};
use crate::connectivity::{ConnectivityMonitor, ObserverHandle};
use crate::publisher::{self, MessagePublisher, PublishState};
use crate::remote::{RemoteEvent, RemoteStream, SnapshotSink, SubscriptionHandle};
use crate::session::SessionHandle;
use crate::SyncConfig;

/// The subscription the controller currently owns.
struct OpenSubscription {
    id: SubscriptionId,
    handle: SubscriptionHandle,
}

/// Owns the sync state and performs its actions.
pub struct SyncController<R, S> {
    config: SyncConfig,
    state: SyncState,
    remote: Arc<R>,
    cache: LocalCache<S>,
    subscription: Option<OpenSubscription>,
    last_persisted: Option<Snapshot>,
    /// Live snapshot whose cache write failed.
    unpersisted: Option<Snapshot>,
    retry: Option<JoinHandle<()>>,
    outputs: PublishState,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl<R: RemoteStream, S: KeyValueStore> SyncController<R, S> {
    /// Create a controller and the publisher its consumers read from.
    ///
    /// Nothing happens until the first connectivity reading arrives.
    pub fn new(config: SyncConfig, remote: Arc<R>, store: S) -> (Self, MessagePublisher<R>) {
        let (outputs, publisher) = publisher::channel(&config, Arc::clone(&remote));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cache = LocalCache::new(store, config.cache_key.clone());

        let controller = Self {
            config,
            state: SyncState::new(),
            remote,
            cache,
            subscription: None,
            last_persisted: None,
            unpersisted: None,
            retry: None,
            outputs,
            events_tx,
            events_rx,
        };
        (controller, publisher)
    }

    /// Current state.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// The configuration this controller runs with.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The local cache.
    pub fn cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    /// Sender for feeding events into the controller's queue.
    pub fn events(&self) -> mpsc::UnboundedSender<Event> {
        self.events_tx.clone()
    }

    /// Register with a connectivity monitor.
    ///
    /// Readings are queued as [`Event::ConnectivityChanged`]. The returned
    /// handle unregisters on drop.
    pub fn attach<M>(&self, monitor: &M) -> ObserverHandle
    where
        M: ConnectivityMonitor + ?Sized,
    {
        let events = self.events_tx.clone();
        monitor.observe(Arc::new(move |is_connected: bool| {
            // Receiver gone means the controller is gone
            let _ = events.send(Event::ConnectivityChanged(Connectivity::from(is_connected)));
        }))
    }

    /// Handle one event, including every event its actions feed back.
    pub async fn handle(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let previous = std::mem::take(&mut self.state);
            let (next, actions) = previous.clone().on_event(event);
            if next != previous {
                debug!(from = ?previous, to = ?next, "sync state transition");
            }
            self.set_state(next);

            for action in actions {
                if let Some(follow_up) = self.execute(action).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    /// Handle every queued event, including ones queued while handling.
    ///
    /// Returns the number of queued events handled.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event).await;
            handled += 1;
        }
        handled
    }

    /// Tear down: close the subscription and stop reacting to events.
    pub async fn teardown(&mut self) {
        self.handle(Event::Teardown).await;
    }

    /// Handle queued events until torn down.
    pub async fn run(mut self) {
        info!(collection = %self.config.collection, "sync controller started");

        while !self.state.is_terminated() {
            match self.events_rx.recv().await {
                Some(event) => self.handle(event).await,
                None => break,
            }
        }

        info!("sync controller stopped");
    }

    /// Run on a tokio task, driven by `monitor`.
    pub fn spawn<M>(self, monitor: &M) -> SessionHandle
    where
        M: ConnectivityMonitor + ?Sized,
        R: 'static,
        S: 'static,
    {
        let events = self.events_tx.clone();
        let observer = self.attach(monitor);
        let task = tokio::spawn(self.run());
        SessionHandle::new(events, task, observer)
    }

    // =========================================================================
    // Action interpretation
    // =========================================================================

    async fn execute(&mut self, action: Action) -> Option<Event> {
        match action {
            Action::Subscribe { subscription } => self.open_subscription(subscription).await,
            Action::Unsubscribe { subscription } => {
                self.close_subscription(subscription);
                None
            }
            Action::LoadCache => self.load_cache().await,
            Action::PersistSnapshot { snapshot } => {
                self.persist(snapshot).await;
                None
            }
            Action::Publish { snapshot } => {
                self.publish(snapshot);
                None
            }
            Action::EmitNotice(notice) => {
                self.emit(notice);
                None
            }
            Action::ScheduleRetry { subscription } => {
                self.schedule_retry(subscription);
                None
            }
        }
    }

    async fn open_subscription(&mut self, id: SubscriptionId) -> Option<Event> {
        self.cancel_retry();
        if let Some(mut leftover) = self.subscription.take() {
            warn!(subscription = %leftover.id, "closing subscription left open");
            leftover.handle.unsubscribe();
        }

        let events = self.events_tx.clone();
        let sink: SnapshotSink = Arc::new(move |delivery: RemoteEvent| {
            let event = match delivery {
                RemoteEvent::Snapshot(messages) => Event::SnapshotReceived {
                    subscription: id,
                    snapshot: Snapshot::new(messages),
                },
                RemoteEvent::Failed(e) => Event::SubscriptionFailed {
                    subscription: id,
                    error: e.to_string(),
                },
            };
            let _ = events.send(event);
        });

        match self.remote.subscribe(&self.config.collection, sink).await {
            Ok(handle) => {
                info!(
                    subscription = %id,
                    collection = %self.config.collection,
                    "subscribed to remote messages"
                );
                self.subscription = Some(OpenSubscription { id, handle });
                None
            }
            Err(e) => {
                warn!(subscription = %id, error = %e, "remote subscription failed");
                Some(Event::SubscriptionFailed {
                    subscription: id,
                    error: e.to_string(),
                })
            }
        }
    }

    fn close_subscription(&mut self, id: SubscriptionId) {
        match self.subscription.take() {
            Some(mut open) => {
                if open.id != id {
                    warn!(expected = %id, open = %open.id, "closing unexpected subscription");
                }
                open.handle.unsubscribe();
                info!(subscription = %open.id, "unsubscribed from remote messages");
            }
            // Failed at open time, nothing to close
            None => debug!(subscription = %id, "no open subscription to close"),
        }
    }

    async fn persist(&mut self, snapshot: Snapshot) {
        if self.last_persisted.as_ref() == Some(&snapshot) {
            debug!("snapshot unchanged, skipping cache write");
            self.unpersisted = None;
            return;
        }

        match self.cache.save(&snapshot).await {
            Ok(()) => {
                debug!(messages = snapshot.len(), key = %self.cache.key(), "cached snapshot");
                self.last_persisted = Some(snapshot);
                self.unpersisted = None;
            }
            Err(e) => {
                warn!(error = %e, "failed to cache snapshot");
                self.unpersisted = Some(snapshot);
            }
        }
    }

    async fn load_cache(&mut self) -> Option<Event> {
        // The cache is older than what is on screen until this write lands
        if let Some(snapshot) = self.unpersisted.take() {
            self.persist(snapshot).await;
            if let Some(snapshot) = &self.unpersisted {
                warn!(messages = snapshot.len(), "serving uncached live snapshot from memory");
                return Some(Event::CacheLoaded {
                    snapshot: snapshot.clone(),
                });
            }
        }

        match self.cache.try_load().await {
            Ok(snapshot) => {
                let snapshot = snapshot.unwrap_or_default();
                debug!(key = %self.cache.key(), messages = snapshot.len(), "loaded cached snapshot");
                Some(Event::CacheLoaded { snapshot })
            }
            Err(e) => {
                warn!(key = %self.cache.key(), error = %e, "cache unreadable, keeping published snapshot");
                None
            }
        }
    }

    fn schedule_retry(&mut self, subscription: SubscriptionId) {
        let Some(delay) = self.config.retry_delay else {
            debug!(subscription = %subscription, "timed retry disabled, waiting for connectivity");
            return;
        };

        self.cancel_retry();
        let events = self.events_tx.clone();
        self.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::RetryDue { subscription });
        }));
        info!(
            subscription = %subscription,
            delay_ms = delay.as_millis() as u64,
            "scheduled resubscribe"
        );
    }

    fn cancel_retry(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }

    fn publish(&self, snapshot: Snapshot) {
        let count = snapshot.len();
        let changed = self.outputs.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });

        if changed {
            debug!(messages = count, "published snapshot");
        }
    }

    fn emit(&self, notice: SyncNotice) {
        if notice == SyncNotice::ConnectionLost && !self.config.connection_notices {
            return;
        }
        info!(?notice, "sync notice");
        // No receivers is fine
        let _ = self.outputs.notices.send(notice);
    }

    fn set_state(&mut self, next: SyncState) {
        self.state = next;
        let state = &self.state;
        self.outputs.state.send_if_modified(|current| {
            if current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
    }
}

impl<R, S> Drop for SyncController<R, S> {
    fn drop(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }
}
