//! Sync state machine for chat-sync.
//!
//! This module provides a pure, side-effect-free state machine deciding
//! whether the client is live (subscribed to the remote message stream) or
//! serving the local cache. The state machine takes events as input and
//! produces a new state plus a list of actions to execute.
//!
//! The actual I/O (subscribing, reading and writing the cache, publishing)
//! is performed by sync-client, not by this module.
//!
//! Resource rule: the actions produced for any event sequence never leave
//! more than one subscription open, and `Unsubscribe` for the open
//! subscription always comes before anything else in the same action list.

use chat_sync_types::{Snapshot, SubscriptionId};

use crate::Connectivity;

/// Sync state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Connectivity not resolved yet; nothing opened, nothing published.
    Unknown,
    /// Subscribed to the remote message stream.
    SubscribedLive {
        /// The subscription currently open.
        subscription: SubscriptionId,
    },
    /// Serving the cached snapshot; no subscription open.
    ServingCache {
        /// The last subscription that was open, used to number the next one.
        last_subscription: Option<SubscriptionId>,
        /// A resubscribe is scheduled for `last_subscription` failing.
        /// Cleared by an offline reading.
        retry_pending: bool,
    },
    /// Torn down. Final; every further event is ignored.
    Terminated,
}

impl SyncState {
    /// Create a new state machine in the Unknown state.
    pub fn new() -> Self {
        Self::Unknown
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Terminal state swallows everything
            (Self::Terminated, _) => (Self::Terminated, vec![]),

            // Teardown from any live state
            (Self::SubscribedLive { subscription }, Event::Teardown) => (
                Self::Terminated,
                vec![Action::Unsubscribe { subscription }],
            ),
            (_, Event::Teardown) => (Self::Terminated, vec![]),

            // Unknown readings never touch the subscription
            (state, Event::ConnectivityChanged(Connectivity::Unknown)) => (state, vec![]),

            // From Unknown
            (Self::Unknown, Event::ConnectivityChanged(Connectivity::Online)) => {
                let subscription = SubscriptionId::FIRST;
                (
                    Self::SubscribedLive { subscription },
                    vec![Action::Subscribe { subscription }],
                )
            }
            (Self::Unknown, Event::ConnectivityChanged(Connectivity::Offline)) => (
                Self::ServingCache {
                    last_subscription: None,
                    retry_pending: false,
                },
                vec![
                    Action::EmitNotice(SyncNotice::ConnectionLost),
                    Action::LoadCache,
                ],
            ),

            // From SubscribedLive
            (Self::SubscribedLive { subscription }, Event::ConnectivityChanged(Connectivity::Online)) => {
                // Redundant signal: the open subscription stays the only one
                (Self::SubscribedLive { subscription }, vec![])
            }
            (Self::SubscribedLive { subscription }, Event::ConnectivityChanged(Connectivity::Offline)) => (
                Self::ServingCache {
                    last_subscription: Some(subscription),
                    retry_pending: false,
                },
                vec![
                    Action::Unsubscribe { subscription },
                    Action::EmitNotice(SyncNotice::ConnectionLost),
                    Action::LoadCache,
                ],
            ),
            (
                Self::SubscribedLive { subscription },
                Event::SnapshotReceived {
                    subscription: from,
                    snapshot,
                },
            ) if from == subscription => (
                Self::SubscribedLive { subscription },
                vec![
                    Action::PersistSnapshot {
                        snapshot: snapshot.clone(),
                    },
                    Action::Publish { snapshot },
                ],
            ),
            (
                Self::SubscribedLive { subscription },
                Event::SubscriptionFailed {
                    subscription: from,
                    error,
                },
            ) if from == subscription => (
                Self::ServingCache {
                    last_subscription: Some(subscription),
                    retry_pending: true,
                },
                vec![
                    Action::Unsubscribe { subscription },
                    Action::EmitNotice(SyncNotice::SubscriptionFailed { error }),
                    Action::LoadCache,
                    Action::ScheduleRetry { subscription },
                ],
            ),

            // From ServingCache
            (Self::ServingCache { last_subscription, .. }, Event::ConnectivityChanged(Connectivity::Online)) => {
                let subscription = last_subscription
                    .map(|id| id.next())
                    .unwrap_or(SubscriptionId::FIRST);
                (
                    Self::SubscribedLive { subscription },
                    vec![Action::Subscribe { subscription }],
                )
            }
            (
                Self::ServingCache {
                    last_subscription,
                    retry_pending: true,
                },
                Event::ConnectivityChanged(Connectivity::Offline),
            ) => (
                // Offline means the next online reading resubscribes instead
                Self::ServingCache {
                    last_subscription,
                    retry_pending: false,
                },
                vec![],
            ),
            (
                Self::ServingCache {
                    last_subscription: Some(failed),
                    retry_pending: true,
                },
                Event::RetryDue { subscription },
            ) if subscription == failed => {
                let subscription = failed.next();
                (
                    Self::SubscribedLive { subscription },
                    vec![Action::Subscribe { subscription }],
                )
            }
            (state @ Self::ServingCache { .. }, Event::CacheLoaded { snapshot }) => {
                (state, vec![Action::Publish { snapshot }])
            }

            // Stale deliveries and retries, redundant offline signals, late cache loads
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently subscribed to the remote stream.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::SubscribedLive { .. })
    }

    /// Check if currently serving the cache.
    pub fn is_serving_cache(&self) -> bool {
        matches!(self, Self::ServingCache { .. })
    }

    /// Check if torn down.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// The open subscription, if any.
    pub fn open_subscription(&self) -> Option<SubscriptionId> {
        match self {
            Self::SubscribedLive { subscription } => Some(*subscription),
            _ => None,
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that drive the sync state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Connectivity sensor reported a reading.
    ConnectivityChanged(Connectivity),
    /// A subscription delivered a full snapshot.
    SnapshotReceived {
        /// The subscription that delivered it.
        subscription: SubscriptionId,
        /// The delivered snapshot.
        snapshot: Snapshot,
    },
    /// A subscription failed (at open time or later).
    SubscriptionFailed {
        /// The subscription that failed.
        subscription: SubscriptionId,
        /// Error message describing the failure.
        error: String,
    },
    /// The local cache finished loading.
    CacheLoaded {
        /// The cached snapshot (empty if there was none).
        snapshot: Snapshot,
    },
    /// The delay scheduled by [`Action::ScheduleRetry`] elapsed.
    RetryDue {
        /// The failed subscription the retry was scheduled for.
        subscription: SubscriptionId,
    },
    /// The owning session is going away.
    Teardown,
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open a remote subscription tagged with this id.
    Subscribe {
        /// Id to tag the subscription's deliveries with.
        subscription: SubscriptionId,
    },
    /// Close the open subscription.
    Unsubscribe {
        /// The subscription to close.
        subscription: SubscriptionId,
    },
    /// Read the cached snapshot and feed it back as [`Event::CacheLoaded`].
    LoadCache,
    /// Write the snapshot to the local cache (best-effort).
    PersistSnapshot {
        /// Snapshot to write.
        snapshot: Snapshot,
    },
    /// Replace the published snapshot.
    Publish {
        /// Snapshot to publish.
        snapshot: Snapshot,
    },
    /// Tell the user something.
    EmitNotice(SyncNotice),
    /// Feed back [`Event::RetryDue`] for this subscription after a delay.
    ScheduleRetry {
        /// The subscription that failed.
        subscription: SubscriptionId,
    },
}

/// User-facing, non-fatal notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// Connectivity dropped; the cached snapshot is shown.
    ConnectionLost,
    /// The remote subscription failed; the cached snapshot is shown.
    SubscriptionFailed {
        /// Error message describing the failure.
        error: String,
    },
}
