//! MessagePublisher - the consumer-facing side of the engine.
//!
//! The rendering layer reads the current snapshot (or watches for new ones)
//! and sends messages through [`MessagePublisher`]. Sending never touches
//! the displayed snapshot: a sent message becomes visible only when the
//! remote delivers the next snapshot containing it.

use chat_sync_core::{SyncNotice, SyncState};
use chat_sync_types::{Author, Message, MessageId, OutgoingMessage, Snapshot};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::error::SendError;
use crate::remote::RemoteStream;
use crate::SyncConfig;

/// Capacity of the notice channel; slow readers miss the oldest notices.
const NOTICE_CAPACITY: usize = 16;

/// Sending half of the published state, owned by the controller.
pub(crate) struct PublishState {
    pub(crate) snapshot: watch::Sender<Snapshot>,
    pub(crate) state: watch::Sender<SyncState>,
    pub(crate) notices: broadcast::Sender<SyncNotice>,
}

/// Consumer-facing interface: the current messages and `send`.
pub struct MessagePublisher<R> {
    remote: Arc<R>,
    collection: String,
    author: Author,
    snapshot: watch::Receiver<Snapshot>,
    state: watch::Receiver<SyncState>,
    notices: broadcast::Sender<SyncNotice>,
}

/// Create the publisher and the controller's half of its channels.
pub(crate) fn channel<R>(config: &SyncConfig, remote: Arc<R>) -> (PublishState, MessagePublisher<R>) {
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::empty());
    let (state_tx, state_rx) = watch::channel(SyncState::new());
    let (notices_tx, _) = broadcast::channel(NOTICE_CAPACITY);

    let publisher = MessagePublisher {
        remote,
        collection: config.collection.clone(),
        author: config.user.clone(),
        snapshot: snapshot_rx,
        state: state_rx,
        notices: notices_tx.clone(),
    };
    let outputs = PublishState {
        snapshot: snapshot_tx,
        state: state_tx,
        notices: notices_tx,
    };
    (outputs, publisher)
}

impl<R: RemoteStream> MessagePublisher<R> {
    /// The published snapshot, newest first.
    pub fn current(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch the published snapshot for changes.
    pub fn updates(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Current engine state.
    pub fn status(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Subscribe to user-facing notices emitted from now on.
    pub fn notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    /// The author stamped on sent messages.
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Send a message.
    ///
    /// Stamps a fresh id, the current time and the session author, then
    /// writes to the remote. Returns the message as written. Fails fast with
    /// [`SendError::Unavailable`] unless live; nothing is queued.
    pub async fn send(&self, outgoing: OutgoingMessage) -> Result<Message, SendError> {
        self.ensure_live()?;

        let message =
            outgoing.into_message(MessageId::generate(), Utc::now(), self.author.clone())?;

        self.remote
            .write(&self.collection, &message)
            .await
            .map_err(|e| {
                warn!(id = %message.id(), error = %e, "message write failed");
                SendError::RemoteWrite(e)
            })?;

        debug!(id = %message.id(), collection = %self.collection, "message written");
        Ok(message)
    }

    fn ensure_live(&self) -> Result<(), SendError> {
        // Sender gone means the controller is gone
        if self.state.has_changed().is_err() {
            return Err(SendError::Closed);
        }
        match &*self.state.borrow() {
            SyncState::SubscribedLive { .. } => Ok(()),
            SyncState::Terminated => Err(SendError::Closed),
            SyncState::Unknown | SyncState::ServingCache { .. } => Err(SendError::Unavailable),
        }
    }
}

impl<R> Clone for MessagePublisher<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            collection: self.collection.clone(),
            author: self.author.clone(),
            snapshot: self.snapshot.clone(),
            state: self.state.clone(),
            notices: self.notices.clone(),
        }
    }
}

impl<R> fmt::Debug for MessagePublisher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePublisher")
            .field("collection", &self.collection)
            .field("author", &self.author)
            .field("messages", &self.snapshot.borrow().len())
            .finish()
    }
}
