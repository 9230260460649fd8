//! Remote message stream abstraction for chat-sync.
//!
//! This module abstracts the hosted document store the chat lives in. The
//! engine never talks to a concrete SDK; it consumes a [`RemoteStream`].
//!
//! # Design
//!
//! - `subscribe()` opens a listener on an ordered collection and hands back
//!   a [`SubscriptionHandle`]. The sink receives the **full** collection on
//!   every change, already decoded into [`Message`]s.
//! - `write()` adds a message. It does not wait for the message to show up
//!   in a snapshot; the snapshot channel is the only source of truth for
//!   what is displayed.
//!
//! # Example
//!
//! ```ignore
//! let remote = MemoryRemote::new();
//! let mut handle = remote.subscribe("messages", sink).await?;
//! remote.write("messages", &message).await?;
//! handle.unsubscribe();
//! ```

mod memory;

pub use memory::MemoryRemote;

use async_trait::async_trait;
use chat_sync_types::Message;
use std::fmt;
use std::sync::Arc;

pub use crate::error::RemoteError;

/// Collection the chat messages live in.
pub const DEFAULT_COLLECTION: &str = "messages";

/// What a subscription delivers.
#[derive(Debug, Clone)]
pub enum RemoteEvent {
    /// The whole collection, newest first.
    Snapshot(Vec<Message>),
    /// The listener broke; no further snapshots will arrive on it.
    Failed(RemoteError),
}

/// Callback a subscription delivers into.
pub type SnapshotSink = Arc<dyn Fn(RemoteEvent) + Send + Sync>;

/// Ownership token for one open remote listener.
///
/// `unsubscribe()` is idempotent and synchronous: once it returns the handle
/// is inert, even if the transport finishes tearing down later. Dropping a
/// handle unsubscribes it, so a listener cannot outlive its owner.
pub struct SubscriptionHandle {
    id: u64,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    /// Wrap a transport-level listener id and the closure that removes it.
    pub fn new(id: u64, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Transport-level listener id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True until `unsubscribe()` has run.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Close the listener. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Ordered-collection subscription API of the hosted document store.
///
/// Implementations deliver snapshots ordered by `createdAt` descending and
/// need no query filtering beyond that.
#[async_trait]
pub trait RemoteStream: Send + Sync {
    /// Start listening to `collection`.
    ///
    /// The sink is called with the current collection right away and again
    /// after every change, until the returned handle is unsubscribed.
    async fn subscribe(
        &self,
        collection: &str,
        sink: SnapshotSink,
    ) -> Result<SubscriptionHandle, RemoteError>;

    /// Add a message to `collection`.
    async fn write(&self, collection: &str, message: &Message) -> Result<(), RemoteError>;
}
