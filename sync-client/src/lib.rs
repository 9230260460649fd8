//! # sync-client
//!
//! Message synchronization engine for chat-sync.
//!
//! Keeps a chat client's view of a remote message collection current: live
//! from the remote stream while connected, from the local cache while not.
//!
//! ## Features
//!
//! - **Single Subscription**: at most one remote listener is ever open
//! - **Offline Fallback**: the last live snapshot is cached and served offline
//! - **Server Snapshot Is Truth**: sent messages appear only when the remote
//!   delivers them
//! - **Pure State Machine**: uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use chat_sync_client::{FileStore, ManualConnectivity, SyncConfig, SyncController};
//!
//! let config = SyncConfig::new("u-42", "Ada");
//! let (controller, publisher) = SyncController::new(config, remote, FileStore::new("cache"));
//! let session = controller.spawn(&connectivity);
//!
//! // Render whatever is current, then follow updates
//! let mut updates = publisher.updates();
//! publisher.send(OutgoingMessage::text("hi")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod publisher;
pub mod remote;
pub mod session;

pub use cache::{FileStore, KeyValueStore, LocalCache, MemoryStore, DEFAULT_CACHE_KEY};
pub use config::{ConfigError, FileConfig, SyncConfig, DEFAULT_RETRY_DELAY};
pub use connectivity::{ConnectivityListener, ConnectivityMonitor, ManualConnectivity, ObserverHandle};
pub use controller::SyncController;
pub use error::{RemoteError, SendError, SessionError, StorageError};
pub use publisher::MessagePublisher;
pub use remote::{
    MemoryRemote, RemoteEvent, RemoteStream, SnapshotSink, SubscriptionHandle, DEFAULT_COLLECTION,
};
pub use session::SessionHandle;

pub use chat_sync_core::{Connectivity, SyncNotice, SyncState};
pub use chat_sync_types::{Attachment, Author, Location, Message, MessageId, OutgoingMessage, Snapshot};
