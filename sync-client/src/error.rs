//! Error types for sync-client.
//!
//! Every error is caught at the component that produced it. Remote
//! subscription failures become a cache fallback plus a notice, storage
//! failures are logged and dropped, and only send failures reach the caller.

use chat_sync_types::TypesError;
use thiserror::Error;

/// Remote document store errors.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Opening or keeping a subscription failed.
    #[error("subscription failed: {0}")]
    Subscription(String),

    /// Writing a message failed.
    #[error("write failed: {0}")]
    Write(String),
}

/// Local cache errors. Logged, never shown to the user.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Disk I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[source] TypesError),

    /// Stored value could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[source] TypesError),

    /// Key is not usable by this store.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// Backend refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by `MessagePublisher::send`.
#[derive(Debug, Error)]
pub enum SendError {
    /// Not live (serving cache or connectivity unknown); nothing was queued.
    #[error("sending is unavailable while offline")]
    Unavailable,

    /// The session has been torn down.
    #[error("chat session closed")]
    Closed,

    /// The outgoing message is malformed.
    #[error(transparent)]
    InvalidMessage(#[from] TypesError),

    /// The remote write failed. Not retried.
    #[error("remote write error: {0}")]
    RemoteWrite(#[source] RemoteError),
}

/// Errors from the session task itself.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The controller task panicked or was cancelled.
    #[error("sync controller task failed: {0}")]
    TaskFailed(String),
}
