//! Error types for chat-sync data.

use thiserror::Error;

/// Errors that can occur when building or decoding messages.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Message violates a data model rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}
