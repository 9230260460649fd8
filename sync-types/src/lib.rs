//! # sync-types
//!
//! Data model for the chat-sync message synchronization engine.
//!
//! This crate provides the foundational types used across all chat-sync crates:
//! - [`Message`], [`Author`], [`Attachment`], [`Location`] - Immutable chat messages
//! - [`OutgoingMessage`] - The partial message a user sends
//! - [`Snapshot`] - A full, newest-first ordered set of messages
//! - [`MessageId`], [`SubscriptionId`] - Identity and ordering types
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod message;
mod snapshot;

pub use error::TypesError;
pub use ids::{MessageId, SubscriptionId};
pub use message::{newest_first, Attachment, Author, Location, Message, OutgoingMessage};
pub use snapshot::Snapshot;
