//! # sync-core
//!
//! Pure logic for chat-sync (no I/O, instant tests).
//!
//! This crate implements the state machine that decides whether a chat
//! client is live (subscribed to the remote message stream) or serving its
//! local cache, without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about subscription lifetimes
//!
//! The actual I/O (remote subscription, cache, publishing) is performed by
//! `sync-client`, which interprets the actions produced by the state machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connectivity;
pub mod state;

pub use connectivity::Connectivity;
pub use state::{Action, Event, SyncNotice, SyncState};
