//! CLI command implementations.

pub mod cache;
pub mod replay;

use chat_sync_client::{Attachment, Message};
use chat_sync_core::{SyncNotice, SyncState};

/// One-line rendering of a message.
pub fn format_message(message: &Message) -> String {
    let mut line = format!(
        "{} {}: {}",
        message.created_at().to_rfc3339(),
        message.author().display_name,
        message.text()
    );
    match message.attachment() {
        Some(Attachment::Image(url)) => line.push_str(&format!(" [image {url}]")),
        Some(Attachment::Audio(url)) => line.push_str(&format!(" [audio {url}]")),
        Some(Attachment::Location(location)) => line.push_str(&format!(
            " [location {},{}]",
            location.latitude, location.longitude
        )),
        None => {}
    }
    line
}

/// What the user would be told.
pub fn describe_notice(notice: &SyncNotice) -> String {
    match notice {
        SyncNotice::ConnectionLost => "connection lost, showing cached messages".to_string(),
        SyncNotice::SubscriptionFailed { error } => {
            format!("live updates failed ({error}), showing cached messages")
        }
    }
}

/// Short label for the engine state.
pub fn state_label(state: &SyncState) -> &'static str {
    match state {
        SyncState::Unknown => "unknown",
        SyncState::SubscribedLive { .. } => "live",
        SyncState::ServingCache { .. } => "cache",
        SyncState::Terminated => "closed",
    }
}
