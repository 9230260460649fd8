//! Chat message model.
//!
//! A [`Message`] is immutable once created. Its wire shape (used by the
//! local cache and by the remote collection) is:
//!
//! ```json
//! {
//!   "_id": "5d1c...",
//!   "text": "hi",
//!   "createdAt": "2026-10-19T08:00:00Z",
//!   "user": { "_id": "u1", "name": "Ada" },
//!   "image": "https://...",          // optional
//!   "audio": "https://...",          // optional
//!   "location": { "latitude": 1.0, "longitude": 2.0 }  // optional
//! }
//! ```
//!
//! At most one of `image`, `audio` and `location` may be present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{MessageId, TypesError};

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    /// User identifier produced by authentication.
    #[serde(rename = "_id")]
    pub id: String,
    /// Name shown next to the message.
    #[serde(rename = "name", default)]
    pub display_name: String,
}

impl Author {
    /// Create a new author.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A geographic position shared as a message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Location {
    /// Create a new location.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True if both coordinates are finite and within their ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// The single non-text payload a message may carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    /// URL of an uploaded image.
    Image(String),
    /// URL of an uploaded audio recording.
    Audio(String),
    /// A shared location.
    Location(Location),
}

/// An immutable chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MessageRecord", into = "MessageRecord")]
pub struct Message {
    id: MessageId,
    text: String,
    created_at: DateTime<Utc>,
    author: Author,
    attachment: Option<Attachment>,
}

impl Message {
    /// Create a message.
    ///
    /// Fails if the id is empty.
    pub fn new(
        id: MessageId,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
        author: Author,
        attachment: Option<Attachment>,
    ) -> Result<Self, TypesError> {
        if id.is_empty() {
            return Err(TypesError::InvalidMessage("empty message id".into()));
        }
        Ok(Self {
            id,
            text: text.into(),
            created_at,
            author,
            attachment,
        })
    }

    /// Message id.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Text body (may be empty when an attachment is present).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Author.
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Attachment, if any.
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Image URL, if this is an image message.
    pub fn image_url(&self) -> Option<&str> {
        match &self.attachment {
            Some(Attachment::Image(url)) => Some(url),
            _ => None,
        }
    }

    /// Audio URL, if this is an audio message.
    pub fn audio_url(&self) -> Option<&str> {
        match &self.attachment {
            Some(Attachment::Audio(url)) => Some(url),
            _ => None,
        }
    }

    /// Location, if this is a location message.
    pub fn location(&self) -> Option<Location> {
        match self.attachment {
            Some(Attachment::Location(location)) => Some(location),
            _ => None,
        }
    }
}

/// Display ordering: newest first, ties broken by id descending.
pub fn newest_first(a: &Message, b: &Message) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// The partial message handed to `send`.
///
/// Id, timestamp and author are stamped on by the publisher.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutgoingMessage {
    /// Text body.
    pub text: String,
    /// Optional attachment.
    pub attachment: Option<Attachment>,
}

impl OutgoingMessage {
    /// A plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    /// An image message.
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            attachment: Some(Attachment::Image(url.into())),
        }
    }

    /// An audio message.
    pub fn audio(url: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            attachment: Some(Attachment::Audio(url.into())),
        }
    }

    /// A location message.
    pub fn location(latitude: f64, longitude: f64) -> Self {
        Self {
            text: String::new(),
            attachment: Some(Attachment::Location(Location::new(latitude, longitude))),
        }
    }

    /// Check the message has something to send.
    pub fn validate(&self) -> Result<(), TypesError> {
        match &self.attachment {
            None if self.text.trim().is_empty() => {
                Err(TypesError::InvalidMessage("empty message".into()))
            }
            Some(Attachment::Image(url)) | Some(Attachment::Audio(url)) if url.is_empty() => {
                Err(TypesError::InvalidMessage("empty attachment url".into()))
            }
            Some(Attachment::Location(location)) if !location.is_valid() => Err(
                TypesError::InvalidMessage("location out of range".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Stamp identity fields on and produce a full message.
    pub fn into_message(
        self,
        id: MessageId,
        created_at: DateTime<Utc>,
        author: Author,
    ) -> Result<Message, TypesError> {
        self.validate()?;
        Message::new(id, self.text, created_at, author, self.attachment)
    }
}

/// Wire representation of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageRecord {
    #[serde(rename = "_id")]
    id: MessageId,
    #[serde(default)]
    text: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    user: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = TypesError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let attachment = match (record.image, record.audio, record.location) {
            (None, None, None) => None,
            (Some(url), None, None) => Some(Attachment::Image(url)),
            (None, Some(url), None) => Some(Attachment::Audio(url)),
            (None, None, Some(location)) => Some(Attachment::Location(location)),
            _ => {
                return Err(TypesError::InvalidMessage(format!(
                    "message {} carries more than one attachment",
                    record.id
                )))
            }
        };
        Message::new(
            record.id,
            record.text,
            record.created_at,
            record.user,
            attachment,
        )
    }
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        let (image, audio, location) = match message.attachment {
            None => (None, None, None),
            Some(Attachment::Image(url)) => (Some(url), None, None),
            Some(Attachment::Audio(url)) => (None, Some(url), None),
            Some(Attachment::Location(location)) => (None, None, Some(location)),
        };
        Self {
            id: message.id,
            text: message.text,
            created_at: message.created_at,
            user: message.author,
            image,
            audio,
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn author() -> Author {
        Author::new("u1", "Ada")
    }

    #[test]
    fn empty_id_is_rejected() {
        let result = Message::new(MessageId::new(""), "hi", at(0), author(), None);
        assert!(matches!(result, Err(TypesError::InvalidMessage(_))));
    }

    #[test]
    fn wire_format_uses_original_field_names() {
        let msg = Message::new(MessageId::new("a"), "hi", at(0), author(), None).unwrap();
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["_id"], "a");
        assert_eq!(json["text"], "hi");
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
        assert_eq!(json["user"]["_id"], "u1");
        assert_eq!(json["user"]["name"], "Ada");
        assert!(json.get("image").is_none());
        assert!(json.get("location").is_none());
    }

    #[test]
    fn decodes_javascript_date_strings() {
        let json = r#"{
            "_id": "m1",
            "text": "hello",
            "createdAt": "2024-03-01T10:15:30.250Z",
            "user": { "_id": "u2", "name": "Grace" }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.id().as_str(), "m1");
        assert_eq!(msg.created_at().timestamp_millis(), 1_709_288_130_250);
        assert_eq!(msg.author().display_name, "Grace");
        assert!(msg.attachment().is_none());
    }

    #[test]
    fn decodes_location_message() {
        let json = r#"{
            "_id": "m2",
            "createdAt": "2024-03-01T10:15:30Z",
            "user": { "_id": "u2", "name": "Grace" },
            "location": { "latitude": 52.52, "longitude": 13.40 }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();

        assert_eq!(msg.text(), "");
        assert_eq!(msg.location(), Some(Location::new(52.52, 13.40)));
    }

    #[test]
    fn rejects_two_attachments() {
        let json = r#"{
            "_id": "m3",
            "createdAt": "2024-03-01T10:15:30Z",
            "user": { "_id": "u2", "name": "Grace" },
            "image": "https://img",
            "audio": "https://snd"
        }"#;
        let result: Result<Message, _> = serde_json::from_str(json);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("more than one attachment"), "{err}");
    }

    #[test]
    fn image_message_keeps_url_on_encode() {
        let msg = OutgoingMessage::image("https://img/1.png")
            .into_message(MessageId::new("i"), at(5), author())
            .unwrap();
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["image"], "https://img/1.png");
        assert_eq!(msg.image_url(), Some("https://img/1.png"));
        assert_eq!(msg.audio_url(), None);
    }

    #[test]
    fn ordering_is_newest_first() {
        let old = Message::new(MessageId::new("z"), "", at(1), author(), None).unwrap();
        let new = Message::new(MessageId::new("a"), "", at(2), author(), None).unwrap();
        assert_eq!(newest_first(&new, &old), Ordering::Less);
        assert_eq!(newest_first(&old, &new), Ordering::Greater);
    }

    #[test]
    fn ordering_ties_break_on_id_descending() {
        let a = Message::new(MessageId::new("a"), "", at(1), author(), None).unwrap();
        let b = Message::new(MessageId::new("b"), "", at(1), author(), None).unwrap();
        assert_eq!(newest_first(&b, &a), Ordering::Less);
    }

    #[test]
    fn outgoing_empty_text_is_invalid() {
        assert!(OutgoingMessage::text("   ").validate().is_err());
        assert!(OutgoingMessage::text("hi").validate().is_ok());
    }

    #[test]
    fn outgoing_attachment_without_text_is_valid() {
        assert!(OutgoingMessage::audio("https://snd/1.m4a").validate().is_ok());
        assert!(OutgoingMessage::location(48.85, 2.35).validate().is_ok());
    }

    #[test]
    fn outgoing_location_out_of_range_is_invalid() {
        assert!(OutgoingMessage::location(91.0, 0.0).validate().is_err());
        assert!(OutgoingMessage::location(0.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn outgoing_empty_url_is_invalid() {
        assert!(OutgoingMessage::image("").validate().is_err());
    }
}
