//! Ordered message snapshots.

use serde::{Deserialize, Deserializer, Serialize};

use crate::message::newest_first;
use crate::{Message, MessageId, TypesError};

/// The full ordered set of messages known at one point in time.
///
/// Every `Snapshot` is sorted newest first (see [`newest_first`]); the
/// constructors sort, so no unsorted value can exist. Serializes as a JSON
/// array of messages, which is the local cache format.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(Vec<Message>);

impl Snapshot {
    /// Create a snapshot from messages in any order.
    pub fn new(mut messages: Vec<Message>) -> Self {
        messages.sort_by(newest_first);
        Self(messages)
    }

    /// The empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Messages, newest first.
    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate newest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }

    /// The newest message, if any.
    pub fn newest(&self) -> Option<&Message> {
        self.0.first()
    }

    /// Look up a message by id.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.0.iter().find(|m| m.id() == id)
    }

    /// Take the messages out.
    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }

    /// Encode as a JSON array.
    pub fn to_json(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(TypesError::Serialization)
    }

    /// Decode from a JSON array.
    pub fn from_json(json: &str) -> Result<Self, TypesError> {
        serde_json::from_str(json).map_err(TypesError::Deserialization)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Message>::deserialize(deserializer).map(Self::new)
    }
}

impl From<Vec<Message>> for Snapshot {
    fn from(messages: Vec<Message>) -> Self {
        Self::new(messages)
    }
}

impl FromIterator<Message> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Author;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn msg(id: &str, secs: i64) -> Message {
        Message::new(
            MessageId::new(id),
            format!("text {id}"),
            Utc.timestamp_opt(secs, 0).unwrap(),
            Author::new("u1", "Ada"),
            None,
        )
        .unwrap()
    }

    fn ids(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.iter().map(|m| m.id().as_str()).collect()
    }

    #[test]
    fn new_sorts_newest_first() {
        let snapshot = Snapshot::new(vec![msg("a", 1), msg("c", 3), msg("b", 2)]);
        assert_eq!(ids(&snapshot), vec!["c", "b", "a"]);
        assert_eq!(snapshot.newest().unwrap().id().as_str(), "c");
    }

    #[test]
    fn equal_timestamps_sort_by_id_descending() {
        let snapshot = Snapshot::new(vec![msg("a", 5), msg("c", 5), msg("b", 5)]);
        assert_eq!(ids(&snapshot), vec!["c", "b", "a"]);
    }

    #[test]
    fn json_array_roundtrip_keeps_order() {
        let snapshot = Snapshot::new(vec![msg("a", 1), msg("b", 2)]);
        let json = snapshot.to_json().unwrap();
        assert!(json.starts_with('['));

        let decoded = Snapshot::from_json(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn decoding_unsorted_array_sorts_it() {
        let json = r#"[
            {"_id":"old","text":"","createdAt":"2024-01-01T00:00:00Z","user":{"_id":"u","name":"n"}},
            {"_id":"new","text":"","createdAt":"2024-01-02T00:00:00Z","user":{"_id":"u","name":"n"}}
        ]"#;
        let snapshot = Snapshot::from_json(json).unwrap();
        assert_eq!(ids(&snapshot), vec!["new", "old"]);
    }

    #[test]
    fn garbage_json_is_an_error() {
        assert!(matches!(
            Snapshot::from_json("not json"),
            Err(TypesError::Deserialization(_))
        ));
    }

    #[test]
    fn get_finds_by_id() {
        let snapshot = Snapshot::new(vec![msg("a", 1), msg("b", 2)]);
        assert_eq!(snapshot.get(&MessageId::new("a")).unwrap().text(), "text a");
        assert!(snapshot.get(&MessageId::new("zz")).is_none());
    }

    proptest! {
        #[test]
        fn any_input_order_yields_non_increasing_timestamps(
            entries in proptest::collection::vec((0i64..50, "[a-e]{1,3}"), 0..40)
        ) {
            let messages: Vec<Message> = entries
                .iter()
                .map(|(secs, id)| msg(id, *secs))
                .collect();
            let snapshot = Snapshot::new(messages);

            for pair in snapshot.messages().windows(2) {
                let (first, second) = (&pair[0], &pair[1]);
                prop_assert!(first.created_at() >= second.created_at());
                if first.created_at() == second.created_at() {
                    prop_assert!(first.id() >= second.id());
                }
            }
        }

        #[test]
        fn sorting_is_independent_of_input_order(
            entries in proptest::collection::vec((0i64..20, "[a-z]{1,4}"), 0..20)
        ) {
            let messages: Vec<Message> = entries
                .iter()
                .map(|(secs, id)| msg(id, *secs))
                .collect();
            let mut reversed = messages.clone();
            reversed.reverse();

            let forward: Vec<_> = Snapshot::new(messages).into_messages();
            let backward: Vec<_> = Snapshot::new(reversed).into_messages();
            prop_assert_eq!(
                forward.iter().map(|m| (m.created_at(), m.id().clone())).collect::<Vec<_>>(),
                backward.iter().map(|m| (m.created_at(), m.id().clone())).collect::<Vec<_>>()
            );
        }
    }
}
