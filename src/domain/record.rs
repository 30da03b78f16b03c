use serde::{Deserialize, Serialize};

use super::message::{ChannelId, MessageId, SortableMessageId, Timestamp, UserId};

/// A single chat message as returned by the history API or pushed by a live
/// event feed.
///
/// Records are stored in the message store keyed by id and never mutated in
/// place by this crate; edit/delete events are the store owner's concern.
/// The creation time is not a field — it is derived from the id, which is
/// the sole ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub channel: ChannelId,
    pub author: UserId,
    pub content: String,
    #[serde(default)]
    pub replies: Vec<MessageId>,
    #[serde(default)]
    pub attachments: Vec<String>,
    /// System events (joins, renames) render differently but paginate the
    /// same as ordinary messages.
    #[serde(default)]
    pub system: bool,
}

impl MessageRecord {
    pub fn created_at(&self) -> Timestamp {
        self.id.timestamp()
    }

    pub fn sortable_id(&self) -> SortableMessageId {
        SortableMessageId::new(self.id.clone(), self.created_at())
    }
}

/// A user referenced by fetched messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Per-server member data for a message author (nickname overrides, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub user: UserId,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_helpers::{record, ulid};

    #[test]
    fn test_created_at_derived_from_id() {
        let rec = record(ulid(5000, 1), "ch1");
        assert_eq!(rec.created_at(), Timestamp::from_millis(5000));
        assert_eq!(rec.sortable_id().created_at, Timestamp::from_millis(5000));
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let raw = r#"{
            "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "channel": "ch1",
            "author": "u1",
            "content": "hello"
        }"#;
        let rec: MessageRecord = json5::from_str(raw).expect("valid record");
        assert!(rec.replies.is_empty());
        assert!(rec.attachments.is_empty());
        assert!(!rec.system);
    }
}
