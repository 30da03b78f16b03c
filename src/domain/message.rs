use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the Crockford base32 time prefix in a message id.
const TIME_PREFIX_LEN: usize = 10;

/// Milliseconds since the Unix epoch, as encoded in a message id.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Convert to a calendar datetime. `None` only for values beyond the
    /// chrono-representable range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(i64::try_from(self.0).ok()?)
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque, chronologically sortable message identifier (ULID-like).
///
/// The first 10 characters are a Crockford base32 encoding of the creation
/// time in milliseconds, so `timestamp(a) < timestamp(b)` whenever `a` was
/// created before `b`. The id is the sole ordering key for the feed; arrival
/// order is never trusted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the creation timestamp from the id's time prefix.
    ///
    /// Malformed ids decode to timestamp 0 and therefore sort before every
    /// well-formed id; they are never rejected, because ids are opaque to
    /// this crate and the backend owns their format.
    pub fn timestamp(&self) -> Timestamp {
        let bytes = self.0.as_bytes();
        if bytes.len() < TIME_PREFIX_LEN {
            return Timestamp::from_millis(0);
        }

        let mut millis: u64 = 0;
        for &byte in &bytes[..TIME_PREFIX_LEN] {
            let Some(value) = crockford_value(byte) else {
                return Timestamp::from_millis(0);
            };
            millis = (millis << 5) | value;
        }
        Timestamp::from_millis(millis)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Decode a single Crockford base32 digit (case-insensitive; I, L, O, U
/// are not part of the alphabet).
fn crockford_value(byte: u8) -> Option<u64> {
    let byte = byte.to_ascii_uppercase();
    let value = match byte {
        b'0'..=b'9' => byte - b'0',
        b'A'..=b'H' => byte - b'A' + 10,
        b'J'..=b'K' => byte - b'J' + 18,
        b'M'..=b'N' => byte - b'M' + 20,
        b'P'..=b'T' => byte - b'P' + 22,
        b'V'..=b'Z' => byte - b'V' + 27,
        _ => return None,
    };
    Some(u64::from(value))
}

/// A message id paired with its decoded creation timestamp.
///
/// This type is designed for use in sorted collections where messages need
/// to be ordered chronologically while keeping deduplication keyed on the
/// id. The actual message data is stored separately in the message store,
/// so the same id can appear in several windows without duplicating records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortableMessageId {
    pub id: MessageId,
    pub created_at: Timestamp,
}

impl SortableMessageId {
    pub fn new(id: MessageId, created_at: Timestamp) -> Self {
        Self { id, created_at }
    }

    /// Build from a bare id, decoding the timestamp from its time prefix.
    pub fn from_id(id: MessageId) -> Self {
        let created_at = id.timestamp();
        Self { id, created_at }
    }
}

impl PartialOrd for SortableMessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableMessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Sort by timestamp first (primary key), then by id (secondary key)
        match self.created_at.cmp(&other.created_at) {
            Ordering::Equal => self.id.cmp(&other.id),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_helpers::ulid;

    #[test]
    fn test_timestamp_roundtrip_through_id() {
        let id = ulid(1_700_000_000_000, 1);
        assert_eq!(id.timestamp(), Timestamp::from_millis(1_700_000_000_000));
    }

    #[test]
    fn test_timestamp_zero() {
        let id = ulid(0, 0);
        assert_eq!(id.timestamp(), Timestamp::from_millis(0));
    }

    #[test]
    fn test_timestamp_is_case_insensitive() {
        let id = ulid(123_456_789, 7);
        let lowered = MessageId::new(id.as_str().to_ascii_lowercase());
        assert_eq!(lowered.timestamp(), id.timestamp());
    }

    #[test]
    fn test_malformed_ids_decode_to_zero() {
        assert_eq!(
            MessageId::new("short").timestamp(),
            Timestamp::from_millis(0)
        );
        // 'U' is not in the Crockford alphabet
        assert_eq!(
            MessageId::new("UUUUUUUUUUUUUUUUUUUUUUUUUU").timestamp(),
            Timestamp::from_millis(0)
        );
    }

    #[test]
    fn test_id_ordering_tracks_creation_order() {
        let older = ulid(1000, 1);
        let newer = ulid(2000, 1);
        assert!(older < newer);
        assert!(older.timestamp() < newer.timestamp());
    }

    #[test]
    fn test_sortable_id_ordering_by_timestamp() {
        let older = SortableMessageId::from_id(ulid(1000, 2));
        let newer = SortableMessageId::from_id(ulid(2000, 1));
        assert!(older < newer);
    }

    #[test]
    fn test_sortable_id_tiebreak_by_id_when_same_timestamp() {
        let a = SortableMessageId::from_id(ulid(1000, 1));
        let b = SortableMessageId::from_id(ulid(1000, 2));
        assert_eq!(a.created_at, b.created_at);
        assert!(a < b);
    }

    #[test]
    fn test_datetime_conversion() {
        let ts = Timestamp::from_millis(1_700_000_000_000);
        let dt = ts.to_datetime().expect("in range");
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }
}
