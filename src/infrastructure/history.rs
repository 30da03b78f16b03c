//! History API seam
//!
//! The engine never talks HTTP itself; hosts implement [`HistoryFetcher`]
//! against their backend. The wire format belongs entirely to the
//! implementation — the engine only cares about anchored pages of records.

use async_trait::async_trait;

use crate::domain::message::{ChannelId, MessageId};
use crate::domain::record::{MemberRecord, MessageRecord, UserRecord};
use crate::error::FetchError;

/// Where to anchor a history page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAnchor {
    /// No anchor: the latest page of the channel
    Latest,
    /// Messages strictly older than the given id
    Before(MessageId),
    /// Messages strictly newer than the given id
    After(MessageId),
    /// A page centered on the given id (jump-to-message context)
    Nearby(MessageId),
}

/// One page of history: messages plus the users/members they reference.
#[derive(Debug, Clone, Default)]
pub struct FetchPage {
    pub messages: Vec<MessageRecord>,
    pub users: Vec<UserRecord>,
    pub members: Vec<MemberRecord>,
}

/// Asynchronous history and acknowledgment operations for one backend.
///
/// Every call is a suspension point and may be cancelled by the session;
/// implementations must not hold state the engine depends on. Rate limiting
/// is reported as [`FetchError::RateLimited`] with the server's Retry-After.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    /// Fetch up to `limit` messages around the given anchor.
    async fn fetch(
        &self,
        channel: &ChannelId,
        limit: usize,
        anchor: FetchAnchor,
    ) -> Result<FetchPage, FetchError>;

    /// Fetch a single message by id.
    async fn fetch_message(
        &self,
        channel: &ChannelId,
        id: &MessageId,
    ) -> Result<MessageRecord, FetchError>;

    /// Mark a message as the latest seen in the channel.
    async fn ack(&self, channel: &ChannelId, id: &MessageId) -> Result<(), FetchError>;
}
