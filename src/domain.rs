pub mod message;
pub mod record;

pub use message::{ChannelId, MessageId, SortableMessageId, Timestamp, UserId};
pub use record::{MemberRecord, MessageRecord, UserRecord};
