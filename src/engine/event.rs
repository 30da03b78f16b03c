//! Events emitted by the feed engine
//!
//! Delivery is an explicit per-subscriber channel, not a broadcast bus, so
//! ordering is deterministic and testable: every subscriber sees the same
//! events in the same order the engine produced them.

use std::time::Duration;

use strum::Display;

use crate::domain::message::MessageId;

/// Why the window changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum WindowChangeReason {
    /// First page loaded into an empty window
    Initial,
    /// An older page was merged (prepend)
    Older,
    /// A newer page was merged (append)
    Newer,
    /// A nearby/direct page was merged while resolving a jump target
    Target,
    /// A pushed live message was merged
    Live,
    /// A message was removed (deletion event)
    Removed,
}

/// Ordered notifications for feed observers.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The window's id list changed.
    WindowChanged {
        ids: Vec<MessageId>,
        reason: WindowChangeReason,
    },
    /// A jump-to-message request finished.
    TargetResolved { id: MessageId, success: bool },
    /// The UI should highlight a row for the given duration.
    HighlightRequested { id: MessageId, duration: Duration },
    /// A transient, non-blocking user-facing notice (pagination failed and
    /// will be retried, etc.).
    Notice { text: String },
}
