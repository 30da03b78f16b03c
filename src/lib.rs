//! # chatfeed — a paginated, anchor-preserving message feed engine
//!
//! A UI-toolkit-independent controller for chat-style message lists
//! (channels, DMs). It owns the local window of message ids for one channel
//! session and handles the parts every chat client needs:
//!
//! - bidirectional pagination against a remote history API, with merge rules
//!   that stay correct when pages overlap or arrive out of order
//! - jump-to-message resolution for ids outside the current window, with a
//!   bounded protection period so ordinary pagination doesn't yank the
//!   viewport away from the target
//! - scroll-anchor preservation across prepends, so the row the user is
//!   reading stays at the same pixel offset
//! - acknowledgment throttling and retry with rate-limit backoff
//!
//! ## Architecture
//!
//! The crate is organized around Elm-style state components:
//!
//! - **Domain** ([`domain`]): value types — time-sortable message ids,
//!   message/user records
//! - **Model** ([`model`]): self-contained state components (window,
//!   pagination gates, target resolution, scroll anchor, retry queue), each
//!   mutated only through an explicit `Message` enum and `update` function
//! - **Infrastructure** ([`infrastructure`]): the collaborator seams — a
//!   [`HistoryFetcher`](infrastructure::history::HistoryFetcher), a
//!   [`MessageStore`](infrastructure::store::MessageStore), and a
//!   [`RenderAdapter`](infrastructure::render::RenderAdapter)
//! - **Engine** ([`engine`]): the [`FeedEngine`](engine::feed::FeedEngine)
//!   orchestrator that coordinates the models and emits
//!   [`FeedEvent`](engine::event::FeedEvent)s to subscribers
//!
//! All window mutations happen through the engine's `&mut self` methods, so
//! a channel session has a single logical owner; network fetches are the
//! only suspension points and are bounded by a watchdog timeout.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod infrastructure;
pub mod model;
pub mod test_helpers;
pub mod utils;

// Re-exports for convenience
pub use config::FeedConfig;
pub use domain::message::{ChannelId, MessageId, SortableMessageId, Timestamp, UserId};
pub use domain::record::{MemberRecord, MessageRecord, UserRecord};
pub use engine::event::{FeedEvent, WindowChangeReason};
pub use engine::feed::FeedEngine;
pub use error::FetchError;
pub use infrastructure::history::{FetchAnchor, FetchPage, HistoryFetcher};
pub use infrastructure::render::{RenderAdapter, ScrollPosition};
pub use infrastructure::store::{InMemoryMessageStore, MessageStore};

/// Result type used throughout the library
pub type Result<T> = color_eyre::eyre::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
