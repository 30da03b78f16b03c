pub mod event;
pub mod feed;

pub use event::{FeedEvent, WindowChangeReason};
pub use feed::FeedEngine;
