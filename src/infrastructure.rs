pub mod history;
pub mod render;
pub mod store;

pub use history::{FetchAnchor, FetchPage, HistoryFetcher};
pub use render::{RenderAdapter, ScrollPosition};
pub use store::{InMemoryMessageStore, MessageStore};
