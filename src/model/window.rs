//! The ordered id window for one channel session
//!
//! This module follows the Elm Architecture pattern:
//! - State is mutated only through the `update` function
//! - All state transitions are explicitly defined as `Message` variants
//! - The module is self-contained and doesn't know about fetching or scrolling
//!
//! The window holds message ids in ascending (timestamp, id) order with no
//! duplicates. Merging is a set union: inserting the same page twice yields
//! the same window as inserting it once, and two disjoint pages merge to the
//! same window regardless of arrival order.

use sorted_vec::{FindOrInsert, SortedSet};

use crate::domain::message::{MessageId, SortableMessageId, Timestamp};

/// Messages that can be sent to update the window state
///
/// Following Elm conventions, messages are named in past tense
/// to indicate "what happened" rather than "what to do"
pub enum Message {
    /// A page of ids was merged into the window (initial load, older page,
    /// newer page, nearby page, or a single live message)
    PageMerged { ids: Vec<SortableMessageId> },
    /// A message was removed (deletion event)
    MessageRemoved { id: MessageId },
    /// The window was cleared (channel eviction)
    Cleared,
}

/// The in-memory ordered set of message ids currently materialized for a
/// channel view, ascending by (timestamp, id).
#[derive(Debug, Clone, Default)]
pub struct Window {
    ids: SortedSet<SortableMessageId>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The ids in display order (oldest first).
    pub fn ids(&self) -> &[SortableMessageId] {
        &self.ids
    }

    pub fn get(&self, index: usize) -> Option<&SortableMessageId> {
        self.ids.get(index)
    }

    /// Oldest id in the window (pagination cursor for older fetches).
    pub fn first(&self) -> Option<&SortableMessageId> {
        self.ids.first()
    }

    /// Newest id in the window (pagination cursor for newer fetches).
    pub fn last(&self) -> Option<&SortableMessageId> {
        self.ids.last()
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.first().map(|s| s.created_at)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.position(id).is_some()
    }

    /// Row index of an id, by id alone. Linear scan: the window is sorted by
    /// (timestamp, id) and the caller usually doesn't know the timestamp.
    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.ids.iter().position(|s| &s.id == id)
    }

    /// The bare ids, for store write-back and change events.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.ids.iter().map(|s| s.id.clone()).collect()
    }

    /// Update the window state based on a message
    ///
    /// This is the only way to modify the window. Merges insert each id with
    /// `find_or_insert`, so duplicates are filtered and order is maintained
    /// without re-sorting the whole window.
    pub fn update(&mut self, message: Message) {
        match message {
            Message::PageMerged { ids } => {
                for id in ids {
                    let _ = self.ids.find_or_insert(id);
                }
            }
            Message::MessageRemoved { id } => {
                if !self.contains(&id) {
                    log::warn!("Cannot remove message {id}: not in window");
                    return;
                }
                let mut rebuilt = SortedSet::new();
                for sortable in self.ids.iter().filter(|s| s.id != id) {
                    let _ = rebuilt.find_or_insert(sortable.clone());
                }
                self.ids = rebuilt;
            }
            Message::Cleared => {
                self.ids.clear();
            }
        }
    }

    /// Merge a page and report how many ids were actually new. A zero means
    /// the window is unchanged and no reload or event is warranted.
    pub fn merge(&mut self, ids: Vec<SortableMessageId>) -> usize {
        let mut inserted = 0;
        for id in ids {
            if let FindOrInsert::Inserted(_) = self.ids.find_or_insert(id) {
                inserted += 1;
            }
        }
        inserted
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_helpers::{sortable, ulid};

    fn window_of(timestamps: &[u64]) -> Window {
        let mut window = Window::new();
        let ids = timestamps
            .iter()
            .map(|&ts| sortable(ts, 1))
            .collect::<Vec<_>>();
        window.update(Message::PageMerged { ids });
        window
    }

    #[test]
    fn test_window_default() {
        let window = Window::new();
        assert_eq!(window.len(), 0);
        assert!(window.is_empty());
        assert_eq!(window.first(), None);
        assert_eq!(window.last(), None);
        assert_eq!(window.oldest_timestamp(), None);
    }

    #[test]
    fn test_merge_sorts_ascending_regardless_of_input_order() {
        let window = window_of(&[3000, 1000, 2000]);
        let timestamps: Vec<u64> = window
            .ids()
            .iter()
            .map(|s| s.created_at.as_millis())
            .collect();
        assert_eq!(timestamps, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let page: Vec<_> = (0..10).map(|i| sortable(1000 + i * 10, 1)).collect();

        let mut once = Window::new();
        once.update(Message::PageMerged { ids: page.clone() });

        let mut twice = Window::new();
        twice.update(Message::PageMerged { ids: page.clone() });
        twice.update(Message::PageMerged { ids: page });

        assert_eq!(once.ids(), twice.ids());
    }

    #[test]
    fn test_merge_is_commutative_for_disjoint_pages() {
        let older: Vec<_> = (0..10).map(|i| sortable(1000 + i, 1)).collect();
        let newer: Vec<_> = (0..10).map(|i| sortable(5000 + i, 1)).collect();

        let mut forward = Window::new();
        forward.update(Message::PageMerged { ids: older.clone() });
        forward.update(Message::PageMerged { ids: newer.clone() });

        let mut backward = Window::new();
        backward.update(Message::PageMerged { ids: newer });
        backward.update(Message::PageMerged { ids: older });

        assert_eq!(forward.ids(), backward.ids());
    }

    #[test]
    fn test_merge_filters_duplicates() {
        let mut window = window_of(&[1000, 2000]);
        window.update(Message::PageMerged {
            ids: vec![sortable(1000, 1), sortable(3000, 1)],
        });
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_merge_reports_inserted_count() {
        let mut window = window_of(&[2000, 3000]);
        assert_eq!(window.merge(vec![sortable(1000, 1), sortable(1500, 1)]), 2);
        // A pure-duplicate page inserts nothing
        assert_eq!(window.merge(vec![sortable(1000, 1)]), 0);
    }

    #[test]
    fn test_position_and_contains() {
        let window = window_of(&[1000, 2000, 3000]);
        let id = ulid(2000, 1);
        assert_eq!(window.position(&id), Some(1));
        assert!(window.contains(&id));
        assert!(!window.contains(&ulid(9999, 1)));
    }

    #[test]
    fn test_message_removed() {
        let mut window = window_of(&[1000, 2000, 3000]);
        window.update(Message::MessageRemoved { id: ulid(2000, 1) });
        assert_eq!(window.len(), 2);
        assert!(!window.contains(&ulid(2000, 1)));
        // Removing an unknown id is a no-op
        window.update(Message::MessageRemoved { id: ulid(9999, 1) });
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_cleared() {
        let mut window = window_of(&[1000, 2000]);
        window.update(Message::Cleared);
        assert!(window.is_empty());
    }

    #[test]
    fn test_sort_invariant_after_interleaved_merges() {
        let mut window = Window::new();
        window.merge((0..20).map(|i| sortable(2000 + i, 1)).collect());
        window.merge((0..10).map(|i| sortable(1000 + i, 1)).collect());
        window.merge((0..5).map(|i| sortable(1500 + i, 1)).collect());

        for pair in window.ids().windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
        assert_eq!(window.len(), 35);
    }
}
