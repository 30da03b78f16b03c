//! Deterministic fakes for tests and host integration work
//!
//! Everything here is plain data behind mutexes: the fetcher replays
//! scripted pages, the render adapter lays rows out on a uniform grid. No
//! timers, no randomness, so paused-clock tests are exactly reproducible.

use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::message::{ChannelId, MessageId, SortableMessageId, UserId};
use crate::domain::record::{MessageRecord, UserRecord};
use crate::error::FetchError;
use crate::infrastructure::history::{FetchAnchor, FetchPage, HistoryFetcher};
use crate::infrastructure::render::{RenderAdapter, ScrollPosition};
use crate::model::window::Window;

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Build a well-formed 26-character id whose time prefix encodes `millis`
/// and whose tail encodes `suffix`, so ids with equal timestamps still
/// differ and sort by suffix.
pub fn ulid(millis: u64, suffix: u8) -> MessageId {
    let mut chars = [b'0'; 26];
    let mut ts = millis;
    for slot in chars[..10].iter_mut().rev() {
        *slot = CROCKFORD[(ts & 0x1F) as usize];
        ts >>= 5;
    }
    let mut tail = u64::from(suffix);
    for slot in chars[10..].iter_mut().rev() {
        *slot = CROCKFORD[(tail & 0x1F) as usize];
        tail >>= 5;
    }
    MessageId::new(String::from_utf8_lossy(&chars).into_owned())
}

pub fn sortable(millis: u64, suffix: u8) -> SortableMessageId {
    SortableMessageId::from_id(ulid(millis, suffix))
}

pub fn record(id: MessageId, channel: &str) -> MessageRecord {
    MessageRecord {
        id: id.clone(),
        channel: ChannelId::new(channel),
        author: UserId::new("u1"),
        content: format!("message {id}"),
        replies: Vec::new(),
        attachments: Vec::new(),
        system: false,
    }
}

#[derive(Default)]
struct FetcherState {
    latest: Vec<MessageRecord>,
    older: VecDeque<Vec<MessageRecord>>,
    newer: VecDeque<Vec<MessageRecord>>,
    nearby: HashMap<MessageId, Vec<MessageRecord>>,
    messages: HashMap<MessageId, MessageRecord>,
    users: Vec<UserRecord>,
    fetch_errors: VecDeque<FetchError>,
    ack_results: VecDeque<Result<(), FetchError>>,
    fetch_delay: Option<Duration>,
    fetch_calls: usize,
    message_calls: usize,
    ack_calls: usize,
    acked: Vec<MessageId>,
}

/// Scripted [`HistoryFetcher`]: pages are queued per anchor kind and
/// replayed in order, errors and delays are injectable, and every call is
/// counted.
#[derive(Default)]
pub struct MockHistoryFetcher {
    state: Mutex<FetcherState>,
}

impl MockHistoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FetcherState> {
        self.state.lock().expect("BUG: mock fetcher mutex poisoned")
    }

    /// The page returned for every `Latest` fetch.
    pub fn with_latest_page(self, messages: Vec<MessageRecord>) -> Self {
        self.lock().latest = messages;
        self
    }

    /// Queue a page for the next `Before` fetch; later pushes serve later
    /// fetches. An exhausted queue serves empty pages.
    pub fn with_older_page(self, messages: Vec<MessageRecord>) -> Self {
        self.lock().older.push_back(messages);
        self
    }

    pub fn with_newer_page(self, messages: Vec<MessageRecord>) -> Self {
        self.lock().newer.push_back(messages);
        self
    }

    /// The page returned for `Nearby` fetches anchored on `id`.
    pub fn with_nearby_page(self, id: MessageId, messages: Vec<MessageRecord>) -> Self {
        self.lock().nearby.insert(id, messages);
        self
    }

    /// A record served by `fetch_message`.
    pub fn with_message(self, message: MessageRecord) -> Self {
        self.lock().messages.insert(message.id.clone(), message);
        self
    }

    pub fn with_users(self, users: Vec<UserRecord>) -> Self {
        self.lock().users = users;
        self
    }

    /// Queue an error for the next page fetch (consumed before any page).
    pub fn with_fetch_error(self, error: FetchError) -> Self {
        self.lock().fetch_errors.push_back(error);
        self
    }

    /// Queue a result for the next `ack` call; an exhausted queue acks Ok.
    pub fn with_ack_result(self, result: Result<(), FetchError>) -> Self {
        self.lock().ack_results.push_back(result);
        self
    }

    /// Delay every page fetch, for watchdog tests under a paused clock.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        self.lock().fetch_delay = Some(delay);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    pub fn message_calls(&self) -> usize {
        self.lock().message_calls
    }

    pub fn ack_calls(&self) -> usize {
        self.lock().ack_calls
    }

    pub fn acked(&self) -> Vec<MessageId> {
        self.lock().acked.clone()
    }
}

#[async_trait]
impl HistoryFetcher for MockHistoryFetcher {
    async fn fetch(
        &self,
        _channel: &ChannelId,
        limit: usize,
        anchor: FetchAnchor,
    ) -> Result<FetchPage, FetchError> {
        let delay = self.lock().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        state.fetch_calls += 1;
        if let Some(error) = state.fetch_errors.pop_front() {
            return Err(error);
        }
        let messages = match anchor {
            FetchAnchor::Latest => state.latest.clone(),
            FetchAnchor::Before(_) => state.older.pop_front().unwrap_or_default(),
            FetchAnchor::After(_) => state.newer.pop_front().unwrap_or_default(),
            FetchAnchor::Nearby(id) => state.nearby.get(&id).cloned().unwrap_or_default(),
        };
        Ok(FetchPage {
            messages: messages.into_iter().take(limit).collect(),
            users: state.users.clone(),
            members: Vec::new(),
        })
    }

    async fn fetch_message(
        &self,
        _channel: &ChannelId,
        id: &MessageId,
    ) -> Result<MessageRecord, FetchError> {
        let mut state = self.lock();
        state.message_calls += 1;
        state.messages.get(id).cloned().ok_or(FetchError::NotFound)
    }

    async fn ack(&self, _channel: &ChannelId, id: &MessageId) -> Result<(), FetchError> {
        let mut state = self.lock();
        state.ack_calls += 1;
        state.acked.push(id.clone());
        state.ack_results.pop_front().unwrap_or(Ok(()))
    }
}

/// Pixel height of every row in the mock layout.
pub const ROW_HEIGHT: f32 = 40.0;

/// Default viewport height: five rows.
pub const VIEWPORT_HEIGHT: f32 = 5.0 * ROW_HEIGHT;

/// A [`RenderAdapter`] over a uniform grid of `ROW_HEIGHT` rows. Scrolls
/// apply immediately unless `set_ignore_scroll` simulates a list that never
/// materializes the requested row.
#[derive(Debug)]
pub struct MockRenderAdapter {
    row_count: usize,
    viewport_offset: f32,
    viewport_height: f32,
    ignore_scroll: bool,
    scroll_calls: Vec<(usize, ScrollPosition, bool)>,
    reload_calls: usize,
}

impl MockRenderAdapter {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            viewport_offset: 0.0,
            viewport_height: VIEWPORT_HEIGHT,
            ignore_scroll: false,
            scroll_calls: Vec::new(),
            reload_calls: 0,
        }
    }

    pub fn set_row_count(&mut self, row_count: usize) {
        self.row_count = row_count;
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height;
    }

    /// Record `scroll_to` calls without moving the viewport.
    pub fn set_ignore_scroll(&mut self, ignore: bool) {
        self.ignore_scroll = ignore;
    }

    pub fn scroll_calls(&self) -> &[(usize, ScrollPosition, bool)] {
        &self.scroll_calls
    }

    pub fn reload_calls(&self) -> usize {
        self.reload_calls
    }

    /// A row's pixel offset relative to the viewport top, for anchor drift
    /// assertions.
    pub fn row_offset_of_viewport(&self, id: MessageId, window: &Window) -> f32 {
        let index = window.position(&id).expect("id in window");
        index as f32 * ROW_HEIGHT - self.viewport_offset
    }

    fn max_offset(&self) -> f32 {
        (self.row_count as f32 * ROW_HEIGHT - self.viewport_height).max(0.0)
    }
}

impl RenderAdapter for MockRenderAdapter {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn visible_rows(&self) -> Range<usize> {
        if self.row_count == 0 {
            return 0..0;
        }
        let start = (self.viewport_offset / ROW_HEIGHT).floor().max(0.0) as usize;
        let end = ((self.viewport_offset + self.viewport_height) / ROW_HEIGHT).ceil() as usize;
        start.min(self.row_count)..end.min(self.row_count)
    }

    fn row_offset(&self, index: usize) -> Option<f32> {
        (index < self.row_count).then(|| index as f32 * ROW_HEIGHT)
    }

    fn viewport_offset(&self) -> f32 {
        self.viewport_offset
    }

    fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    fn set_viewport_offset(&mut self, offset: f32) {
        self.viewport_offset = offset.clamp(0.0, self.max_offset());
    }

    fn scroll_to(&mut self, index: usize, position: ScrollPosition, animated: bool) {
        self.scroll_calls.push((index, position, animated));
        if self.ignore_scroll {
            return;
        }
        let row_top = index as f32 * ROW_HEIGHT;
        let target = match position {
            ScrollPosition::Top => row_top,
            ScrollPosition::Middle => row_top - (self.viewport_height - ROW_HEIGHT) / 2.0,
            ScrollPosition::Bottom => row_top + ROW_HEIGHT - self.viewport_height,
        };
        self.set_viewport_offset(target);
    }

    fn reload(&mut self, row_count: usize) {
        self.row_count = row_count;
        self.reload_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_ulid_tail_distinguishes_same_timestamp() {
        assert_ne!(ulid(1000, 1), ulid(1000, 2));
        assert_eq!(ulid(1000, 1).timestamp(), ulid(1000, 2).timestamp());
    }

    #[test]
    fn test_mock_render_visible_rows() {
        let mut render = MockRenderAdapter::new(20);
        render.set_viewport_offset(3.5 * ROW_HEIGHT);
        // Rows 3 (clipped) through 8 (clipped) intersect a 5-row viewport
        assert_eq!(render.visible_rows(), 3..9);
    }

    #[test]
    fn test_mock_render_clamps_offset() {
        let mut render = MockRenderAdapter::new(10);
        render.set_viewport_offset(-50.0);
        assert_eq!(render.viewport_offset(), 0.0);
        render.set_viewport_offset(10_000.0);
        assert_eq!(render.viewport_offset(), 10.0 * ROW_HEIGHT - VIEWPORT_HEIGHT);
    }

    #[test]
    fn test_mock_render_scroll_to_bottom() {
        let mut render = MockRenderAdapter::new(20);
        render.scroll_to(19, ScrollPosition::Bottom, false);
        assert!(render.visible_rows().contains(&19));
    }
}
