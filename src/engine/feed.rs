//! The feed engine: one channel session's orchestrator
//!
//! The engine owns the window, the pagination gates, the target resolver,
//! and the acknowledgment queue for a single channel view, and coordinates
//! them against three injected collaborators: a [`HistoryFetcher`] (the
//! backend), a [`MessageStore`] (the shared cache), and a [`RenderAdapter`]
//! (the UI surface).
//!
//! Every method takes `&mut self`, so a session has a single logical owner
//! and its operations are serialized; network calls are the only suspension
//! points, each bounded by a watchdog timeout and the session's cancellation
//! token. Observers subscribe to an ordered [`FeedEvent`] stream instead of
//! reaching into engine state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::FeedConfig;
use crate::domain::message::{ChannelId, MessageId, SortableMessageId};
use crate::domain::record::MessageRecord;
use crate::engine::event::{FeedEvent, WindowChangeReason};
use crate::error::FetchError;
use crate::infrastructure::history::{FetchAnchor, FetchPage, HistoryFetcher};
use crate::infrastructure::render::{RenderAdapter, ScrollPosition};
use crate::infrastructure::store::MessageStore;
use crate::model::pagination::{Message as PaginationMessage, Pagination};
use crate::model::retry::{AckThrottle, RetryPolicy, RetryQueue};
use crate::model::target::{Message as TargetMessage, Phase, TargetResolver};
use crate::model::window::{Message as WindowMessage, Window};
use crate::model::ScrollAnchor;

/// Orchestrates one channel session.
pub struct FeedEngine<F, S, R> {
    channel: ChannelId,
    config: FeedConfig,
    fetcher: Arc<F>,
    store: Arc<S>,
    render: R,
    window: Window,
    pagination: Pagination,
    resolver: TargetResolver,
    retries: RetryQueue,
    ack_throttle: AckThrottle,
    /// Latest seen-mark deferred by the throttle; newer marks replace it.
    pending_ack: Option<MessageId>,
    subscribers: Vec<UnboundedSender<FeedEvent>>,
    cancel: CancellationToken,
}

impl<F, S, R> FeedEngine<F, S, R>
where
    F: HistoryFetcher,
    S: MessageStore,
    R: RenderAdapter,
{
    pub fn new(
        channel: ChannelId,
        config: FeedConfig,
        fetcher: Arc<F>,
        store: Arc<S>,
        render: R,
    ) -> Self {
        let pagination = Pagination::new(config.min_fetch_interval());
        let resolver = TargetResolver::new(config.protection_duration(), config.protection_fallback());
        let retries = RetryQueue::new(
            RetryPolicy::new(config.retry_base_delay(), config.retry_max_delay()),
            config.max_ack_attempts,
        );
        let ack_throttle = AckThrottle::new(config.ack_throttle(), config.ack_throttle_max());
        Self {
            channel,
            config,
            fetcher,
            store,
            render,
            window: Window::new(),
            pagination,
            resolver,
            retries,
            ack_throttle,
            pending_ack: None,
            subscribers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to the session's event stream. Every subscriber sees the
    /// same events in the same order; dropped receivers are pruned lazily.
    pub fn subscribe(&mut self) -> UnboundedReceiver<FeedEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn resolver_phase(&self) -> Phase {
        self.resolver.phase()
    }

    /// Whether the active target session completed its scroll-and-highlight.
    pub fn target_processed(&self) -> bool {
        self.resolver.processed()
    }

    pub fn render(&self) -> &R {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut R {
        &mut self.render
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// When the next acknowledgment work becomes due, for host scheduling:
    /// the earliest of the queued retries and the throttle reopening for a
    /// parked seen-mark.
    pub fn next_retry_due(&self) -> Option<Instant> {
        let parked = self
            .pending_ack
            .as_ref()
            .map(|_| self.ack_throttle.ready_at().unwrap_or_else(Instant::now));
        match (parked, self.retries.next_due_at()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (parked, queued) => parked.or(queued),
        }
    }

    /// Load the first page of the channel: cached ids immediately, then the
    /// latest page from the history API. Scrolls to the bottom unless a
    /// target resolution is protecting the viewport.
    pub async fn load_initial(&mut self) {
        if self.window.is_empty() {
            if let Some(cached) = self.store.channel_ids(&self.channel) {
                let ids = cached.into_iter().map(SortableMessageId::from_id).collect();
                let inserted = self.window.merge(ids);
                if inserted > 0 {
                    self.render.reload(self.window.len());
                    self.emit_window_changed(WindowChangeReason::Initial);
                }
            }
        }

        if !self.pagination.can_fetch(Instant::now()) {
            return;
        }
        match self.fetch_page(FetchAnchor::Latest).await {
            Ok(page) => {
                let short = page.messages.len() < self.config.page_size;
                let ids = self.absorb_page(page);
                let inserted = self.window.merge(ids);
                if short {
                    // The whole channel history fits in one page
                    self.pagination.update(PaginationMessage::TopReached);
                }
                if inserted > 0 {
                    self.render.reload(self.window.len());
                    self.write_back();
                    self.emit_window_changed(WindowChangeReason::Initial);
                }
                if !self.resolver.suppresses_auto_scroll(Instant::now()) {
                    self.scroll_to_bottom(false);
                }
            }
            Err(err) => self.handle_fetch_error(&err),
        }
    }

    /// Load older messages when the user has scrolled to the top row.
    /// The usual entry point from a host's scroll handler.
    pub async fn maybe_load_older(&mut self) {
        if self.window.is_empty() || self.render.visible_rows().start > 0 {
            return;
        }
        self.load_older().await;
    }

    /// Fetch the page before the oldest id in the window and prepend it,
    /// keeping the user's reading position pinned via a scroll anchor.
    pub async fn load_older(&mut self) {
        let now = Instant::now();
        if !self
            .pagination
            .can_load_older(now, self.config.empty_page_cooldown())
        {
            return;
        }
        let Some(cursor) = self.window.first().map(|s| s.id.clone()) else {
            return;
        };

        match self.fetch_page(FetchAnchor::Before(cursor)).await {
            Ok(page) => {
                if page.messages.is_empty() {
                    self.pagination.update(PaginationMessage::TopReached);
                    self.pagination
                        .update(PaginationMessage::EmptyOlderPage { at: Instant::now() });
                    return;
                }
                let short = page.messages.len() < self.config.page_size;
                let ids = self.absorb_page(page);

                let anchor = ScrollAnchor::capture(&self.window, &self.render);
                let inserted = self.window.merge(ids);
                if short {
                    self.pagination.update(PaginationMessage::TopReached);
                }
                if inserted > 0 {
                    self.render.reload(self.window.len());
                    if let Some(anchor) = anchor {
                        anchor.restore(&self.window, &mut self.render);
                    }
                    self.write_back();
                    self.emit_window_changed(WindowChangeReason::Older);
                }
            }
            Err(err) => self.handle_fetch_error(&err),
        }
    }

    /// Fetch the page after the newest id in the window and append it.
    /// Used when returning to a channel whose live feed was interrupted.
    pub async fn load_newer(&mut self) {
        if !self.pagination.can_fetch(Instant::now()) {
            return;
        }
        let Some(cursor) = self.window.last().map(|s| s.id.clone()) else {
            return;
        };

        match self.fetch_page(FetchAnchor::After(cursor)).await {
            Ok(page) => {
                let ids = self.absorb_page(page);
                let inserted = self.window.merge(ids);
                if inserted > 0 {
                    self.render.reload(self.window.len());
                    self.write_back();
                    self.emit_window_changed(WindowChangeReason::Newer);
                }
            }
            Err(err) => self.handle_fetch_error(&err),
        }
    }

    /// Resolve a jump to `target`: in-window check first, then a nearby
    /// page, then a direct single-message fetch. On success the row is
    /// scrolled to the viewport center, verified, and highlighted; on
    /// failure the view falls back to the bottom of the window.
    pub async fn resolve_target(&mut self, target: MessageId) {
        self.resolver.update(TargetMessage::ResolveRequested {
            target: target.clone(),
            at: Instant::now(),
        });

        if self.window.position(&target).is_none() {
            match self.fetch_page(FetchAnchor::Nearby(target.clone())).await {
                Ok(page) => {
                    let ids = self.absorb_page(page);
                    let inserted = self.window.merge(ids);
                    if inserted > 0 {
                        self.render.reload(self.window.len());
                        self.write_back();
                        self.emit_window_changed(WindowChangeReason::Target);
                    }
                }
                Err(err) => self.handle_fetch_error(&err),
            }
            // A newer resolve request may have taken over while we fetched
            if self.resolver.active_target() != Some(&target) {
                return;
            }
        }

        if self.window.position(&target).is_none() {
            match self.fetch_single(&target).await {
                Ok(record) => {
                    let sortable = record.sortable_id();
                    self.store.put(record);
                    let inserted = self.window.merge(vec![sortable]);
                    if inserted > 0 {
                        self.render.reload(self.window.len());
                        self.write_back();
                        self.emit_window_changed(WindowChangeReason::Target);
                    }
                }
                Err(err) => {
                    log::warn!("Direct fetch of target {target} failed: {err}");
                }
            }
            if self.resolver.active_target() != Some(&target) {
                return;
            }
        }

        match self.window.position(&target) {
            Some(index) => {
                self.resolver.update(TargetMessage::TargetLocated);
                if self.scroll_and_verify(index).await {
                    self.resolver
                        .update(TargetMessage::ScrollVerified { at: Instant::now() });
                    self.emit(FeedEvent::TargetResolved {
                        id: target.clone(),
                        success: true,
                    });
                    self.emit(FeedEvent::HighlightRequested {
                        id: target,
                        duration: self.config.highlight_duration(),
                    });
                } else {
                    log::warn!("Target {target} row never materialized; giving up");
                    self.resolver.update(TargetMessage::ResolutionFailed);
                    self.scroll_to_bottom(false);
                    self.emit(FeedEvent::TargetResolved {
                        id: target,
                        success: false,
                    });
                }
            }
            None => {
                self.resolver.update(TargetMessage::ResolutionFailed);
                self.scroll_to_bottom(false);
                self.emit(FeedEvent::TargetResolved {
                    id: target,
                    success: false,
                });
            }
        }
    }

    /// Merge a pushed live message, auto-scrolling only when the user is
    /// already reading near the bottom and no target protection is active.
    pub fn apply_live_message(&mut self, record: MessageRecord) {
        if record.channel != self.channel {
            log::warn!(
                "Live message {} is for channel {}, not {}; dropped",
                record.id,
                record.channel,
                self.channel
            );
            return;
        }
        let sortable = record.sortable_id();
        self.store.put(record);
        let inserted = self.window.merge(vec![sortable]);
        if inserted == 0 {
            return;
        }
        self.render.reload(self.window.len());
        self.write_back();
        self.emit_window_changed(WindowChangeReason::Live);

        let should_scroll = !self.resolver.suppresses_auto_scroll(Instant::now())
            && self.window.len() >= self.config.min_autoscroll_len
            && self.is_near_bottom();
        if should_scroll {
            self.scroll_to_bottom(true);
        }
    }

    /// Remove a deleted message from the window.
    pub fn apply_message_removed(&mut self, id: MessageId) {
        if !self.window.contains(&id) {
            return;
        }
        self.window.update(WindowMessage::MessageRemoved { id });
        self.render.reload(self.window.len());
        self.write_back();
        self.emit_window_changed(WindowChangeReason::Removed);
    }

    /// Mark `id` as the latest seen message. Throttled: when an ack went
    /// out recently the mark is parked and the newest parked mark wins.
    pub async fn mark_seen(&mut self, id: MessageId) {
        let now = Instant::now();
        if !self.ack_throttle.ready(now) {
            self.pending_ack = Some(id);
            return;
        }
        self.send_ack(id, now).await;
    }

    /// Drain whatever acknowledgment work is due: the parked seen-mark
    /// first, then queued retries in due order. Stops early when the
    /// throttle gate closes again.
    pub async fn drain_retries(&mut self) {
        let now = Instant::now();
        if let Some(id) = self.pending_ack.take() {
            if self.ack_throttle.ready(now) {
                self.send_ack(id, now).await;
            } else {
                self.pending_ack = Some(id);
            }
        }

        loop {
            let now = Instant::now();
            let Some(task) = self.retries.pop_due(now) else {
                break;
            };
            if !self.ack_throttle.ready(now) {
                self.retries.restore(task);
                break;
            }
            self.ack_throttle.record(now);
            if let Err(err) = self.fetcher.ack(&task.channel, &task.message).await {
                log::warn!("Acknowledgment retry for {} failed: {err}", task.message);
                if let Some(retry_after) = err.retry_after() {
                    self.ack_throttle.widen(retry_after);
                }
                let _ = self
                    .retries
                    .requeue(task, Instant::now(), err.retry_after());
            }
        }
    }

    /// The user scrolled deliberately: release target protection so
    /// auto-scroll behaves normally again. Hosts must report only
    /// user-initiated gestures here, not programmatic scrolls.
    pub fn notify_user_scrolled(&mut self) {
        if self.resolver.phase() != Phase::Idle {
            self.resolver.update(TargetMessage::ProtectionCleared);
        }
    }

    /// The user sent a message: same explicit intent as scrolling away.
    pub fn notify_message_sent(&mut self) {
        if self.resolver.phase() != Phase::Idle {
            self.resolver.update(TargetMessage::ProtectionCleared);
        }
    }

    /// Periodic timer tick: expires lapsed target sessions.
    pub fn tick(&mut self) {
        self.resolver
            .update(TargetMessage::Expired { at: Instant::now() });
    }

    /// End the session: cancel in-flight work and clear the window. The
    /// shared id cache survives when `retain_cache` is set (another session
    /// may be preloading the same channel).
    pub fn close(&mut self, retain_cache: bool) {
        self.cancel.cancel();
        self.window.update(WindowMessage::Cleared);
        if !retain_cache {
            self.store.evict_channel(&self.channel);
        }
    }

    async fn fetch_page(&mut self, anchor: FetchAnchor) -> Result<FetchPage, FetchError> {
        self.pagination
            .update(PaginationMessage::FetchStarted { at: Instant::now() });
        let watchdog = self.config.fetch_watchdog();
        let fetch = self.fetcher.fetch(&self.channel, self.config.page_size, anchor);
        let result = tokio::select! {
            () = self.cancel.cancelled() => {
                Err(FetchError::Network("session closed".to_owned()))
            }
            outcome = time::timeout(watchdog, fetch) => outcome.unwrap_or_else(|_| {
                log::warn!(
                    "History fetch exceeded {}ms; resetting loading state",
                    watchdog.as_millis()
                );
                Err(FetchError::Network("history fetch timed out".to_owned()))
            }),
        };
        self.pagination.update(PaginationMessage::FetchFinished);
        result
    }

    async fn fetch_single(&mut self, id: &MessageId) -> Result<MessageRecord, FetchError> {
        let watchdog = self.config.fetch_watchdog();
        let fetch = self.fetcher.fetch_message(&self.channel, id);
        tokio::select! {
            () = self.cancel.cancelled() => {
                Err(FetchError::Network("session closed".to_owned()))
            }
            outcome = time::timeout(watchdog, fetch) => outcome.unwrap_or_else(|_| {
                Err(FetchError::Network("message fetch timed out".to_owned()))
            }),
        }
    }

    /// Store a page's records and return its sortable ids for merging.
    fn absorb_page(&mut self, page: FetchPage) -> Vec<SortableMessageId> {
        let mut ids = Vec::with_capacity(page.messages.len());
        for message in page.messages {
            if message.channel != self.channel {
                log::warn!(
                    "Fetched message {} belongs to channel {}; dropped",
                    message.id,
                    message.channel
                );
                continue;
            }
            ids.push(message.sortable_id());
            self.store.put(message);
        }
        for user in page.users {
            self.store.put_user(user);
        }
        for member in page.members {
            self.store.put_member(member);
        }
        ids
    }

    async fn scroll_and_verify(&mut self, index: usize) -> bool {
        self.render.scroll_to(index, ScrollPosition::Middle, false);
        if self.render.visible_rows().contains(&index) {
            return true;
        }
        let backoffs = self.config.scroll_verify_backoff_ms.clone();
        for millis in backoffs {
            time::sleep(Duration::from_millis(millis)).await;
            self.render.scroll_to(index, ScrollPosition::Middle, false);
            if self.render.visible_rows().contains(&index) {
                return true;
            }
        }
        false
    }

    async fn send_ack(&mut self, id: MessageId, now: Instant) {
        self.ack_throttle.record(now);
        match self.fetcher.ack(&self.channel, &id).await {
            Ok(()) => {}
            Err(FetchError::RateLimited { retry_after }) => {
                log::warn!(
                    "Acknowledgment for {id} rate limited; retrying in {}ms",
                    retry_after.as_millis()
                );
                self.ack_throttle.widen(retry_after);
                self.retries
                    .schedule(self.channel.clone(), id, now, Some(retry_after));
            }
            Err(err) => {
                log::warn!("Acknowledgment for {id} failed: {err}");
                self.retries.schedule(self.channel.clone(), id, now, None);
            }
        }
    }

    fn handle_fetch_error(&mut self, err: &FetchError) {
        match err {
            FetchError::RateLimited { retry_after } => {
                tracing::warn!(
                    retry_after_ms = retry_after.as_millis() as u64,
                    "history fetch rate limited"
                );
                self.pagination.update(PaginationMessage::RetryAfterObserved {
                    retry_after: *retry_after,
                });
            }
            other => {
                self.emit(FeedEvent::Notice {
                    text: format!("Could not load messages: {other}"),
                });
            }
        }
    }

    fn is_near_bottom(&self) -> bool {
        let count = self.render.row_count();
        if count == 0 {
            return true;
        }
        let Some(last_top) = self.render.row_offset(count - 1) else {
            return false;
        };
        let viewport_bottom = self.render.viewport_offset() + self.render.viewport_height();
        last_top <= viewport_bottom + self.config.near_bottom_slack * self.render.viewport_height()
    }

    fn scroll_to_bottom(&mut self, animated: bool) {
        let count = self.render.row_count();
        if count > 0 {
            self.render.scroll_to(count - 1, ScrollPosition::Bottom, animated);
        }
    }

    fn write_back(&mut self) {
        self.store
            .set_channel_ids(&self.channel, self.window.message_ids());
    }

    fn emit_window_changed(&mut self, reason: WindowChangeReason) {
        let ids = self.window.message_ids();
        self.emit(FeedEvent::WindowChanged { ids, reason });
    }

    fn emit(&mut self, event: FeedEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::infrastructure::store::InMemoryMessageStore;
    use crate::test_helpers::{record, ulid, MockHistoryFetcher, MockRenderAdapter};

    fn engine(
        fetcher: MockHistoryFetcher,
        config: FeedConfig,
    ) -> FeedEngine<MockHistoryFetcher, InMemoryMessageStore, MockRenderAdapter> {
        FeedEngine::new(
            ChannelId::new("ch1"),
            config,
            Arc::new(fetcher),
            Arc::new(InMemoryMessageStore::new()),
            MockRenderAdapter::new(0),
        )
    }

    fn small_config() -> FeedConfig {
        FeedConfig {
            page_size: 5,
            min_autoscroll_len: 2,
            ..FeedConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_message_outside_channel_is_dropped() {
        let mut engine = engine(MockHistoryFetcher::new(), small_config());
        let mut events = engine.subscribe();

        let mut rec = record(ulid(1000, 1), "ch1");
        rec.channel = ChannelId::new("other");
        engine.apply_live_message(rec);

        assert_eq!(engine.window().len(), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_live_message_emits_once() {
        let mut engine = engine(MockHistoryFetcher::new(), small_config());
        let mut events = engine.subscribe();

        let rec = record(ulid(1000, 1), "ch1");
        engine.apply_live_message(rec.clone());
        engine.apply_live_message(rec);

        assert_eq!(engine.window().len(), 1);
        assert!(matches!(
            events.try_recv(),
            Ok(FeedEvent::WindowChanged {
                reason: WindowChangeReason::Live,
                ..
            })
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_seen_respects_throttle() {
        let fetcher = MockHistoryFetcher::new();
        let mut engine = engine(fetcher, small_config());

        engine.mark_seen(ulid(1000, 1)).await;
        engine.mark_seen(ulid(2000, 1)).await;

        // Second mark parked behind the 5s throttle
        assert_eq!(engine.fetcher.ack_calls(), 1);

        time::advance(Duration::from_secs(5)).await;
        engine.drain_retries().await;
        assert_eq!(engine.fetcher.ack_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_clears_window_and_optionally_cache() {
        let fetcher = MockHistoryFetcher::new().with_latest_page(
            (0..3).map(|i| record(ulid(1000 + i * 10, 1), "ch1")).collect(),
        );
        let mut engine = engine(fetcher, small_config());
        engine.load_initial().await;
        assert_eq!(engine.window().len(), 3);

        engine.close(true);
        assert!(engine.window().is_empty());
        assert!(engine.store.channel_ids(&ChannelId::new("ch1")).is_some());

        engine.close(false);
        assert!(engine.store.channel_ids(&ChannelId::new("ch1")).is_none());
    }
}
