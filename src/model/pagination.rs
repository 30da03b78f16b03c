//! Pagination gates for the feed window
//!
//! This module follows the Elm Architecture pattern:
//! - State is mutated only through the `update` function
//! - All state transitions are explicitly defined as `Message` variants
//! - The module is self-contained: it decides *whether* a fetch may run, the
//!   engine decides *what* to fetch
//!
//! Three gates protect the history API:
//! - a loading flag coalesces concurrent calls while one is in flight
//! - an empty-response cooldown stops repeated futile older-page fetches
//! - a minimum inter-fetch interval that widens when the server sends
//!   Retry-After and never shrinks for the rest of the session

use std::time::Duration;

use tokio::time::Instant;

/// Messages that can be sent to update the pagination state
///
/// Following Elm conventions, messages are named in past tense
/// to indicate "what happened" rather than "what to do"
pub enum Message {
    /// A history fetch was started
    FetchStarted { at: Instant },
    /// The in-flight fetch finished (success, failure, or watchdog reset)
    FetchFinished,
    /// The server returned fewer messages than requested going backwards:
    /// there is no more history upstream
    TopReached,
    /// An older-page fetch came back empty; start the futile-call cooldown
    EmptyOlderPage { at: Instant },
    /// The server sent a Retry-After; widen the minimum inter-fetch interval
    RetryAfterObserved { retry_after: Duration },
}

/// Manages pagination gating state for one channel session
#[derive(Debug, Clone)]
pub struct Pagination {
    is_loading: bool,
    reached_top: bool,
    last_fetch_started: Option<Instant>,
    last_empty_older: Option<Instant>,
    min_fetch_interval: Duration,
}

impl Pagination {
    pub fn new(min_fetch_interval: Duration) -> Self {
        Self {
            is_loading: false,
            reached_top: false,
            last_fetch_started: None,
            last_empty_older: None,
            min_fetch_interval,
        }
    }

    /// Check if a fetch is currently in flight
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Check if the upstream end of history has been reached
    pub fn reached_top(&self) -> bool {
        self.reached_top
    }

    /// Current minimum inter-fetch interval (widened by rate limits)
    pub fn min_fetch_interval(&self) -> Duration {
        self.min_fetch_interval
    }

    /// Whether any fetch may start now: nothing in flight and the minimum
    /// inter-fetch interval has elapsed.
    pub fn can_fetch(&self, now: Instant) -> bool {
        if self.is_loading {
            return false;
        }
        match self.last_fetch_started {
            Some(at) => now.duration_since(at) >= self.min_fetch_interval,
            None => true,
        }
    }

    /// Whether an older-page fetch may start now. On top of `can_fetch`,
    /// this requires that history isn't exhausted and that the last empty
    /// older response is outside the cooldown window.
    pub fn can_load_older(&self, now: Instant, empty_cooldown: Duration) -> bool {
        if self.reached_top || !self.can_fetch(now) {
            return false;
        }
        match self.last_empty_older {
            Some(at) => now.duration_since(at) >= empty_cooldown,
            None => true,
        }
    }

    /// Update the pagination state based on a message
    ///
    /// This is the only way to modify the pagination state, following Elm
    /// Architecture principles.
    pub fn update(&mut self, message: Message) {
        match message {
            Message::FetchStarted { at } => {
                self.is_loading = true;
                self.last_fetch_started = Some(at);
            }
            Message::FetchFinished => {
                self.is_loading = false;
            }
            Message::TopReached => {
                self.reached_top = true;
            }
            Message::EmptyOlderPage { at } => {
                self.last_empty_older = Some(at);
            }
            Message::RetryAfterObserved { retry_after } => {
                // Widens only; the interval never shrinks back
                if retry_after > self.min_fetch_interval {
                    log::info!(
                        "Widening minimum fetch interval to {}ms",
                        retry_after.as_millis()
                    );
                    self.min_fetch_interval = retry_after;
                }
            }
        }
    }
}
