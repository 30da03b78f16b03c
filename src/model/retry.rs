//! Retry scheduling for acknowledgment calls
//!
//! Acknowledgments ("mark message seen") are best-effort: failures are
//! requeued with exponential backoff, rate-limit hints stretch the delay,
//! and a single throttle gate keeps the overall call rate down. Tasks are
//! consumed in nondecreasing `next_retry_at` order and dropped after a
//! bounded number of attempts so a dead ack can't keep a session busy
//! forever.

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::message::{ChannelId, MessageId};

/// Exponential backoff with a cap, honoring server Retry-After hints.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Delay before the given attempt: `min(base * 2^attempt, max)`, never
    /// below the Retry-After hint (still capped).
    pub fn delay_for_attempt(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let shift = attempt.min(20);
        let calculated = self.base_delay.saturating_mul(1 << shift);
        calculated
            .max(hint.unwrap_or(Duration::ZERO))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// A queued acknowledgment retry.
#[derive(Debug, Clone)]
pub struct RetryTask {
    pub channel: ChannelId,
    pub message: MessageId,
    pub retry_count: u32,
    pub next_retry_at: Instant,
}

/// Pending retries, drained in `next_retry_at` order.
#[derive(Debug, Clone)]
pub struct RetryQueue {
    tasks: Vec<RetryTask>,
    policy: RetryPolicy,
    max_attempts: u32,
}

impl RetryQueue {
    pub fn new(policy: RetryPolicy, max_attempts: u32) -> Self {
        Self {
            tasks: Vec::new(),
            policy,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queue a first retry for a failed acknowledgment. A task already
    /// pending for the same message absorbs the failure instead of
    /// duplicating.
    pub fn schedule(
        &mut self,
        channel: ChannelId,
        message: MessageId,
        now: Instant,
        hint: Option<Duration>,
    ) {
        if let Some(existing) = self
            .tasks
            .iter_mut()
            .find(|t| t.channel == channel && t.message == message)
        {
            existing.next_retry_at = now + self.policy.delay_for_attempt(existing.retry_count, hint);
            return;
        }
        let next_retry_at = now + self.policy.delay_for_attempt(0, hint);
        self.tasks.push(RetryTask {
            channel,
            message,
            retry_count: 0,
            next_retry_at,
        });
    }

    /// Requeue a task that failed again. Returns `false` when the task has
    /// exhausted its attempts and was dropped.
    pub fn requeue(&mut self, mut task: RetryTask, now: Instant, hint: Option<Duration>) -> bool {
        task.retry_count += 1;
        if task.retry_count >= self.max_attempts {
            log::warn!(
                "Dropping acknowledgment for {} after {} attempts",
                task.message,
                task.retry_count
            );
            return false;
        }
        task.next_retry_at = now + self.policy.delay_for_attempt(task.retry_count, hint);
        self.tasks.push(task);
        true
    }

    /// Put a task back untouched (e.g. the throttle gate wasn't ready).
    pub fn restore(&mut self, task: RetryTask) {
        self.tasks.push(task);
    }

    /// Remove and return the due task with the earliest `next_retry_at`.
    pub fn pop_due(&mut self, now: Instant) -> Option<RetryTask> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.next_retry_at <= now)
            .min_by_key(|(_, t)| t.next_retry_at)
            .map(|(i, _)| i)?;
        Some(self.tasks.swap_remove(index))
    }

    /// When the next task becomes due, for sleep scheduling.
    pub fn next_due_at(&self) -> Option<Instant> {
        self.tasks.iter().map(|t| t.next_retry_at).min()
    }
}

/// The single throttle gate for acknowledgment calls: at most one ack per
/// interval. The interval widens on rate limits (up to a cap) and stays
/// widened for the rest of the session.
#[derive(Debug, Clone)]
pub struct AckThrottle {
    interval: Duration,
    max_interval: Duration,
    last_ack: Option<Instant>,
}

impl AckThrottle {
    pub fn new(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval,
            max_interval,
            last_ack: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ready(&self, now: Instant) -> bool {
        match self.last_ack {
            Some(at) => now.duration_since(at) >= self.interval,
            None => true,
        }
    }

    /// When the gate next opens; `None` when no ack has gone out yet (the
    /// gate is already open).
    pub fn ready_at(&self) -> Option<Instant> {
        self.last_ack.map(|at| at + self.interval)
    }

    pub fn record(&mut self, now: Instant) {
        self.last_ack = Some(now);
    }

    /// Widen the interval to at least the server's Retry-After, capped.
    pub fn widen(&mut self, retry_after: Duration) {
        self.interval = self.interval.max(retry_after).min(self.max_interval);
    }
}
