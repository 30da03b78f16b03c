use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the history/acknowledgment collaborators.
///
/// The engine handles all of these locally: rate limits widen throttles,
/// transient errors are retried or surfaced as a non-blocking notice, and a
/// missing target message degrades to scroll-to-bottom. None of them is ever
/// fatal to the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server asked us to slow down (HTTP 429 with Retry-After).
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Transient network failure; no data changed.
    #[error("network error: {0}")]
    Network(String),

    /// The requested message does not exist.
    #[error("message not found")]
    NotFound,
}

impl FetchError {
    /// The Retry-After hint, when the server provided one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
