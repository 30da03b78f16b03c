//! Jump-to-message resolution state machine
//!
//! This module follows the Elm Architecture pattern: state is mutated only
//! through the `update` function, with every transition an explicit
//! `Message` variant. The phases replace the ad hoc boolean flags
//! (`targetMessageProcessed`, `isInTargetMessagePosition`, ...) a chat view
//! controller tends to accrete.
//!
//! At most one session is active at a time. A new resolve request overrides
//! the current session immediately — there is no queue. After a successful
//! jump, a protection window suppresses auto-scroll and pagination-driven
//! viewport moves so the user actually sees the target; a long-tail fallback
//! force-clears protection even if every other path fails to.

use std::time::Duration;

use strum::Display;
use tokio::time::Instant;

use crate::domain::message::MessageId;

/// Resolution phases for the active target session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    /// No target session active
    Idle,
    /// Locating the target: in-window check, nearby fetch, direct fetch
    Resolving,
    /// Target located; scrolling the render adapter to its row
    Scrolling,
    /// Scroll verified; target highlighted, protection active
    Highlighting,
    /// Target could not be resolved; fell back to bottom-of-window
    Failed,
}

/// Messages that can be sent to update the resolver state
///
/// Following Elm conventions, messages are named in past tense
/// to indicate "what happened" rather than "what to do"
pub enum Message {
    /// A jump to `target` was requested; overrides any active session
    ResolveRequested { target: MessageId, at: Instant },
    /// The target was located in the window
    TargetLocated,
    /// The render adapter materialized the target row after scrolling
    ScrollVerified { at: Instant },
    /// The target could not be resolved (nearby and direct fetch both
    /// failed, or the row never materialized)
    ResolutionFailed,
    /// Protection was cleared by explicit user intent (sent a message,
    /// scrolled away deliberately)
    ProtectionCleared,
    /// A timer tick; ends the session once protection has lapsed
    Expired { at: Instant },
}

#[derive(Debug, Clone)]
struct TargetSession {
    target: MessageId,
    processed: bool,
    protection_expires_at: Option<Instant>,
    /// Unconditional end of protection, set when the session starts.
    force_clear_at: Instant,
}

/// Manages the jump-to-message session for one channel view
#[derive(Debug, Clone)]
pub struct TargetResolver {
    protection: Duration,
    protection_fallback: Duration,
    phase: Phase,
    session: Option<TargetSession>,
}

impl TargetResolver {
    pub fn new(protection: Duration, protection_fallback: Duration) -> Self {
        Self {
            protection,
            protection_fallback,
            phase: Phase::Idle,
            session: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The id being resolved, if a session is active
    pub fn active_target(&self) -> Option<&MessageId> {
        self.session.as_ref().map(|s| &s.target)
    }

    /// Whether the active session completed its scroll-and-highlight
    pub fn processed(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.processed)
    }

    /// Whether ordinary auto-scroll and pagination-driven viewport moves
    /// must be suppressed right now. True while a resolution is in progress
    /// and during the post-jump protection window, but never past the
    /// long-tail fallback.
    pub fn suppresses_auto_scroll(&self, now: Instant) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if now >= session.force_clear_at {
            return false;
        }
        match self.phase {
            Phase::Resolving | Phase::Scrolling => true,
            Phase::Highlighting => session
                .protection_expires_at
                .is_some_and(|expires| now < expires),
            Phase::Idle | Phase::Failed => false,
        }
    }

    /// Update the resolver state based on a message
    ///
    /// This is the only way to modify the resolver state, following Elm
    /// Architecture principles. Out-of-phase messages are dropped with a
    /// warning rather than panicking: a slow fetch can complete after its
    /// session was overridden.
    pub fn update(&mut self, message: Message) {
        match message {
            Message::ResolveRequested { target, at } => {
                if self.session.is_some() {
                    log::info!("Overriding active target session with {target}");
                }
                self.session = Some(TargetSession {
                    target,
                    processed: false,
                    protection_expires_at: None,
                    force_clear_at: at + self.protection_fallback,
                });
                self.phase = Phase::Resolving;
            }
            Message::TargetLocated => {
                if self.phase != Phase::Resolving {
                    log::warn!("TargetLocated in phase {}; dropped", self.phase);
                    return;
                }
                self.phase = Phase::Scrolling;
            }
            Message::ScrollVerified { at } => {
                if self.phase != Phase::Scrolling {
                    log::warn!("ScrollVerified in phase {}; dropped", self.phase);
                    return;
                }
                if let Some(session) = &mut self.session {
                    session.processed = true;
                    session.protection_expires_at = Some(at + self.protection);
                }
                self.phase = Phase::Highlighting;
            }
            Message::ResolutionFailed => {
                if !matches!(self.phase, Phase::Resolving | Phase::Scrolling) {
                    log::warn!("ResolutionFailed in phase {}; dropped", self.phase);
                    return;
                }
                self.phase = Phase::Failed;
            }
            Message::ProtectionCleared => {
                self.session = None;
                self.phase = Phase::Idle;
            }
            Message::Expired { at } => {
                let Some(session) = &self.session else {
                    return;
                };
                let lapsed = match self.phase {
                    Phase::Highlighting => session
                        .protection_expires_at
                        .is_some_and(|expires| at >= expires),
                    Phase::Failed => true,
                    _ => false,
                };
                if lapsed || at >= session.force_clear_at {
                    self.session = None;
                    self.phase = Phase::Idle;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_helpers::ulid;

    const PROTECTION: Duration = Duration::from_secs(5);
    const FALLBACK: Duration = Duration::from_secs(300);

    fn resolver() -> TargetResolver {
        TargetResolver::new(PROTECTION, FALLBACK)
    }

    #[test]
    fn test_resolver_default() {
        let resolver = resolver();
        assert_eq!(resolver.phase(), Phase::Idle);
        assert_eq!(resolver.active_target(), None);
        assert!(!resolver.processed());
        assert!(!resolver.suppresses_auto_scroll(Instant::now()));
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut resolver = resolver();
        let now = Instant::now();
        let target = ulid(1000, 1);

        resolver.update(Message::ResolveRequested {
            target: target.clone(),
            at: now,
        });
        assert_eq!(resolver.phase(), Phase::Resolving);
        assert_eq!(resolver.active_target(), Some(&target));
        assert!(resolver.suppresses_auto_scroll(now));

        resolver.update(Message::TargetLocated);
        assert_eq!(resolver.phase(), Phase::Scrolling);
        assert!(resolver.suppresses_auto_scroll(now));

        resolver.update(Message::ScrollVerified { at: now });
        assert_eq!(resolver.phase(), Phase::Highlighting);
        assert!(resolver.processed());
        assert!(resolver.suppresses_auto_scroll(now + Duration::from_secs(4)));
        assert!(!resolver.suppresses_auto_scroll(now + PROTECTION));
    }

    #[test]
    fn test_new_resolve_overrides_active_session() {
        let mut resolver = resolver();
        let now = Instant::now();
        let first = ulid(1000, 1);
        let second = ulid(2000, 1);

        resolver.update(Message::ResolveRequested {
            target: first,
            at: now,
        });
        resolver.update(Message::TargetLocated);

        resolver.update(Message::ResolveRequested {
            target: second.clone(),
            at: now,
        });
        assert_eq!(resolver.phase(), Phase::Resolving);
        assert_eq!(resolver.active_target(), Some(&second));
        assert!(!resolver.processed());
    }

    #[test]
    fn test_out_of_phase_messages_are_dropped() {
        let mut resolver = resolver();
        let now = Instant::now();

        resolver.update(Message::TargetLocated);
        assert_eq!(resolver.phase(), Phase::Idle);

        resolver.update(Message::ScrollVerified { at: now });
        assert_eq!(resolver.phase(), Phase::Idle);
        assert!(!resolver.processed());
    }

    #[test]
    fn test_failed_resolution_does_not_protect() {
        let mut resolver = resolver();
        let now = Instant::now();

        resolver.update(Message::ResolveRequested {
            target: ulid(1000, 1),
            at: now,
        });
        resolver.update(Message::ResolutionFailed);
        assert_eq!(resolver.phase(), Phase::Failed);
        assert!(!resolver.suppresses_auto_scroll(now));

        // Timer tick returns a failed session to idle
        resolver.update(Message::Expired { at: now });
        assert_eq!(resolver.phase(), Phase::Idle);
        assert_eq!(resolver.active_target(), None);
    }

    #[test]
    fn test_protection_cleared_by_user_intent() {
        let mut resolver = resolver();
        let now = Instant::now();

        resolver.update(Message::ResolveRequested {
            target: ulid(1000, 1),
            at: now,
        });
        resolver.update(Message::TargetLocated);
        resolver.update(Message::ScrollVerified { at: now });

        resolver.update(Message::ProtectionCleared);
        assert_eq!(resolver.phase(), Phase::Idle);
        assert!(!resolver.suppresses_auto_scroll(now));
    }

    #[test]
    fn test_expired_tick_ends_highlighting_session() {
        let mut resolver = resolver();
        let now = Instant::now();

        resolver.update(Message::ResolveRequested {
            target: ulid(1000, 1),
            at: now,
        });
        resolver.update(Message::TargetLocated);
        resolver.update(Message::ScrollVerified { at: now });

        resolver.update(Message::Expired {
            at: now + Duration::from_secs(2),
        });
        assert_eq!(resolver.phase(), Phase::Highlighting);

        resolver.update(Message::Expired { at: now + PROTECTION });
        assert_eq!(resolver.phase(), Phase::Idle);
    }

    #[test]
    fn test_fallback_force_clears_stuck_session() {
        let mut resolver = resolver();
        let now = Instant::now();

        resolver.update(Message::ResolveRequested {
            target: ulid(1000, 1),
            at: now,
        });
        // A session stuck in Resolving stops suppressing once the fallback
        // lapses, and the next tick removes it entirely
        assert!(resolver.suppresses_auto_scroll(now + FALLBACK - Duration::from_secs(1)));
        assert!(!resolver.suppresses_auto_scroll(now + FALLBACK));

        resolver.update(Message::Expired { at: now + FALLBACK });
        assert_eq!(resolver.phase(), Phase::Idle);
        assert_eq!(resolver.active_target(), None);
    }
}
