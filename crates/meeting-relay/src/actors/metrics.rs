//! Actor metrics and mailbox monitoring.
//!
//! Mailbox depth thresholds:
//!
//! | Actor Type | Normal | Warning |
//! |------------|--------|---------|
//! | Supervisor | < 100  | 500     |
//! | Meeting    | < 100  | 500     |

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for meeting-level actors.
pub const MEETING_MAILBOX_NORMAL: usize = 100;
pub const MEETING_MAILBOX_WARNING: usize = 500;

/// Actor type for log labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `RelaySupervisor` (singleton).
    Supervisor,
    /// `MeetingActor` (one per live meeting).
    Meeting,
}

impl ActorType {
    /// Returns the actor type as a string for log labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Supervisor => "supervisor",
            ActorType::Meeting => "meeting",
        }
    }
}

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Mailbox monitor for tracking queue depth.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a new mailbox monitor for the given actor.
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;

        let mut current_peak = self.peak_depth.load(Ordering::Relaxed);
        while new_depth > current_peak {
            match self.peak_depth.compare_exchange_weak(
                current_peak,
                new_depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }

        match self.level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "relay.actor.mailbox",
                    actor_type = self.actor_type.as_str(),
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    "Mailbox depth critical"
                );
            }
            MailboxLevel::Warning if new_depth == MEETING_MAILBOX_NORMAL + 1 => {
                debug!(
                    target: "relay.actor.mailbox",
                    actor_type = self.actor_type.as_str(),
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message being removed from the mailbox (processed).
    pub fn record_dequeue(&self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current mailbox depth.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Get the peak mailbox depth.
    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    /// Get total messages processed.
    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > MEETING_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > MEETING_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Relay-wide counters shared across the actor system.
///
/// Updated by the actors, read by the supervisor status query and the
/// meetings API.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    messages_processed: AtomicU64,
    meetings_started: AtomicU64,
    meetings_ended: AtomicU64,
    connections_bound: AtomicU64,
    connections_unbound: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn meeting_started(&self) {
        self.meetings_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn meeting_ended(&self) {
        self.meetings_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_bound(&self) {
        self.connections_bound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_unbound(&self) {
        self.connections_unbound.fetch_add(1, Ordering::Relaxed);
    }

    /// Live connections = bound - unbound.
    #[must_use]
    pub fn live_connections(&self) -> u64 {
        self.connections_bound
            .load(Ordering::Relaxed)
            .saturating_sub(self.connections_unbound.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn meetings_started(&self) -> u64 {
        self.meetings_started.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn meetings_ended(&self) -> u64 {
        self.meetings_ended.load(Ordering::Relaxed)
    }
}
