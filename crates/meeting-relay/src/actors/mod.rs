//! Actor model implementation for the Meeting Relay.
//!
//! ```text
//! RelaySupervisor (singleton per relay instance)
//! └── supervises N MeetingActors
//!     └── MeetingActor (one per live meeting)
//!         ├── owns the meeting's session registry + signaling router
//!         ├── owns the waiting-room map
//!         └── drives the MeetingLifecycle for durable state
//! ```
//!
//! # Key Design Decisions
//!
//! - **Per-meeting serialization**: all mutations to one meeting's roster,
//!   status and registry flow through its `MeetingActor` mailbox; unrelated
//!   meetings never contend
//! - **No store I/O in the supervisor turn**: meeting existence is checked
//!   by the meeting actor itself, so the supervisor cannot become a
//!   process-wide suspension point
//! - **CancellationToken propagation**: the supervisor owns the root token,
//!   meeting actors get child tokens for graceful shutdown
//! - **Message passing**: `tokio::sync::mpsc` mailboxes with
//!   `tokio::sync::oneshot` request-reply
//!
//! # Modules
//!
//! - [`supervisor`] - `RelaySupervisor` owning the meeting actor map
//! - [`meeting`] - `MeetingActor` per live meeting
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and relay counters

pub mod meeting;
pub mod messages;
pub mod metrics;
pub mod supervisor;

// Re-export primary types
pub use meeting::{MeetingActor, MeetingActorHandle};
pub use messages::{
    JoinReply, MediaToggle, MeetingCommand, MeetingSnapshot, SignalKind, SupervisorMessage,
    SupervisorStatus,
};
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use supervisor::RelaySupervisorHandle;
