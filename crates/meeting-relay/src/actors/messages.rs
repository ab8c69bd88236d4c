//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Request-reply messages carry a
//! `tokio::sync::oneshot` response channel.

use common::model::ParticipantPatch;
use tokio::sync::oneshot;

use crate::actors::meeting::MeetingActorHandle;
use crate::errors::RelayError;
use crate::registry::ConnectionHandle;

/// Messages sent to the `RelaySupervisor`.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Resolve (or spawn) the actor owning the given meeting.
    GetOrSpawn {
        meeting_id: String,
        respond_to: oneshot::Sender<Result<MeetingActorHandle, RelayError>>,
    },

    /// A meeting actor has drained and stopped.
    MeetingFinished { meeting_id: String },

    /// Get current supervisor status (for health checks and the API).
    GetStatus {
        respond_to: oneshot::Sender<SupervisorStatus>,
    },
}

/// Messages sent to a `MeetingActor`.
#[derive(Debug)]
pub enum MeetingCommand {
    /// A connection requests to join this meeting.
    Join {
        user_id: String,
        name: String,
        email: Option<String>,
        password: Option<String>,
        /// The connection's outbound channel; bound into the registry on a
        /// `Joined` outcome, parked in the waiting room on a gated one.
        handle: ConnectionHandle,
        respond_to: oneshot::Sender<Result<JoinReply, RelayError>>,
    },

    /// Host admits a waiting participant.
    Admit {
        target_user_id: String,
        requesting_user_id: String,
        respond_to: oneshot::Sender<Result<(), RelayError>>,
    },

    /// A connection is gone: explicit leave and transport disconnect both
    /// converge here, exactly once per connection.
    ConnectionClosed {
        user_id: String,
        connection_id: String,
    },

    /// Host ends the meeting for everyone.
    EndMeeting {
        requesting_user_id: String,
        respond_to: oneshot::Sender<Result<(), RelayError>>,
    },

    /// A participant toggled a media flag.
    MediaUpdate {
        user_id: String,
        toggle: MediaToggle,
    },

    /// A participant sent a chat message.
    Chat {
        user_id: String,
        message: String,
        is_private: bool,
        recipient_id: Option<String>,
    },

    /// Point-to-point negotiation payload to relay.
    Signal {
        from_user_id: String,
        to_user_id: String,
        kind: SignalKind,
        payload: serde_json::Value,
    },

    /// Screen-share started/stopped notification.
    ScreenShare { user_id: String, active: bool },

    /// Get a live snapshot (for the API and tests).
    Snapshot {
        respond_to: oneshot::Sender<MeetingSnapshot>,
    },
}

/// Result of a join accepted by the meeting actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    /// Live and relay-eligible.
    Joined,
    /// Parked in the waiting room pending host admission.
    Waiting,
}

/// Media toggles a participant may apply to themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaToggle {
    Mute { is_muted: bool },
    Video { is_video_off: bool },
    Hand { is_hand_raised: bool },
}

impl MediaToggle {
    /// The merge-patch this toggle translates to.
    #[must_use]
    pub fn as_patch(&self) -> ParticipantPatch {
        match *self {
            MediaToggle::Mute { is_muted } => ParticipantPatch {
                is_muted: Some(is_muted),
                ..ParticipantPatch::default()
            },
            MediaToggle::Video { is_video_off } => ParticipantPatch {
                is_video_off: Some(is_video_off),
                ..ParticipantPatch::default()
            },
            MediaToggle::Hand { is_hand_raised } => ParticipantPatch {
                is_hand_raised: Some(is_hand_raised),
                ..ParticipantPatch::default()
            },
        }
    }
}

/// Kind of point-to-point negotiation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Live view of one meeting actor.
#[derive(Debug, Clone)]
pub struct MeetingSnapshot {
    pub meeting_id: String,
    /// User ids with a registry entry (status `Joined`).
    pub live_participants: Vec<String>,
    /// User ids parked in the waiting room.
    pub waiting_participants: Vec<String>,
    pub is_shutting_down: bool,
}

/// Status of the `RelaySupervisor`.
#[derive(Debug, Clone)]
pub struct SupervisorStatus {
    /// Meetings with a live actor.
    pub meeting_count: usize,
    /// Live connections across all meetings.
    pub connection_count: u64,
    /// Whether the supervisor is draining.
    pub is_draining: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_media_toggle_patches() {
        let patch = MediaToggle::Mute { is_muted: true }.as_patch();
        assert_eq!(patch.is_muted, Some(true));
        assert_eq!(patch.is_video_off, None);
        assert_eq!(patch.is_hand_raised, None);

        let patch = MediaToggle::Video { is_video_off: false }.as_patch();
        assert_eq!(patch.is_video_off, Some(false));

        let patch = MediaToggle::Hand { is_hand_raised: true }.as_patch();
        assert_eq!(patch.is_hand_raised, Some(true));
    }

    #[test]
    fn test_join_reply_equality() {
        assert_eq!(JoinReply::Joined, JoinReply::Joined);
        assert_ne!(JoinReply::Joined, JoinReply::Waiting);
    }

    #[test]
    fn test_signal_kind_equality() {
        assert_eq!(SignalKind::Offer, SignalKind::Offer);
        assert_ne!(SignalKind::Offer, SignalKind::IceCandidate);
    }
}
