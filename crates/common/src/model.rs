//! Meeting domain model shared by the relay service and clients.
//!
//! A `Meeting` is the durable document owned by the meeting store. Roster
//! entries (`Participant`) are never deleted, only status-transitioned, so
//! the document preserves the full attendance history of the meeting.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a meeting.
///
/// Transitions are monotone and terminal at `Ended`/`Cancelled`:
/// `Scheduled -> Active -> Ended`, `Scheduled -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Scheduled,
    Active,
    Ended,
    Cancelled,
}

impl MeetingStatus {
    /// Whether the meeting has reached a terminal state.
    ///
    /// No roster or settings mutation is permitted once this returns true.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, MeetingStatus::Ended | MeetingStatus::Cancelled)
    }
}

/// Role of a participant within one meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticipantRole {
    Host,
    CoHost,
    Participant,
}

/// Status of a participant's current visit.
///
/// Monotone per visit: `Waiting -> Joined -> Left`, `Waiting -> Removed`,
/// or a direct `Joined -> Left`. A fresh join starts a new visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Waiting,
    Joined,
    Left,
    Removed,
}

/// Per-meeting settings, fixed at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSettings {
    pub allow_participant_video: bool,
    pub allow_participant_audio: bool,
    pub allow_chat: bool,
    pub allow_screen_share: bool,
    /// When enabled, non-host joiners are parked in the waiting room until
    /// the host admits them.
    pub waiting_room: bool,
    pub record_meeting: bool,
    /// Capacity limit, enforced against the count of currently *Joined*
    /// participants (never total roster size).
    pub max_participants: usize,
    pub require_password: bool,
    /// bcrypt hash of the join password; present iff `require_password`.
    /// Never serialized out to clients.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            allow_participant_video: true,
            allow_participant_audio: true,
            allow_chat: true,
            allow_screen_share: true,
            waiting_room: false,
            record_meeting: false,
            max_participants: 100,
            require_password: false,
            password_hash: None,
        }
    }
}

/// A user's membership record within one meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub joined_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
    pub is_muted: bool,
    pub is_video_off: bool,
    pub is_hand_raised: bool,
}

impl Participant {
    /// Create a fresh roster entry for a new visit.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
        role: ParticipantRole,
        status: ParticipantStatus,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email,
            role,
            status,
            joined_at: Utc::now(),
            left_at: None,
            is_muted: false,
            is_video_off: false,
            is_hand_raised: false,
        }
    }
}

/// Explicit merge-patch for a participant's mutable media flags.
///
/// Identity, role and status cannot be changed through this path; only the
/// fields listed here are mutable by the participant themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParticipantPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_video_off: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hand_raised: Option<bool>,
}

impl ParticipantPatch {
    /// True when the patch carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_muted.is_none() && self.is_video_off.is_none() && self.is_hand_raised.is_none()
    }

    /// Apply the patch to a roster entry.
    pub fn apply(&self, participant: &mut Participant) {
        if let Some(muted) = self.is_muted {
            participant.is_muted = muted;
        }
        if let Some(video_off) = self.is_video_off {
            participant.is_video_off = video_off;
        }
        if let Some(hand) = self.is_hand_raised {
            participant.is_hand_raised = hand;
        }
    }
}

/// One entry in a meeting's append-only chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
}

impl ChatMessage {
    /// Stamp a new chat message with a generated id and the current time.
    #[must_use]
    pub fn new(
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        message: impl Into<String>,
        is_private: bool,
        recipient_id: Option<String>,
    ) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4().simple()),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            message: message.into(),
            timestamp: Utc::now(),
            is_private,
            recipient_id,
        }
    }
}

/// Input for creating a meeting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub host_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub settings: Option<MeetingSettings>,
}

/// The durable meeting document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// Globally unique, human-friendly meeting code.
    pub meeting_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub host_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: MeetingStatus,
    pub participants: Vec<Participant>,
    pub settings: MeetingSettings,
    pub is_recording: bool,
    pub chat_messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Look up a roster entry by user id.
    #[must_use]
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Count of participants currently in `Joined` status.
    ///
    /// This is the number capacity checks run against; `Left`/`Removed`
    /// entries never count.
    #[must_use]
    pub fn joined_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::Joined)
            .count()
    }

    /// Whether the given user is the designated host.
    #[must_use]
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }
}

/// Number of segments in a generated meeting code.
const MEETING_CODE_SEGMENTS: usize = 3;
/// Length of each segment.
const MEETING_CODE_SEGMENT_LEN: usize = 4;

/// Generate a meeting code of the form `xxxx-xxxx-xxxx` (lowercase alpha).
#[must_use]
pub fn generate_meeting_code() -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(MEETING_CODE_SEGMENTS * (MEETING_CODE_SEGMENT_LEN + 1));
    for segment in 0..MEETING_CODE_SEGMENTS {
        if segment > 0 {
            code.push('-');
        }
        for _ in 0..MEETING_CODE_SEGMENT_LEN {
            let c = rng.gen_range(b'a'..=b'z');
            code.push(char::from(c));
        }
    }
    code
}
