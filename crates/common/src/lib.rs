//! Shared types for the meeting relay.
//!
//! This crate carries everything both the relay service and a client need to
//! agree on: the meeting domain model ([`model`]) and the signaling wire
//! protocol ([`protocol`]). It has no runtime of its own.

pub mod model;
pub mod protocol;

pub use model::{
    generate_meeting_code, ChatMessage, Meeting, MeetingDraft, MeetingSettings, MeetingStatus,
    Participant, ParticipantPatch, ParticipantRole, ParticipantStatus,
};
pub use protocol::{ClientEvent, PeerInfo, ServerEvent};
