//! Signaling wire protocol.
//!
//! Every inbound frame is a tagged `ClientEvent`; every outbound frame is a
//! tagged `ServerEvent`. Tagging happens through serde, so an unknown event
//! name or a malformed payload fails deserialization before it can reach the
//! lifecycle manager.
//!
//! Negotiation payloads (SDP offers/answers, ICE candidates) are carried as
//! opaque JSON: the relay routes them, it never interprets them.

use crate::model::{ChatMessage, Meeting, Participant};
use serde::{Deserialize, Serialize};

/// Events received from a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Request to join a meeting. The only event legal on an unbound
    /// connection.
    #[serde(rename_all = "camelCase")]
    JoinMeeting {
        meeting_id: String,
        user_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },

    /// WebRTC offer addressed to one peer.
    Offer { to: String, payload: serde_json::Value },

    /// WebRTC answer addressed to one peer.
    Answer { to: String, payload: serde_json::Value },

    /// ICE candidate addressed to one peer.
    IceCandidate { to: String, payload: serde_json::Value },

    /// Chat message; private when `is_private` and a recipient is named.
    #[serde(rename = "chat-message", rename_all = "camelCase")]
    Chat {
        message: String,
        #[serde(default)]
        is_private: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient_id: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    ToggleMute { is_muted: bool },

    #[serde(rename_all = "camelCase")]
    ToggleVideo { is_video_off: bool },

    #[serde(rename_all = "camelCase")]
    RaiseHand { is_hand_raised: bool },

    /// Host admits a waiting participant.
    #[serde(rename_all = "camelCase")]
    AdmitUser { user_id: String },

    StartScreenShare,

    StopScreenShare,

    /// Host ends the meeting for everyone.
    EndMeeting,

    LeaveMeeting,
}

/// Lightweight peer descriptor sent to a joiner so it can open peer
/// connections to everyone already present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub user_id: String,
    pub name: String,
}

/// Events emitted to a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Join accepted with `Joined` status.
    JoinSuccess {
        meeting: Box<Meeting>,
        participant: Participant,
    },

    /// Join rejected; the connection stays open.
    JoinError { message: String },

    /// Join acknowledged but parked in the waiting room.
    #[serde(rename_all = "camelCase")]
    WaitingRoom { meeting_id: String },

    /// A waiting participant has been admitted by the host.
    Admitted {
        meeting: Box<Meeting>,
        participant: Participant,
    },

    /// Everyone already registered in the meeting, sent to a fresh joiner.
    ExistingParticipants(Vec<PeerInfo>),

    /// Sent to the host when a participant lands in the waiting room.
    #[serde(rename_all = "camelCase")]
    UserWaiting { user_id: String, name: String },

    /// Broadcast to existing registrants when someone joins.
    #[serde(rename_all = "camelCase")]
    UserJoined {
        user_id: String,
        name: String,
        participant: Participant,
    },

    Offer { from: String, payload: serde_json::Value },

    Answer { from: String, payload: serde_json::Value },

    IceCandidate { from: String, payload: serde_json::Value },

    #[serde(rename = "chat-message")]
    Chat(ChatMessage),

    #[serde(rename_all = "camelCase")]
    ParticipantMuted { user_id: String, is_muted: bool },

    #[serde(rename_all = "camelCase")]
    ParticipantVideoToggled { user_id: String, is_video_off: bool },

    #[serde(rename_all = "camelCase")]
    HandRaised {
        user_id: String,
        name: String,
        is_hand_raised: bool,
    },

    #[serde(rename_all = "camelCase")]
    ScreenShareStarted { user_id: String },

    #[serde(rename_all = "camelCase")]
    ScreenShareStopped { user_id: String },

    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },

    /// The meeting reached a terminal state; the connection will close.
    MeetingEnded { message: String },

    /// Business or validation failure for the triggering event.
    Error { message: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_join_meeting_round_trip() {
        let json = r#"{
            "event": "join-meeting",
            "data": {
                "meetingId": "abcd-efgh-ijkl",
                "userId": "user-1",
                "name": "Alice",
                "password": "secret"
            }
        }"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::JoinMeeting {
                meeting_id,
                user_id,
                name,
                email,
                password,
            } => {
                assert_eq!(meeting_id, "abcd-efgh-ijkl");
                assert_eq!(user_id, "user-1");
                assert_eq!(name, "Alice");
                assert_eq!(email, None);
                assert_eq!(password.as_deref(), Some("secret"));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_event_tag_names() {
        let offer = ClientEvent::Offer {
            to: "user-2".to_string(),
            payload: serde_json::json!({"sdp": "v=0"}),
        };
        let value = serde_json::to_value(&offer).unwrap();
        assert_eq!(value["event"], "offer");
        assert_eq!(value["data"]["to"], "user-2");

        let ice = ClientEvent::IceCandidate {
            to: "user-2".to_string(),
            payload: serde_json::json!({"candidate": "c"}),
        };
        let value = serde_json::to_value(&ice).unwrap();
        assert_eq!(value["event"], "ice-candidate");

        let chat = ClientEvent::Chat {
            message: "hello".to_string(),
            is_private: false,
            recipient_id: None,
        };
        let value = serde_json::to_value(&chat).unwrap();
        assert_eq!(value["event"], "chat-message");
    }

    #[test]
    fn test_unit_events_parse_without_data() {
        let event: ClientEvent = serde_json::from_str(r#"{"event": "leave-meeting"}"#).unwrap();
        assert_eq!(event, ClientEvent::LeaveMeeting);

        let event: ClientEvent =
            serde_json::from_str(r#"{"event": "start-screen-share"}"#).unwrap();
        assert_eq!(event, ClientEvent::StartScreenShare);
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event": "shutdown-server"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_payload_rejected() {
        // Missing required userId
        let result: Result<ClientEvent, _> = serde_json::from_str(
            r#"{"event": "join-meeting", "data": {"meetingId": "m", "name": "A"}}"#,
        );
        assert!(result.is_err());

        // Wrong type for boolean flag
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event": "toggle-mute", "data": {"isMuted": "yes"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_event_names() {
        let event = ServerEvent::UserLeft {
            user_id: "user-9".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "user-left");
        assert_eq!(value["data"]["userId"], "user-9");

        let event = ServerEvent::ExistingParticipants(vec![PeerInfo {
            user_id: "user-1".to_string(),
            name: "Alice".to_string(),
        }]);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "existing-participants");
        assert_eq!(value["data"][0]["userId"], "user-1");
    }
}
