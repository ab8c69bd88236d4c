//! End-to-end flows through the actor system and connection drivers.
//!
//! These tests drive the relay exactly the way the WebSocket layer does -
//! one `ConnectionDriver` per simulated connection - and assert the
//! observable contract: emitted events, roster state, registry/roster
//! consistency and meeting status transitions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use common::model::{
    MeetingDraft, MeetingSettings, MeetingStatus, ParticipantRole, ParticipantStatus,
};
use common::protocol::{ClientEvent, ServerEvent};
use meeting_relay::actors::{ActorMetrics, RelaySupervisorHandle};
use meeting_relay::connection::{ConnectionDriver, ConnectionPhase, EventFlow};
use meeting_relay::lifecycle::MeetingLifecycle;
use meeting_relay::registry::ConnectionHandle;
use meeting_relay::store::{MeetingStore, MemoryStore};
use tokio::sync::mpsc::Receiver;

struct Harness {
    lifecycle: MeetingLifecycle,
    supervisor: RelaySupervisorHandle,
}

/// One simulated client connection.
struct Client {
    driver: ConnectionDriver,
    rx: Receiver<ServerEvent>,
}

impl Harness {
    fn new() -> Self {
        let lifecycle = MeetingLifecycle::new(Arc::new(MemoryStore::new()));
        let supervisor = RelaySupervisorHandle::new(lifecycle.clone(), ActorMetrics::new(), 64);
        Self {
            lifecycle,
            supervisor,
        }
    }

    async fn create_meeting(&self, settings: MeetingSettings, password: Option<&str>) -> String {
        self.lifecycle
            .create_meeting(
                MeetingDraft {
                    title: "Weekly sync".to_string(),
                    description: None,
                    host_id: "host".to_string(),
                    scheduled_at: None,
                    settings: Some(settings),
                },
                password.map(str::to_string),
            )
            .await
            .unwrap()
            .meeting_id
    }

    fn connect(&self, user_id: &str) -> Client {
        let (outbound, rx) = ConnectionHandle::channel(format!("conn-{user_id}"));
        Client {
            driver: ConnectionDriver::new(self.supervisor.clone(), outbound),
            rx,
        }
    }

    async fn meeting(&self, meeting_id: &str) -> common::model::Meeting {
        self.lifecycle
            .store()
            .find_by_id(meeting_id)
            .await
            .unwrap()
            .unwrap()
    }

    /// Fence on the meeting actor: a request-reply round trip guarantees
    /// every previously queued command has been processed.
    async fn fence(&self, meeting_id: &str) {
        self.supervisor
            .meeting_handle(meeting_id.to_string())
            .await
            .unwrap()
            .snapshot()
            .await
            .unwrap();
    }

    /// Poll the store until the meeting reaches the expected status.
    async fn wait_for_status(&self, meeting_id: &str, status: MeetingStatus) {
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            loop {
                if self.meeting(meeting_id).await.status == status {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("meeting status never converged");
    }

    /// Registry entries must equal roster entries with status Joined.
    async fn assert_registry_matches_roster(&self, meeting_id: &str) {
        let meeting = self.meeting(meeting_id).await;
        let joined: HashSet<String> = meeting
            .participants
            .iter()
            .filter(|p| p.status == ParticipantStatus::Joined)
            .map(|p| p.user_id.clone())
            .collect();

        let live: HashSet<String> = match self
            .supervisor
            .meeting_handle(meeting_id.to_string())
            .await
        {
            Ok(handle) => match handle.snapshot().await {
                Ok(snapshot) => snapshot.live_participants.into_iter().collect(),
                Err(_) => HashSet::new(),
            },
            Err(_) => HashSet::new(),
        };

        assert_eq!(live, joined, "registry/roster divergence");
    }
}

impl Client {
    async fn join(&mut self, meeting_id: &str, user_id: &str, password: Option<&str>) {
        let flow = self
            .driver
            .handle_event(ClientEvent::JoinMeeting {
                meeting_id: meeting_id.to_string(),
                user_id: user_id.to_string(),
                name: user_id.to_string(),
                email: None,
                password: password.map(str::to_string),
            })
            .await;
        assert_eq!(flow, EventFlow::Continue);
    }

    async fn send(&mut self, event: ClientEvent) -> EventFlow {
        self.driver.handle_event(event).await
    }

    /// Drain queued outbound events through the driver, the way the
    /// transport loop does.
    async fn pump(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            let _ = self.driver.observe_outbound(&event).await;
            events.push(event);
        }
        events
    }

    fn phase(&self) -> ConnectionPhase {
        self.driver.phase()
    }
}

fn has_event(events: &[ServerEvent], pred: impl Fn(&ServerEvent) -> bool) -> bool {
    events.iter().any(pred)
}

#[tokio::test]
async fn capacity_is_enforced_against_joined_count() {
    let harness = Harness::new();
    let meeting_id = harness
        .create_meeting(
            MeetingSettings {
                max_participants: 2,
                ..MeetingSettings::default()
            },
            None,
        )
        .await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;
    assert_eq!(host.phase(), ConnectionPhase::Bound);
    assert_eq!(
        harness.meeting(&meeting_id).await.status,
        MeetingStatus::Active
    );

    let mut alice = harness.connect("alice");
    alice.join(&meeting_id, "alice", None).await;
    assert_eq!(alice.phase(), ConnectionPhase::Bound);

    // Third join is rejected with the capacity reason.
    let mut bob = harness.connect("bob");
    bob.join(&meeting_id, "bob", None).await;
    assert_eq!(bob.phase(), ConnectionPhase::Unbound);
    let events = bob.pump().await;
    assert!(has_event(&events, |e| matches!(
        e,
        ServerEvent::JoinError { message } if message == "Meeting is full"
    )));

    harness.assert_registry_matches_roster(&meeting_id).await;

    // Alice leaves; capacity frees up and bob can join.
    assert_eq!(alice.send(ClientEvent::LeaveMeeting).await, EventFlow::Close);
    bob.join(&meeting_id, "bob", None).await;
    assert_eq!(bob.phase(), ConnectionPhase::Bound);
    harness.assert_registry_matches_roster(&meeting_id).await;
}

#[tokio::test]
async fn password_gate_rejects_missing_and_wrong_credentials() {
    let harness = Harness::new();
    let meeting_id = harness
        .create_meeting(
            MeetingSettings {
                require_password: true,
                ..MeetingSettings::default()
            },
            Some("secret"),
        )
        .await;

    let mut user = harness.connect("alice");

    user.join(&meeting_id, "alice", None).await;
    let events = user.pump().await;
    assert!(has_event(&events, |e| matches!(
        e,
        ServerEvent::JoinError { message } if message == "Password required"
    )));
    assert_eq!(user.phase(), ConnectionPhase::Unbound);

    user.join(&meeting_id, "alice", Some("wrong")).await;
    let events = user.pump().await;
    assert!(has_event(&events, |e| matches!(
        e,
        ServerEvent::JoinError { message } if message == "Invalid password"
    )));
    assert_eq!(user.phase(), ConnectionPhase::Unbound);

    user.join(&meeting_id, "alice", Some("secret")).await;
    assert_eq!(user.phase(), ConnectionPhase::Bound);
    let events = user.pump().await;
    assert!(has_event(&events, |e| matches!(e, ServerEvent::JoinSuccess { .. })));
}

#[tokio::test]
async fn waiting_room_gates_until_host_admits() {
    let harness = Harness::new();
    let meeting_id = harness
        .create_meeting(
            MeetingSettings {
                waiting_room: true,
                ..MeetingSettings::default()
            },
            None,
        )
        .await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;

    let mut alice = harness.connect("alice");
    alice.join(&meeting_id, "alice", None).await;
    assert_eq!(alice.phase(), ConnectionPhase::Waiting);

    // Waiting: acknowledged, not live, not counted, no join broadcast.
    let alice_events = alice.pump().await;
    assert!(has_event(&alice_events, |e| matches!(
        e,
        ServerEvent::WaitingRoom { .. }
    )));
    let meeting = harness.meeting(&meeting_id).await;
    assert_eq!(meeting.joined_count(), 1);
    assert_eq!(
        meeting.participant("alice").unwrap().status,
        ParticipantStatus::Waiting
    );
    let host_events = host.pump().await;
    assert!(!has_event(&host_events, |e| matches!(
        e,
        ServerEvent::UserJoined { .. }
    )));
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::UserWaiting { user_id, .. } if user_id == "alice"
    )));
    harness.assert_registry_matches_roster(&meeting_id).await;

    // Host admits: registry entry appears, broadcast fires, alice is bound.
    host.send(ClientEvent::AdmitUser {
        user_id: "alice".to_string(),
    })
    .await;
    let alice_events = alice.pump().await;
    assert!(has_event(&alice_events, |e| matches!(
        e,
        ServerEvent::Admitted { .. }
    )));
    assert_eq!(alice.phase(), ConnectionPhase::Bound);

    let host_events = host.pump().await;
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::UserJoined { user_id, .. } if user_id == "alice"
    )));

    let meeting = harness.meeting(&meeting_id).await;
    assert_eq!(meeting.joined_count(), 2);
    harness.assert_registry_matches_roster(&meeting_id).await;
}

#[tokio::test]
async fn meeting_auto_ends_when_last_joined_participant_disconnects() {
    let harness = Harness::new();
    let meeting_id = harness.create_meeting(MeetingSettings::default(), None).await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;
    let mut alice = harness.connect("alice");
    alice.join(&meeting_id, "alice", None).await;

    // Transport disconnect for alice (no explicit leave event).
    alice.driver.cleanup().await;
    harness.fence(&meeting_id).await;

    let meeting = harness.meeting(&meeting_id).await;
    assert_eq!(
        meeting.participant("alice").unwrap().status,
        ParticipantStatus::Left
    );
    assert_eq!(meeting.status, MeetingStatus::Active, "host still present");
    let host_events = host.pump().await;
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::UserLeft { user_id } if user_id == "alice"
    )));
    harness.assert_registry_matches_roster(&meeting_id).await;

    // Host disconnects: Joined count reaches zero and the meeting ends.
    host.driver.cleanup().await;
    harness.wait_for_status(&meeting_id, MeetingStatus::Ended).await;
    let meeting = harness.meeting(&meeting_id).await;
    assert!(meeting.ended_at.is_some());
    harness.assert_registry_matches_roster(&meeting_id).await;
}

#[tokio::test]
async fn non_host_cannot_end_meeting() {
    let harness = Harness::new();
    let meeting_id = harness.create_meeting(MeetingSettings::default(), None).await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;
    let mut alice = harness.connect("alice");
    alice.join(&meeting_id, "alice", None).await;

    alice.send(ClientEvent::EndMeeting).await;
    let events = alice.pump().await;
    assert!(has_event(&events, |e| matches!(
        e,
        ServerEvent::Error { message } if message == "Only host can end meeting"
    )));
    assert_eq!(
        harness.meeting(&meeting_id).await.status,
        MeetingStatus::Active
    );

    // The host can.
    host.send(ClientEvent::EndMeeting).await;
    let events = host.pump().await;
    assert!(has_event(&events, |e| matches!(
        e,
        ServerEvent::MeetingEnded { .. }
    )));
    assert_eq!(host.phase(), ConnectionPhase::Closed);
    assert_eq!(
        harness.meeting(&meeting_id).await.status,
        MeetingStatus::Ended
    );
}

#[tokio::test]
async fn duplicate_join_is_rejected_without_duplicate_entry() {
    let harness = Harness::new();
    let meeting_id = harness.create_meeting(MeetingSettings::default(), None).await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;

    let mut second = harness.connect("host-again");
    second.join(&meeting_id, "host", None).await;
    assert_eq!(second.phase(), ConnectionPhase::Unbound);
    let events = second.pump().await;
    assert!(has_event(&events, |e| matches!(
        e,
        ServerEvent::JoinError { message } if message == "Already in meeting"
    )));

    let meeting = harness.meeting(&meeting_id).await;
    assert_eq!(meeting.participants.len(), 1);
    assert_eq!(
        meeting.participant("host").unwrap().role,
        ParticipantRole::Host
    );
    harness.assert_registry_matches_roster(&meeting_id).await;
}

#[tokio::test]
async fn offers_and_candidates_relay_point_to_point() {
    let harness = Harness::new();
    let meeting_id = harness.create_meeting(MeetingSettings::default(), None).await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;
    let mut alice = harness.connect("alice");
    alice.join(&meeting_id, "alice", None).await;

    // Alice learns about the host from the existing-participants snapshot.
    let events = alice.pump().await;
    let peers = events.iter().find_map(|e| match e {
        ServerEvent::ExistingParticipants(list) => Some(list.clone()),
        _ => None,
    });
    assert_eq!(peers.unwrap()[0].user_id, "host");
    host.pump().await;

    alice
        .send(ClientEvent::Offer {
            to: "host".to_string(),
            payload: serde_json::json!({"type": "offer", "sdp": "v=0"}),
        })
        .await;
    alice
        .send(ClientEvent::IceCandidate {
            to: "host".to_string(),
            payload: serde_json::json!({"candidate": "candidate:1"}),
        })
        .await;
    // Relay to a peer that is gone: silent no-op, no error to the sender.
    alice
        .send(ClientEvent::Offer {
            to: "ghost".to_string(),
            payload: serde_json::json!({}),
        })
        .await;

    // Fence on the actor before asserting delivery.
    harness
        .supervisor
        .meeting_handle(meeting_id.clone())
        .await
        .unwrap()
        .snapshot()
        .await
        .unwrap();

    let host_events = host.pump().await;
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::Offer { from, .. } if from == "alice"
    )));
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::IceCandidate { from, .. } if from == "alice"
    )));

    let alice_events = alice.pump().await;
    assert!(!has_event(&alice_events, |e| matches!(
        e,
        ServerEvent::Error { .. }
    )));
}

#[tokio::test]
async fn media_toggles_and_chat_follow_broadcast_rules() {
    let harness = Harness::new();
    let meeting_id = harness.create_meeting(MeetingSettings::default(), None).await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;
    let mut alice = harness.connect("alice");
    alice.join(&meeting_id, "alice", None).await;
    host.pump().await;
    alice.pump().await;

    alice.send(ClientEvent::ToggleMute { is_muted: true }).await;
    alice
        .send(ClientEvent::RaiseHand {
            is_hand_raised: true,
        })
        .await;
    alice
        .send(ClientEvent::Chat {
            message: "hello".to_string(),
            is_private: false,
            recipient_id: None,
        })
        .await;

    harness
        .supervisor
        .meeting_handle(meeting_id.clone())
        .await
        .unwrap()
        .snapshot()
        .await
        .unwrap();

    let host_events = host.pump().await;
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::ParticipantMuted { user_id, is_muted: true } if user_id == "alice"
    )));
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::HandRaised { user_id, is_hand_raised: true, .. } if user_id == "alice"
    )));
    assert!(has_event(&host_events, |e| matches!(
        e,
        ServerEvent::Chat(m) if m.message == "hello"
    )));

    // The sender sees the chat (broadcast includes self) but not their own
    // toggle broadcasts.
    let alice_events = alice.pump().await;
    assert!(has_event(&alice_events, |e| matches!(
        e,
        ServerEvent::Chat(m) if m.message == "hello"
    )));
    assert!(!has_event(&alice_events, |e| matches!(
        e,
        ServerEvent::ParticipantMuted { .. }
    )));

    // Media flags and the chat log made it to the durable document.
    let meeting = harness.meeting(&meeting_id).await;
    let alice_entry = meeting.participant("alice").unwrap();
    assert!(alice_entry.is_muted);
    assert!(alice_entry.is_hand_raised);
    assert_eq!(meeting.chat_messages.len(), 1);
}

#[tokio::test]
async fn ended_meeting_rejects_new_joins() {
    let harness = Harness::new();
    let meeting_id = harness.create_meeting(MeetingSettings::default(), None).await;

    let mut host = harness.connect("host");
    host.join(&meeting_id, "host", None).await;
    host.send(ClientEvent::EndMeeting).await;
    host.pump().await;

    let mut late = harness.connect("late");
    late.join(&meeting_id, "late", None).await;
    assert_eq!(late.phase(), ConnectionPhase::Unbound);
    let events = late.pump().await;
    assert!(has_event(&events, |e| matches!(
        e,
        ServerEvent::JoinError { message } if message == "Meeting has ended"
    )));
}
