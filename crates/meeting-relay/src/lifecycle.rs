//! Meeting lifecycle manager.
//!
//! Enforces the meeting/participant state machine: join eligibility, role
//! assignment, waiting-room admission, capacity limits, password checks and
//! auto-ending. All durable state goes through the [`MeetingStore`]; the
//! caller (the meeting actor) is responsible for serializing operations per
//! meeting.
//!
//! Every check that depends on roster state is re-validated against a fresh
//! read immediately before the commit step, never only at entry: password
//! verification suspends, and the meeting may have independently reached a
//! terminal state or filled up in the meantime.

use std::sync::Arc;

use common::model::{
    ChatMessage, Meeting, MeetingDraft, MeetingStatus, Participant, ParticipantPatch,
    ParticipantRole, ParticipantStatus,
};
use tracing::info;

use crate::errors::RelayError;
use crate::store::MeetingStore;

/// bcrypt cost for join-password hashes.
const JOIN_PASSWORD_COST: u32 = 10;

/// Outcome of a successful join request.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// The participant is live and relay-eligible.
    Joined {
        meeting: Meeting,
        participant: Participant,
    },
    /// The participant is parked in the waiting room pending admission.
    Waiting {
        meeting: Meeting,
        participant: Participant,
    },
}

/// Outcome of a leave operation.
#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    /// Meeting does not exist.
    NotFound,
    /// Meeting already reached a terminal state; nothing to do.
    AlreadyClosed,
    /// The roster entry was marked `Left`.
    Left {
        meeting: Meeting,
        /// Whether this departure auto-ended the meeting (Joined count
        /// dropped from positive to zero).
        ended: bool,
    },
}

/// The meeting lifecycle manager.
#[derive(Clone)]
pub struct MeetingLifecycle {
    store: Arc<dyn MeetingStore>,
}

impl MeetingLifecycle {
    #[must_use]
    pub fn new(store: Arc<dyn MeetingStore>) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MeetingStore> {
        &self.store
    }

    /// Create a meeting in `Scheduled` state.
    ///
    /// When the settings require a password, the supplied plaintext is
    /// hashed with bcrypt before anything is persisted.
    pub async fn create_meeting(
        &self,
        mut draft: MeetingDraft,
        password: Option<String>,
    ) -> Result<Meeting, RelayError> {
        if draft.title.trim().is_empty() {
            return Err(RelayError::Validation("Title is required".to_string()));
        }
        if draft.host_id.trim().is_empty() {
            return Err(RelayError::Validation("Host id is required".to_string()));
        }

        let mut settings = draft.settings.take().unwrap_or_default();
        if settings.require_password {
            let Some(password) = password else {
                return Err(RelayError::Validation(
                    "Password required by meeting settings".to_string(),
                ));
            };
            let hash = tokio::task::spawn_blocking(move || {
                bcrypt::hash(password, JOIN_PASSWORD_COST)
            })
            .await
            .map_err(|e| RelayError::Internal(format!("hash task failed: {e}")))?
            .map_err(|e| RelayError::Internal(format!("password hash failed: {e}")))?;
            settings.password_hash = Some(hash);
        } else {
            settings.password_hash = None;
        }
        draft.settings = Some(settings);

        let meeting = self.store.create(draft).await?;
        info!(
            target: "relay.lifecycle",
            meeting_id = %meeting.meeting_id,
            host_id = %meeting.host_id,
            "Meeting created"
        );
        Ok(meeting)
    }

    /// Handle a join request.
    ///
    /// Checks, in order: meeting exists; meeting not in a terminal state;
    /// password (when required); capacity against the *Joined* count; no
    /// active entry for this user already. Terminal state and capacity are
    /// re-validated right before the commit.
    pub async fn request_join(
        &self,
        meeting_id: &str,
        user_id: &str,
        name: &str,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<JoinOutcome, RelayError> {
        let meeting = self.fetch(meeting_id).await?;
        check_not_terminal(&meeting)?;

        if meeting.settings.require_password {
            if let Some(stored_hash) = meeting.settings.password_hash.clone() {
                let Some(password) = password else {
                    return Err(RelayError::MissingCredential);
                };
                let valid = tokio::task::spawn_blocking(move || {
                    bcrypt::verify(password, &stored_hash)
                })
                .await
                .map_err(|e| RelayError::Internal(format!("verify task failed: {e}")))?
                .map_err(|e| RelayError::Internal(format!("password verify failed: {e}")))?;
                if !valid {
                    return Err(RelayError::InvalidCredential);
                }
            }
        }

        check_capacity(&meeting)?;
        check_not_already_joined(&meeting, user_id)?;

        let role = if meeting.is_host(user_id) {
            ParticipantRole::Host
        } else {
            ParticipantRole::Participant
        };
        let status = if meeting.settings.waiting_room && role != ParticipantRole::Host {
            ParticipantStatus::Waiting
        } else {
            ParticipantStatus::Joined
        };

        // Password verification suspended; re-validate against current state
        // before committing the roster change.
        let meeting = self.fetch(meeting_id).await?;
        check_not_terminal(&meeting)?;
        check_capacity(&meeting)?;
        check_not_already_joined(&meeting, user_id)?;

        let participant = Participant::new(user_id, name, email, role, status);
        let updated = self
            .store
            .upsert_participant(meeting_id, participant.clone())
            .await?
            .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))?;

        // The host's first successful join activates a scheduled meeting.
        let updated = if role == ParticipantRole::Host
            && status == ParticipantStatus::Joined
            && updated.status == MeetingStatus::Scheduled
        {
            info!(
                target: "relay.lifecycle",
                meeting_id = %meeting_id,
                "Host joined, meeting is now active"
            );
            self.store
                .update_status(meeting_id, MeetingStatus::Active)
                .await?
                .unwrap_or(updated)
        } else {
            updated
        };

        let outcome = match status {
            ParticipantStatus::Joined => JoinOutcome::Joined {
                meeting: updated,
                participant,
            },
            _ => JoinOutcome::Waiting {
                meeting: updated,
                participant,
            },
        };
        Ok(outcome)
    }

    /// Admit a waiting participant. Host-only; capacity is re-checked at
    /// admission time since it may have been exhausted since the original
    /// join request.
    pub async fn admit(
        &self,
        meeting_id: &str,
        target_user_id: &str,
        requesting_user_id: &str,
    ) -> Result<(Meeting, Participant), RelayError> {
        let meeting = self.fetch(meeting_id).await?;

        if !meeting.is_host(requesting_user_id) {
            return Err(RelayError::Forbidden(
                "Only host can admit participants".to_string(),
            ));
        }
        check_not_terminal(&meeting)?;

        match meeting.participant(target_user_id).map(|p| p.status) {
            None => {
                return Err(RelayError::NotFound("Participant not found".to_string()));
            }
            Some(ParticipantStatus::Waiting) => {}
            Some(ParticipantStatus::Joined) => {
                return Err(RelayError::AlreadyJoined("Already in meeting".to_string()));
            }
            Some(_) => {
                return Err(RelayError::InvalidState(
                    "Participant is not in the waiting room".to_string(),
                ));
            }
        }
        check_capacity(&meeting)?;

        let updated = self
            .store
            .update_participant_status(meeting_id, target_user_id, ParticipantStatus::Joined)
            .await?
            .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))?;

        let participant = updated
            .participant(target_user_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound("Participant not found".to_string()))?;

        info!(
            target: "relay.lifecycle",
            meeting_id = %meeting_id,
            user_id = %target_user_id,
            "Participant admitted from waiting room"
        );
        Ok((updated, participant))
    }

    /// Mark a participant `Left` and auto-end the meeting when the last
    /// Joined participant departs.
    pub async fn leave(&self, meeting_id: &str, user_id: &str) -> Result<LeaveOutcome, RelayError> {
        let Some(meeting) = self.store.find_by_id(meeting_id).await? else {
            return Ok(LeaveOutcome::NotFound);
        };
        if meeting.status.is_terminal() {
            return Ok(LeaveOutcome::AlreadyClosed);
        }

        let was_joined = meeting
            .participant(user_id)
            .is_some_and(|p| p.status == ParticipantStatus::Joined);

        let Some(updated) = self.store.remove_participant(meeting_id, user_id).await? else {
            return Ok(LeaveOutcome::NotFound);
        };

        // Auto-end only when a *Joined* departure brings the count to zero;
        // a waiting participant giving up never ends the meeting.
        let mut ended = false;
        let updated = if was_joined && updated.joined_count() == 0 {
            ended = true;
            info!(
                target: "relay.lifecycle",
                meeting_id = %meeting_id,
                "Last participant left, meeting ended"
            );
            self.store
                .update_status(meeting_id, MeetingStatus::Ended)
                .await?
                .unwrap_or(updated)
        } else {
            updated
        };

        Ok(LeaveOutcome::Left {
            meeting: updated,
            ended,
        })
    }

    /// End a meeting on the host's request, regardless of remaining
    /// participants. Joined and waiting roster entries are marked `Left`
    /// before the status flips so no active entry outlives the meeting.
    pub async fn end(
        &self,
        meeting_id: &str,
        requesting_user_id: &str,
    ) -> Result<Meeting, RelayError> {
        let meeting = self.fetch(meeting_id).await?;

        if !meeting.is_host(requesting_user_id) {
            return Err(RelayError::Forbidden(
                "Only host can end meeting".to_string(),
            ));
        }
        check_not_terminal(&meeting)?;

        for participant in &meeting.participants {
            if matches!(
                participant.status,
                ParticipantStatus::Joined | ParticipantStatus::Waiting
            ) {
                self.store
                    .remove_participant(meeting_id, &participant.user_id)
                    .await?;
            }
        }

        let updated = self
            .store
            .update_status(meeting_id, MeetingStatus::Ended)
            .await?
            .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))?;

        info!(
            target: "relay.lifecycle",
            meeting_id = %meeting_id,
            "Meeting ended by host"
        );
        Ok(updated)
    }

    /// Apply a media-flag patch to an existing roster entry.
    pub async fn update_media(
        &self,
        meeting_id: &str,
        user_id: &str,
        patch: ParticipantPatch,
    ) -> Result<Meeting, RelayError> {
        let updated = self
            .store
            .apply_participant_patch(meeting_id, user_id, patch)
            .await?
            .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))?;

        if updated.participant(user_id).is_none() {
            return Err(RelayError::NotFound("Participant not found".to_string()));
        }
        Ok(updated)
    }

    /// Append a chat message to the durable log and return the stamped
    /// message for relaying. The sender's display name comes from their
    /// roster entry.
    pub async fn record_chat(
        &self,
        meeting_id: &str,
        sender_id: &str,
        message: String,
        is_private: bool,
        recipient_id: Option<String>,
    ) -> Result<ChatMessage, RelayError> {
        let meeting = self.fetch(meeting_id).await?;
        let sender_name = meeting
            .participant(sender_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| RelayError::NotFound("Participant not found".to_string()))?;

        let chat = ChatMessage::new(sender_id, sender_name, message, is_private, recipient_id);
        self.store
            .add_chat_message(meeting_id, chat.clone())
            .await?
            .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))?;
        Ok(chat)
    }

    /// Flip the recording flag.
    pub async fn set_recording(
        &self,
        meeting_id: &str,
        is_recording: bool,
    ) -> Result<Meeting, RelayError> {
        self.store
            .toggle_recording(meeting_id, is_recording)
            .await?
            .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))
    }

    async fn fetch(&self, meeting_id: &str) -> Result<Meeting, RelayError> {
        self.store
            .find_by_id(meeting_id)
            .await?
            .ok_or_else(|| RelayError::NotFound("Meeting not found".to_string()))
    }
}

fn check_not_terminal(meeting: &Meeting) -> Result<(), RelayError> {
    match meeting.status {
        MeetingStatus::Ended => Err(RelayError::InvalidState("Meeting has ended".to_string())),
        MeetingStatus::Cancelled => Err(RelayError::InvalidState(
            "Meeting has been cancelled".to_string(),
        )),
        _ => Ok(()),
    }
}

fn check_capacity(meeting: &Meeting) -> Result<(), RelayError> {
    if meeting.joined_count() >= meeting.settings.max_participants {
        return Err(RelayError::CapacityExceeded("Meeting is full".to_string()));
    }
    Ok(())
}

fn check_not_already_joined(meeting: &Meeting, user_id: &str) -> Result<(), RelayError> {
    let already = meeting
        .participant(user_id)
        .is_some_and(|p| p.status == ParticipantStatus::Joined);
    if already {
        return Err(RelayError::AlreadyJoined("Already in meeting".to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use common::model::MeetingSettings;

    fn lifecycle() -> MeetingLifecycle {
        MeetingLifecycle::new(Arc::new(MemoryStore::new()))
    }

    fn draft(host: &str, settings: MeetingSettings) -> MeetingDraft {
        MeetingDraft {
            title: "Weekly sync".to_string(),
            description: None,
            host_id: host.to_string(),
            scheduled_at: None,
            settings: Some(settings),
        }
    }

    async fn join(
        lifecycle: &MeetingLifecycle,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<JoinOutcome, RelayError> {
        lifecycle
            .request_join(meeting_id, user_id, user_id, None, None)
            .await
    }

    #[tokio::test]
    async fn test_host_join_activates_scheduled_meeting_once() {
        let lifecycle = lifecycle();
        let meeting = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        assert_eq!(meeting.status, MeetingStatus::Scheduled);

        let outcome = join(&lifecycle, &meeting.meeting_id, "host").await.unwrap();
        let JoinOutcome::Joined { meeting: updated, participant } = outcome else {
            panic!("host should join directly");
        };
        assert_eq!(updated.status, MeetingStatus::Active);
        assert_eq!(participant.role, ParticipantRole::Host);
        assert!(updated.started_at.is_some());

        // A second host join while still active cannot re-trigger the
        // transition: it is rejected as a duplicate.
        let err = join(&lifecycle, &meeting.meeting_id, "host").await.unwrap_err();
        assert!(matches!(err, RelayError::AlreadyJoined(_)));
    }

    #[tokio::test]
    async fn test_join_missing_meeting() {
        let lifecycle = lifecycle();
        let err = join(&lifecycle, "none-none-none", "user").await.unwrap_err();
        assert!(matches!(err, RelayError::NotFound(_)));
        assert_eq!(err.client_message(), "Meeting not found");
    }

    #[tokio::test]
    async fn test_join_terminal_meetings_rejected_with_distinct_messages() {
        let lifecycle = lifecycle();
        let ended = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        lifecycle
            .store()
            .update_status(&ended.meeting_id, MeetingStatus::Ended)
            .await
            .unwrap();
        let err = join(&lifecycle, &ended.meeting_id, "user").await.unwrap_err();
        assert_eq!(err.client_message(), "Meeting has ended");

        let cancelled = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        lifecycle
            .store()
            .update_status(&cancelled.meeting_id, MeetingStatus::Cancelled)
            .await
            .unwrap();
        let err = join(&lifecycle, &cancelled.meeting_id, "user")
            .await
            .unwrap_err();
        assert_eq!(err.client_message(), "Meeting has been cancelled");
    }

    #[tokio::test]
    async fn test_password_flow() {
        let lifecycle = lifecycle();
        let settings = MeetingSettings {
            require_password: true,
            ..MeetingSettings::default()
        };
        let meeting = lifecycle
            .create_meeting(draft("host", settings), Some("secret".to_string()))
            .await
            .unwrap();

        let err = lifecycle
            .request_join(&meeting.meeting_id, "user", "user", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.client_message(), "Password required");

        let err = lifecycle
            .request_join(
                &meeting.meeting_id,
                "user",
                "user",
                None,
                Some("wrong".to_string()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.client_message(), "Invalid password");

        let outcome = lifecycle
            .request_join(
                &meeting.meeting_id,
                "user",
                "user",
                None,
                Some("secret".to_string()),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined { .. }));
    }

    #[tokio::test]
    async fn test_capacity_counts_joined_not_roster_size() {
        let lifecycle = lifecycle();
        let settings = MeetingSettings {
            max_participants: 2,
            ..MeetingSettings::default()
        };
        let meeting = lifecycle
            .create_meeting(draft("host", settings), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        join(&lifecycle, id, "host").await.unwrap();
        join(&lifecycle, id, "alice").await.unwrap();

        let err = join(&lifecycle, id, "bob").await.unwrap_err();
        assert_eq!(err.client_message(), "Meeting is full");

        // A departed entry frees capacity: Left entries never count.
        lifecycle.leave(id, "alice").await.unwrap();
        let outcome = join(&lifecycle, id, "bob").await.unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_join_rejected_rejoin_after_left_allowed() {
        let lifecycle = lifecycle();
        let meeting = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        join(&lifecycle, id, "host").await.unwrap();
        join(&lifecycle, id, "alice").await.unwrap();

        let err = join(&lifecycle, id, "alice").await.unwrap_err();
        assert_eq!(err.client_message(), "Already in meeting");

        lifecycle.leave(id, "alice").await.unwrap();
        let outcome = join(&lifecycle, id, "alice").await.unwrap();
        let JoinOutcome::Joined { meeting, .. } = outcome else {
            panic!("rejoin should succeed");
        };
        // Still a single roster entry for alice.
        assert_eq!(
            meeting
                .participants
                .iter()
                .filter(|p| p.user_id == "alice")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_waiting_room_and_admission() {
        let lifecycle = lifecycle();
        let settings = MeetingSettings {
            waiting_room: true,
            ..MeetingSettings::default()
        };
        let meeting = lifecycle
            .create_meeting(draft("host", settings), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        // Host bypasses the waiting room.
        let outcome = join(&lifecycle, id, "host").await.unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined { .. }));

        let outcome = join(&lifecycle, id, "alice").await.unwrap();
        let JoinOutcome::Waiting { meeting, participant } = outcome else {
            panic!("non-host should wait");
        };
        assert_eq!(participant.status, ParticipantStatus::Waiting);
        // Waiting entries do not count toward capacity.
        assert_eq!(meeting.joined_count(), 1);

        let err = lifecycle.admit(id, "alice", "alice").await.unwrap_err();
        assert_eq!(err.client_message(), "Only host can admit participants");

        let (updated, admitted) = lifecycle.admit(id, "alice", "host").await.unwrap();
        assert_eq!(admitted.status, ParticipantStatus::Joined);
        assert_eq!(updated.joined_count(), 2);
    }

    #[tokio::test]
    async fn test_admit_rechecks_capacity() {
        let lifecycle = lifecycle();
        let settings = MeetingSettings {
            waiting_room: true,
            max_participants: 2,
            ..MeetingSettings::default()
        };
        let meeting = lifecycle
            .create_meeting(draft("host", settings), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        join(&lifecycle, id, "host").await.unwrap();
        join(&lifecycle, id, "alice").await.unwrap(); // waiting
        join(&lifecycle, id, "bob").await.unwrap(); // waiting

        lifecycle.admit(id, "alice", "host").await.unwrap();

        // Capacity filled since bob's join request was accepted into the
        // waiting room; admission must re-check.
        let err = lifecycle.admit(id, "bob", "host").await.unwrap_err();
        assert_eq!(err.client_message(), "Meeting is full");
    }

    #[tokio::test]
    async fn test_leave_auto_ends_only_on_last_joined_departure() {
        let lifecycle = lifecycle();
        let meeting = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        join(&lifecycle, id, "host").await.unwrap();
        join(&lifecycle, id, "alice").await.unwrap();

        let LeaveOutcome::Left { meeting, ended } = lifecycle.leave(id, "alice").await.unwrap()
        else {
            panic!("leave should succeed");
        };
        assert!(!ended);
        assert_eq!(meeting.status, MeetingStatus::Active);
        assert_eq!(meeting.joined_count(), 1);

        let LeaveOutcome::Left { meeting, ended } = lifecycle.leave(id, "host").await.unwrap()
        else {
            panic!("leave should succeed");
        };
        assert!(ended);
        assert_eq!(meeting.status, MeetingStatus::Ended);
    }

    #[tokio::test]
    async fn test_waiting_departure_never_auto_ends() {
        let lifecycle = lifecycle();
        let settings = MeetingSettings {
            waiting_room: true,
            ..MeetingSettings::default()
        };
        let meeting = lifecycle
            .create_meeting(draft("host", settings), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        // Alice waits before the host has ever joined.
        join(&lifecycle, id, "alice").await.unwrap();
        let LeaveOutcome::Left { meeting, ended } = lifecycle.leave(id, "alice").await.unwrap()
        else {
            panic!("leave should succeed");
        };
        assert!(!ended);
        assert_eq!(meeting.status, MeetingStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_end_is_host_only_and_marks_roster_left() {
        let lifecycle = lifecycle();
        let meeting = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        join(&lifecycle, id, "host").await.unwrap();
        join(&lifecycle, id, "alice").await.unwrap();

        let err = lifecycle.end(id, "alice").await.unwrap_err();
        assert_eq!(err.client_message(), "Only host can end meeting");
        let unchanged = lifecycle.store().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, MeetingStatus::Active);

        let ended = lifecycle.end(id, "host").await.unwrap();
        assert_eq!(ended.status, MeetingStatus::Ended);
        assert_eq!(ended.joined_count(), 0);
        assert!(ended
            .participants
            .iter()
            .all(|p| p.status == ParticipantStatus::Left));
    }

    #[tokio::test]
    async fn test_leave_after_end_is_noop() {
        let lifecycle = lifecycle();
        let meeting = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;

        join(&lifecycle, id, "host").await.unwrap();
        lifecycle.end(id, "host").await.unwrap();

        let outcome = lifecycle.leave(id, "host").await.unwrap();
        assert!(matches!(outcome, LeaveOutcome::AlreadyClosed));
    }

    #[tokio::test]
    async fn test_update_media_patches_flags_only() {
        let lifecycle = lifecycle();
        let meeting = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;
        join(&lifecycle, id, "host").await.unwrap();

        let patch = ParticipantPatch {
            is_muted: Some(true),
            ..ParticipantPatch::default()
        };
        let updated = lifecycle.update_media(id, "host", patch).await.unwrap();
        let host = updated.participant("host").unwrap();
        assert!(host.is_muted);
        assert_eq!(host.status, ParticipantStatus::Joined);

        let err = lifecycle
            .update_media(id, "ghost", ParticipantPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_record_chat_appends_to_log() {
        let lifecycle = lifecycle();
        let meeting = lifecycle
            .create_meeting(draft("host", MeetingSettings::default()), None)
            .await
            .unwrap();
        let id = &meeting.meeting_id;
        join(&lifecycle, id, "host").await.unwrap();

        let chat = lifecycle
            .record_chat(id, "host", "hello".to_string(), false, None)
            .await
            .unwrap();
        assert_eq!(chat.message, "hello");
        assert_eq!(chat.sender_name, "host");

        let stored = lifecycle.store().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.chat_messages.len(), 1);
        assert_eq!(stored.chat_messages[0].id, chat.id);
    }

    #[tokio::test]
    async fn test_create_requires_password_when_settings_demand_it() {
        let lifecycle = lifecycle();
        let settings = MeetingSettings {
            require_password: true,
            ..MeetingSettings::default()
        };
        let err = lifecycle
            .create_meeting(draft("host", settings), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }
}
