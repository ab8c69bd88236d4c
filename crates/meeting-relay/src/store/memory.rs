//! In-memory meeting store.
//!
//! Process-local implementation of [`MeetingStore`] used by the binary and
//! the test suite. Documents live in a `HashMap` behind an async `RwLock`;
//! every operation copies snapshots out so no lock is ever held across an
//! await in the caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::model::{
    generate_meeting_code, ChatMessage, Meeting, MeetingDraft, MeetingStatus, Participant,
    ParticipantPatch, ParticipantStatus,
};
use tokio::sync::RwLock;

use super::MeetingStore;
use crate::errors::RelayError;

/// In-memory [`MeetingStore`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    meetings: Arc<RwLock<HashMap<String, Meeting>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a mutation against one meeting document.
    ///
    /// Refuses to mutate a meeting already in a terminal state. Returns the
    /// updated snapshot, `None` when the meeting does not exist.
    async fn mutate<F>(&self, meeting_id: &str, f: F) -> Result<Option<Meeting>, RelayError>
    where
        F: FnOnce(&mut Meeting),
    {
        let mut meetings = self.meetings.write().await;
        let Some(meeting) = meetings.get_mut(meeting_id) else {
            return Ok(None);
        };
        if meeting.status.is_terminal() {
            return Err(RelayError::InvalidState(format!(
                "Meeting {meeting_id} is no longer active"
            )));
        }
        f(meeting);
        meeting.updated_at = Utc::now();
        Ok(Some(meeting.clone()))
    }
}

#[async_trait]
impl MeetingStore for MemoryStore {
    async fn create(&self, draft: MeetingDraft) -> Result<Meeting, RelayError> {
        let mut meetings = self.meetings.write().await;

        // Regenerate on the (unlikely) collision of a friendly code.
        let mut meeting_id = generate_meeting_code();
        while meetings.contains_key(&meeting_id) {
            meeting_id = generate_meeting_code();
        }

        let now = Utc::now();
        let meeting = Meeting {
            meeting_id: meeting_id.clone(),
            title: draft.title,
            description: draft.description,
            host_id: draft.host_id,
            scheduled_at: draft.scheduled_at,
            started_at: None,
            ended_at: None,
            status: MeetingStatus::Scheduled,
            participants: Vec::new(),
            settings: draft.settings.unwrap_or_default(),
            is_recording: false,
            chat_messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        meetings.insert(meeting_id, meeting.clone());
        Ok(meeting)
    }

    async fn find_by_id(&self, meeting_id: &str) -> Result<Option<Meeting>, RelayError> {
        let meetings = self.meetings.read().await;
        Ok(meetings.get(meeting_id).cloned())
    }

    async fn find_by_host(&self, host_id: &str) -> Result<Vec<Meeting>, RelayError> {
        let meetings = self.meetings.read().await;
        let mut found: Vec<Meeting> = meetings
            .values()
            .filter(|m| m.host_id == host_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_user_meetings(&self, user_id: &str) -> Result<Vec<Meeting>, RelayError> {
        let meetings = self.meetings.read().await;
        let mut found: Vec<Meeting> = meetings
            .values()
            .filter(|m| m.host_id == user_id || m.participant(user_id).is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn get_active_meetings(&self) -> Result<Vec<Meeting>, RelayError> {
        let meetings = self.meetings.read().await;
        let mut found: Vec<Meeting> = meetings
            .values()
            .filter(|m| m.status == MeetingStatus::Active)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(found)
    }

    async fn update_status(
        &self,
        meeting_id: &str,
        status: MeetingStatus,
    ) -> Result<Option<Meeting>, RelayError> {
        self.mutate(meeting_id, |meeting| {
            meeting.status = status;
            match status {
                MeetingStatus::Active => meeting.started_at = Some(Utc::now()),
                MeetingStatus::Ended => meeting.ended_at = Some(Utc::now()),
                _ => {}
            }
        })
        .await
    }

    async fn upsert_participant(
        &self,
        meeting_id: &str,
        participant: Participant,
    ) -> Result<Option<Meeting>, RelayError> {
        self.mutate(meeting_id, |meeting| {
            if let Some(existing) = meeting
                .participants
                .iter_mut()
                .find(|p| p.user_id == participant.user_id)
            {
                *existing = participant;
            } else {
                meeting.participants.push(participant);
            }
        })
        .await
    }

    async fn remove_participant(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<Option<Meeting>, RelayError> {
        self.mutate(meeting_id, |meeting| {
            if let Some(p) = meeting
                .participants
                .iter_mut()
                .find(|p| p.user_id == user_id)
            {
                p.status = ParticipantStatus::Left;
                p.left_at = Some(Utc::now());
            }
        })
        .await
    }

    async fn update_participant_status(
        &self,
        meeting_id: &str,
        user_id: &str,
        status: ParticipantStatus,
    ) -> Result<Option<Meeting>, RelayError> {
        self.mutate(meeting_id, |meeting| {
            if let Some(p) = meeting
                .participants
                .iter_mut()
                .find(|p| p.user_id == user_id)
            {
                p.status = status;
                if matches!(status, ParticipantStatus::Left | ParticipantStatus::Removed) {
                    p.left_at = Some(Utc::now());
                }
            }
        })
        .await
    }

    async fn apply_participant_patch(
        &self,
        meeting_id: &str,
        user_id: &str,
        patch: ParticipantPatch,
    ) -> Result<Option<Meeting>, RelayError> {
        self.mutate(meeting_id, |meeting| {
            if let Some(p) = meeting
                .participants
                .iter_mut()
                .find(|p| p.user_id == user_id)
            {
                patch.apply(p);
            }
        })
        .await
    }

    async fn add_chat_message(
        &self,
        meeting_id: &str,
        message: ChatMessage,
    ) -> Result<Option<Meeting>, RelayError> {
        self.mutate(meeting_id, |meeting| {
            meeting.chat_messages.push(message);
        })
        .await
    }

    async fn toggle_recording(
        &self,
        meeting_id: &str,
        is_recording: bool,
    ) -> Result<Option<Meeting>, RelayError> {
        self.mutate(meeting_id, |meeting| {
            meeting.is_recording = is_recording;
        })
        .await
    }

    async fn delete(&self, meeting_id: &str) -> Result<bool, RelayError> {
        let mut meetings = self.meetings.write().await;
        Ok(meetings.remove(meeting_id).is_some())
    }
}
