//! Meeting store contract.
//!
//! The relay owns live state; durable meeting documents live behind this
//! trait. Every method is a suspension point for the calling actor, so
//! implementations must never require the caller to hold locks across the
//! call.
//!
//! Mutating operations refuse to touch a meeting in a terminal state
//! (`Ended`/`Cancelled`); the one exception is `update_status` moving the
//! meeting *into* a terminal state.

use async_trait::async_trait;
use common::model::{
    ChatMessage, Meeting, MeetingDraft, MeetingStatus, Participant, ParticipantPatch,
    ParticipantStatus,
};

use crate::errors::RelayError;

mod memory;

pub use memory::MemoryStore;

/// Durable repository of meeting documents.
///
/// Mirrors the operations the relay consumes: create/read/update by id,
/// roster mutation, chat append, status transition.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Persist a new meeting in `Scheduled` state with an empty roster.
    ///
    /// The store assigns the meeting code; the caller supplies settings with
    /// the password already hashed.
    async fn create(&self, draft: MeetingDraft) -> Result<Meeting, RelayError>;

    /// Fetch a meeting by id.
    async fn find_by_id(&self, meeting_id: &str) -> Result<Option<Meeting>, RelayError>;

    /// All meetings hosted by the given user, newest first.
    async fn find_by_host(&self, host_id: &str) -> Result<Vec<Meeting>, RelayError>;

    /// All meetings the user hosts or appears in the roster of, newest first.
    async fn find_user_meetings(&self, user_id: &str) -> Result<Vec<Meeting>, RelayError>;

    /// All meetings currently in `Active` status.
    async fn get_active_meetings(&self) -> Result<Vec<Meeting>, RelayError>;

    /// Transition a meeting's status, stamping `started_at`/`ended_at` as
    /// appropriate. Returns the updated document, or `None` if absent.
    async fn update_status(
        &self,
        meeting_id: &str,
        status: MeetingStatus,
    ) -> Result<Option<Meeting>, RelayError>;

    /// Insert a roster entry, or replace the entry with the same `user_id`
    /// (a rejoin starts a fresh visit; entries are never duplicated).
    async fn upsert_participant(
        &self,
        meeting_id: &str,
        participant: Participant,
    ) -> Result<Option<Meeting>, RelayError>;

    /// Mark a roster entry `Left` and stamp `left_at`. The entry itself is
    /// preserved.
    async fn remove_participant(
        &self,
        meeting_id: &str,
        user_id: &str,
    ) -> Result<Option<Meeting>, RelayError>;

    /// Transition a roster entry's status (admit, removal).
    async fn update_participant_status(
        &self,
        meeting_id: &str,
        user_id: &str,
        status: ParticipantStatus,
    ) -> Result<Option<Meeting>, RelayError>;

    /// Apply a media-flag merge-patch to a roster entry.
    async fn apply_participant_patch(
        &self,
        meeting_id: &str,
        user_id: &str,
        patch: ParticipantPatch,
    ) -> Result<Option<Meeting>, RelayError>;

    /// Append to the meeting's chat log.
    async fn add_chat_message(
        &self,
        meeting_id: &str,
        message: ChatMessage,
    ) -> Result<Option<Meeting>, RelayError>;

    /// Flip the recording flag.
    async fn toggle_recording(
        &self,
        meeting_id: &str,
        is_recording: bool,
    ) -> Result<Option<Meeting>, RelayError>;

    /// Delete a meeting document outright. Returns whether anything was
    /// removed.
    async fn delete(&self, meeting_id: &str) -> Result<bool, RelayError>;
}
