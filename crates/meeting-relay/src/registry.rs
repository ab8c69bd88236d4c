//! Per-meeting session registry.
//!
//! Maps a participant's `user_id` to the live connection handle for exactly
//! one meeting. Each `MeetingActor` owns one registry, so every mutation is
//! already serialized by the actor's mailbox; nothing here suspends.
//!
//! An entry exists if and only if the participant's roster status is
//! `Joined`. Waiting-room participants are tracked separately by the actor
//! and are not relay-eligible.

use std::collections::HashMap;

use common::protocol::ServerEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound channel buffer per connection.
pub const CONNECTION_OUTBOUND_BUFFER: usize = 128;

/// Cheap-clone handle to one live connection's outbound event channel.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: String,
    sender: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving half the transport loop drains.
    #[must_use]
    pub fn channel(connection_id: impl Into<String>) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(CONNECTION_OUTBOUND_BUFFER);
        (
            Self {
                connection_id: connection_id.into(),
                sender,
            },
            receiver,
        )
    }

    /// Get the connection ID.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Deliver an event, best-effort.
    ///
    /// A closed or saturated channel drops the event: relayed signaling has
    /// no acknowledgement or retry semantics, and the peer may already be
    /// gone.
    pub fn send(&self, event: ServerEvent) {
        if let Err(err) = self.sender.try_send(event) {
            debug!(
                target: "relay.registry",
                connection_id = %self.connection_id,
                error = %err,
                "Dropped outbound event"
            );
        }
    }
}

/// Registry of live connections for one meeting.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: HashMap<String, ConnectionHandle>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the handle for a participant.
    ///
    /// Returns the superseded handle when the participant was already bound;
    /// the prior connection is treated as having left without a separate
    /// "left" transition.
    pub fn bind(
        &mut self,
        user_id: impl Into<String>,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        self.entries.insert(user_id.into(), handle)
    }

    /// Remove a participant's handle, returning it if present.
    pub fn unbind(&mut self, user_id: &str) -> Option<ConnectionHandle> {
        self.entries.remove(user_id)
    }

    /// Look up a participant's live handle.
    #[must_use]
    pub fn resolve(&self, user_id: &str) -> Option<&ConnectionHandle> {
        self.entries.get(user_id)
    }

    /// Every registered participant except the named one.
    pub fn list_others<'a>(
        &'a self,
        excluding_user_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ConnectionHandle)> + 'a {
        self.entries
            .iter()
            .filter(move |(user_id, _)| user_id.as_str() != excluding_user_id)
            .map(|(user_id, handle)| (user_id.as_str(), handle))
    }

    /// All registered participants.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConnectionHandle)> + '_ {
        self.entries
            .iter()
            .map(|(user_id, handle)| (user_id.as_str(), handle))
    }

    /// Whether a given connection is still the bound one for the user.
    ///
    /// Used to ignore stale cleanups from superseded connections.
    #[must_use]
    pub fn is_current(&self, user_id: &str, connection_id: &str) -> bool {
        self.entries
            .get(user_id)
            .is_some_and(|h| h.connection_id() == connection_id)
    }

    /// Drop every entry, returning how many were registered.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// User ids of every registered participant.
    #[must_use]
    pub fn user_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
