//! Signaling router for one meeting.
//!
//! Resolves destinations through the meeting's [`SessionRegistry`] and
//! delivers point-to-point negotiation events and room-wide broadcasts. All
//! delivery is best-effort and synchronous: a missing destination is a
//! silent no-op (the peer may have already disconnected), and no
//! acknowledgement is ever awaited.

use common::model::{ChatMessage, Meeting};
use common::protocol::{PeerInfo, ServerEvent};

use crate::registry::{ConnectionHandle, SessionRegistry};

/// Router owning the live-connection registry for one meeting.
#[derive(Debug, Default)]
pub struct SignalingRouter {
    registry: SessionRegistry,
}

impl SignalingRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection for a participant; returns the superseded
    /// handle on a rebind.
    pub fn bind(
        &mut self,
        user_id: impl Into<String>,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        self.registry.bind(user_id, handle)
    }

    /// Drop a participant's registration.
    pub fn unbind(&mut self, user_id: &str) -> Option<ConnectionHandle> {
        self.registry.unbind(user_id)
    }

    /// Whether the given connection is still the bound one for the user.
    #[must_use]
    pub fn is_current(&self, user_id: &str, connection_id: &str) -> bool {
        self.registry.is_current(user_id, connection_id)
    }

    /// Number of live registrations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.registry.len()
    }

    /// True when no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// User ids of everyone currently registered.
    #[must_use]
    pub fn live_user_ids(&self) -> Vec<String> {
        self.registry.user_ids()
    }

    /// Whether the user has a live registration.
    #[must_use]
    pub fn is_live(&self, user_id: &str) -> bool {
        self.registry.resolve(user_id).is_some()
    }

    /// Drop every registration, returning how many there were.
    pub fn clear(&mut self) -> usize {
        self.registry.clear()
    }

    /// Deliver an event to one participant, silently dropping it when the
    /// target has no live registration.
    pub fn relay_direct(&self, to: &str, event: ServerEvent) {
        if let Some(handle) = self.registry.resolve(to) {
            handle.send(event);
        }
    }

    /// Deliver an event to every registered connection, optionally skipping
    /// the sender.
    pub fn broadcast(&self, event: &ServerEvent, except_user_id: Option<&str>) {
        for (user_id, handle) in self.registry.iter() {
            if except_user_id == Some(user_id) {
                continue;
            }
            handle.send(event.clone());
        }
    }

    /// Deliver a chat message per the chat routing rule: a private message
    /// with a named recipient goes to that recipient (if live) and echoes
    /// back to the sender; anything else goes to everyone, sender included.
    pub fn relay_chat(&self, message: &ChatMessage) {
        if message.is_private {
            if let Some(recipient_id) = message.recipient_id.as_deref() {
                self.relay_direct(recipient_id, ServerEvent::Chat(message.clone()));
                self.relay_direct(&message.sender_id, ServerEvent::Chat(message.clone()));
                return;
            }
        }
        self.broadcast(&ServerEvent::Chat(message.clone()), None);
    }

    /// Snapshot of everyone currently registered except the joiner, with
    /// display names resolved from the roster.
    #[must_use]
    pub fn existing_participants(&self, meeting: &Meeting, excluding_user_id: &str) -> Vec<PeerInfo> {
        self.registry
            .list_others(excluding_user_id)
            .map(|(user_id, _)| PeerInfo {
                user_id: user_id.to_string(),
                name: meeting
                    .participant(user_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| user_id.to_string()),
            })
            .collect()
    }
}
