//! Connection lifecycle handler.
//!
//! One `ConnectionDriver` per inbound connection, running the state machine
//! `Unbound -> {Waiting | Bound} -> Closed`:
//!
//! - `Unbound`: only `join-meeting` is legal
//! - `Waiting`: parked in the waiting room; only leaving is meaningful
//! - `Bound`: full relay/toggle/chat surface
//!
//! Every exit path (explicit leave, transport disconnect, protocol error,
//! meeting end) funnels through [`ConnectionDriver::cleanup`], which is
//! idempotent: registry unbinding, the lifecycle `Leave` and the departure
//! broadcast run exactly once no matter which path fired first.

use common::protocol::{ClientEvent, ServerEvent};
use tracing::{debug, warn};

use crate::actors::meeting::MeetingActorHandle;
use crate::actors::messages::{JoinReply, MediaToggle, SignalKind};
use crate::actors::supervisor::RelaySupervisorHandle;
use crate::errors::RelayError;
use crate::registry::ConnectionHandle;

/// What the transport loop should do after an event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    /// Keep the connection open.
    Continue,
    /// Close the connection (cleanup has already run).
    Close,
}

/// Observable phase of a connection, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Unbound,
    Waiting,
    Bound,
    Closed,
}

enum ConnectionState {
    Unbound,
    Waiting {
        meeting: MeetingActorHandle,
        user_id: String,
    },
    Bound {
        meeting: MeetingActorHandle,
        user_id: String,
    },
    Closed,
}

/// Per-connection event handler.
pub struct ConnectionDriver {
    connection_id: String,
    supervisor: RelaySupervisorHandle,
    /// Outbound handle for this connection's own client (error events, and
    /// the handle registered with the meeting actor on join).
    outbound: ConnectionHandle,
    state: ConnectionState,
}

impl ConnectionDriver {
    #[must_use]
    pub fn new(supervisor: RelaySupervisorHandle, outbound: ConnectionHandle) -> Self {
        Self {
            connection_id: outbound.connection_id().to_string(),
            supervisor,
            outbound,
            state: ConnectionState::Unbound,
        }
    }

    /// Get the connection ID.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Current phase of the connection state machine.
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        match self.state {
            ConnectionState::Unbound => ConnectionPhase::Unbound,
            ConnectionState::Waiting { .. } => ConnectionPhase::Waiting,
            ConnectionState::Bound { .. } => ConnectionPhase::Bound,
            ConnectionState::Closed => ConnectionPhase::Closed,
        }
    }

    /// Handle one inbound event.
    pub async fn handle_event(&mut self, event: ClientEvent) -> EventFlow {
        match self.phase() {
            ConnectionPhase::Unbound => self.handle_unbound(event).await,
            ConnectionPhase::Waiting => self.handle_waiting(event).await,
            ConnectionPhase::Bound => self.handle_bound(event).await,
            ConnectionPhase::Closed => EventFlow::Close,
        }
    }

    /// Inspect an outbound event before it is written to the transport.
    ///
    /// This is where admission promotes a waiting connection to `Bound`,
    /// and where a meeting-ended notice closes the connection.
    pub async fn observe_outbound(&mut self, event: &ServerEvent) -> EventFlow {
        match event {
            ServerEvent::Admitted { .. } => {
                if self.phase() == ConnectionPhase::Waiting {
                    if let ConnectionState::Waiting { meeting, user_id } =
                        std::mem::replace(&mut self.state, ConnectionState::Closed)
                    {
                        debug!(
                            target: "relay.conn",
                            connection_id = %self.connection_id,
                            user_id = %user_id,
                            "Connection promoted from waiting room"
                        );
                        self.state = ConnectionState::Bound { meeting, user_id };
                    }
                }
                EventFlow::Continue
            }
            ServerEvent::MeetingEnded { .. } => {
                self.cleanup().await;
                EventFlow::Close
            }
            _ => EventFlow::Continue,
        }
    }

    /// Idempotent teardown: unbind from the meeting actor (which drops the
    /// registry entry, records the Leave and broadcasts the departure),
    /// exactly once.
    pub async fn cleanup(&mut self) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
        match state {
            ConnectionState::Waiting { meeting, user_id }
            | ConnectionState::Bound { meeting, user_id } => {
                // The actor may already be gone (meeting ended); that is a
                // normal exit path, not an error.
                if let Err(err) = meeting
                    .connection_closed(user_id.clone(), self.connection_id.clone())
                    .await
                {
                    debug!(
                        target: "relay.conn",
                        connection_id = %self.connection_id,
                        user_id = %user_id,
                        error = %err,
                        "Cleanup notification not delivered"
                    );
                }
            }
            ConnectionState::Unbound | ConnectionState::Closed => {}
        }
    }

    async fn handle_unbound(&mut self, event: ClientEvent) -> EventFlow {
        let ClientEvent::JoinMeeting {
            meeting_id,
            user_id,
            name,
            email,
            password,
        } = event
        else {
            self.outbound.send(ServerEvent::Error {
                message: "Not in a meeting".to_string(),
            });
            return EventFlow::Continue;
        };

        match self
            .join(meeting_id, user_id.clone(), name, email, password)
            .await
        {
            Ok((meeting, JoinReply::Joined)) => {
                self.state = ConnectionState::Bound { meeting, user_id };
            }
            Ok((meeting, JoinReply::Waiting)) => {
                self.state = ConnectionState::Waiting { meeting, user_id };
            }
            Err(err) => {
                self.outbound.send(ServerEvent::JoinError {
                    message: err.client_message(),
                });
            }
        }
        EventFlow::Continue
    }

    /// Resolve the meeting actor and run the join, retrying once when the
    /// actor drained between resolution and delivery.
    async fn join(
        &mut self,
        meeting_id: String,
        user_id: String,
        name: String,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<(MeetingActorHandle, JoinReply), RelayError> {
        for attempt in 0..2 {
            let meeting = self.supervisor.meeting_handle(meeting_id.clone()).await?;
            match meeting
                .join(
                    user_id.clone(),
                    name.clone(),
                    email.clone(),
                    password.clone(),
                    self.outbound.clone(),
                )
                .await
            {
                Ok(reply) => return Ok((meeting, reply)),
                Err(RelayError::Internal(_)) if attempt == 0 => {
                    debug!(
                        target: "relay.conn",
                        connection_id = %self.connection_id,
                        meeting_id = %meeting_id,
                        "Meeting actor drained mid-join, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(RelayError::Internal("join retry exhausted".to_string()))
    }

    async fn handle_waiting(&mut self, event: ClientEvent) -> EventFlow {
        match event {
            ClientEvent::LeaveMeeting => {
                self.cleanup().await;
                EventFlow::Close
            }
            ClientEvent::JoinMeeting { .. } => {
                self.outbound.send(ServerEvent::Error {
                    message: "Already waiting for admission".to_string(),
                });
                EventFlow::Continue
            }
            _ => {
                self.outbound.send(ServerEvent::Error {
                    message: "Waiting for host admission".to_string(),
                });
                EventFlow::Continue
            }
        }
    }

    async fn handle_bound(&mut self, event: ClientEvent) -> EventFlow {
        let (meeting, user_id) = match &self.state {
            ConnectionState::Bound { meeting, user_id } => (meeting.clone(), user_id.clone()),
            _ => return EventFlow::Close,
        };

        let result = match event {
            ClientEvent::JoinMeeting { .. } => {
                self.outbound.send(ServerEvent::Error {
                    message: "Already in a meeting".to_string(),
                });
                Ok(())
            }

            ClientEvent::Offer { to, payload } => {
                meeting.signal(user_id, to, SignalKind::Offer, payload).await
            }
            ClientEvent::Answer { to, payload } => {
                meeting
                    .signal(user_id, to, SignalKind::Answer, payload)
                    .await
            }
            ClientEvent::IceCandidate { to, payload } => {
                meeting
                    .signal(user_id, to, SignalKind::IceCandidate, payload)
                    .await
            }

            ClientEvent::Chat {
                message,
                is_private,
                recipient_id,
            } => meeting.chat(user_id, message, is_private, recipient_id).await,

            ClientEvent::ToggleMute { is_muted } => {
                meeting
                    .media_update(user_id, MediaToggle::Mute { is_muted })
                    .await
            }
            ClientEvent::ToggleVideo { is_video_off } => {
                meeting
                    .media_update(user_id, MediaToggle::Video { is_video_off })
                    .await
            }
            ClientEvent::RaiseHand { is_hand_raised } => {
                meeting
                    .media_update(user_id, MediaToggle::Hand { is_hand_raised })
                    .await
            }

            ClientEvent::AdmitUser {
                user_id: target_user_id,
            } => {
                if let Err(err) = meeting.admit(target_user_id, user_id).await {
                    self.outbound.send(ServerEvent::Error {
                        message: err.client_message(),
                    });
                }
                Ok(())
            }

            ClientEvent::StartScreenShare => meeting.screen_share(user_id, true).await,
            ClientEvent::StopScreenShare => meeting.screen_share(user_id, false).await,

            ClientEvent::EndMeeting => {
                if let Err(err) = meeting.end_meeting(user_id).await {
                    self.outbound.send(ServerEvent::Error {
                        message: err.client_message(),
                    });
                }
                // On success the meeting-ended notice arrives on the
                // outbound path and closes the connection there.
                Ok(())
            }

            ClientEvent::LeaveMeeting => {
                self.cleanup().await;
                return EventFlow::Close;
            }
        };

        if let Err(err) = result {
            // The meeting actor is gone; the meeting-ended notice is either
            // already queued on the outbound channel or the meeting drained.
            warn!(
                target: "relay.conn",
                connection_id = %self.connection_id,
                error = %err,
                "Command not delivered, closing connection"
            );
            self.cleanup().await;
            return EventFlow::Close;
        }
        EventFlow::Continue
    }
}
