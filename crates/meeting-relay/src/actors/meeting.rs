//! `MeetingActor` - per-meeting actor that owns live meeting state.
//!
//! Each `MeetingActor`:
//! - Is the single serialization unit for one meeting's roster, status and
//!   registry mutations (two concurrent joins against a nearly-full meeting
//!   cannot both observe the same pre-mutation count)
//! - Owns the meeting's [`SignalingRouter`] (and through it the session
//!   registry) plus the waiting-room map
//! - Drives the [`MeetingLifecycle`] for all durable-state changes; store
//!   I/O suspends only inside this actor's turn
//!
//! When the last registered connection unbinds and the waiting room is
//! empty, the actor reports itself finished to the supervisor and stops;
//! the meeting key disappears with it.

use std::collections::HashMap;
use std::sync::Arc;

use common::protocol::ServerEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::messages::{
    JoinReply, MediaToggle, MeetingCommand, MeetingSnapshot, SignalKind, SupervisorMessage,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::errors::RelayError;
use crate::lifecycle::{JoinOutcome, LeaveOutcome, MeetingLifecycle};
use crate::registry::ConnectionHandle;
use crate::router::SignalingRouter;

/// Default channel buffer size for the meeting mailbox.
const MEETING_CHANNEL_BUFFER: usize = 256;

/// Handle to a `MeetingActor`.
#[derive(Debug, Clone)]
pub struct MeetingActorHandle {
    sender: mpsc::Sender<MeetingCommand>,
    cancel_token: CancellationToken,
    meeting_id: String,
}

impl MeetingActorHandle {
    /// Get the meeting ID.
    #[must_use]
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// Request to join this meeting with the given connection handle.
    pub async fn join(
        &self,
        user_id: String,
        name: String,
        email: Option<String>,
        password: Option<String>,
        handle: ConnectionHandle,
    ) -> Result<JoinReply, RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(MeetingCommand::Join {
                user_id,
                name,
                email,
                password,
                handle,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))?
    }

    /// Host admits a waiting participant.
    pub async fn admit(
        &self,
        target_user_id: String,
        requesting_user_id: String,
    ) -> Result<(), RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(MeetingCommand::Admit {
                target_user_id,
                requesting_user_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))?
    }

    /// Notify that a connection is gone (leave or transport disconnect).
    pub async fn connection_closed(
        &self,
        user_id: String,
        connection_id: String,
    ) -> Result<(), RelayError> {
        self.sender
            .send(MeetingCommand::ConnectionClosed {
                user_id,
                connection_id,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Host ends the meeting for everyone.
    pub async fn end_meeting(&self, requesting_user_id: String) -> Result<(), RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(MeetingCommand::EndMeeting {
                requesting_user_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))?
    }

    /// Apply a media toggle.
    pub async fn media_update(
        &self,
        user_id: String,
        toggle: MediaToggle,
    ) -> Result<(), RelayError> {
        self.sender
            .send(MeetingCommand::MediaUpdate { user_id, toggle })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Relay a chat message.
    pub async fn chat(
        &self,
        user_id: String,
        message: String,
        is_private: bool,
        recipient_id: Option<String>,
    ) -> Result<(), RelayError> {
        self.sender
            .send(MeetingCommand::Chat {
                user_id,
                message,
                is_private,
                recipient_id,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Relay a point-to-point negotiation payload.
    pub async fn signal(
        &self,
        from_user_id: String,
        to_user_id: String,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<(), RelayError> {
        self.sender
            .send(MeetingCommand::Signal {
                from_user_id,
                to_user_id,
                kind,
                payload,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Broadcast a screen-share start/stop.
    pub async fn screen_share(&self, user_id: String, active: bool) -> Result<(), RelayError> {
        self.sender
            .send(MeetingCommand::ScreenShare { user_id, active })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))
    }

    /// Get a live snapshot of the meeting.
    pub async fn snapshot(&self) -> Result<MeetingSnapshot, RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(MeetingCommand::Snapshot { respond_to: tx })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Whether the actor's mailbox has closed (actor stopped).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Cancel the meeting actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// The `MeetingActor` implementation.
pub struct MeetingActor {
    /// Meeting ID.
    meeting_id: String,
    /// Command receiver.
    receiver: mpsc::Receiver<MeetingCommand>,
    /// Cancellation token (child of the supervisor's token).
    cancel_token: CancellationToken,
    /// Lifecycle manager (durable state).
    lifecycle: MeetingLifecycle,
    /// Signaling router owning the session registry.
    router: SignalingRouter,
    /// Waiting-room connections, keyed by user id. Not relay-eligible.
    waiting: HashMap<String, ConnectionHandle>,
    /// Whether the meeting has ended or the relay is draining.
    is_shutting_down: bool,
    /// Shared relay metrics.
    metrics: Arc<ActorMetrics>,
    /// Channel back to the supervisor for finish notifications.
    supervisor: mpsc::Sender<SupervisorMessage>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl MeetingActor {
    /// Spawn a new meeting actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        meeting_id: String,
        lifecycle: MeetingLifecycle,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        supervisor: mpsc::Sender<SupervisorMessage>,
    ) -> (MeetingActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(MEETING_CHANNEL_BUFFER);

        let actor = Self {
            meeting_id: meeting_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            lifecycle,
            router: SignalingRouter::new(),
            waiting: HashMap::new(),
            is_shutting_down: false,
            metrics,
            supervisor,
            mailbox: MailboxMonitor::new(ActorType::Meeting, &meeting_id),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = MeetingActorHandle {
            sender,
            cancel_token,
            meeting_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "relay.actor.meeting", fields(meeting_id = %self.meeting_id))]
    async fn run(mut self) {
        debug!(
            target: "relay.actor.meeting",
            meeting_id = %self.meeting_id,
            "MeetingActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "relay.actor.meeting",
                        meeting_id = %self.meeting_id,
                        "MeetingActor received cancellation signal"
                    );
                    self.graceful_shutdown();
                    break;
                }

                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(command) => {
                            self.mailbox.record_enqueue();
                            self.handle_command(command).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();

                            if self.is_drained() {
                                let _ = self
                                    .supervisor
                                    .send(SupervisorMessage::MeetingFinished {
                                        meeting_id: self.meeting_id.clone(),
                                    })
                                    .await;
                                break;
                            }
                        }
                        None => {
                            debug!(
                                target: "relay.actor.meeting",
                                meeting_id = %self.meeting_id,
                                "MeetingActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "relay.actor.meeting",
            meeting_id = %self.meeting_id,
            messages_processed = self.mailbox.messages_processed(),
            "MeetingActor stopped"
        );
    }

    /// No live connections, nobody waiting: this meeting has no reason to
    /// keep an actor alive.
    fn is_drained(&self) -> bool {
        self.router.is_empty() && self.waiting.is_empty()
    }

    /// Handle a single command.
    async fn handle_command(&mut self, command: MeetingCommand) {
        match command {
            MeetingCommand::Join {
                user_id,
                name,
                email,
                password,
                handle,
                respond_to,
            } => {
                let result = self.handle_join(user_id, name, email, password, handle).await;
                let _ = respond_to.send(result);
            }

            MeetingCommand::Admit {
                target_user_id,
                requesting_user_id,
                respond_to,
            } => {
                let result = self.handle_admit(&target_user_id, &requesting_user_id).await;
                let _ = respond_to.send(result);
            }

            MeetingCommand::ConnectionClosed {
                user_id,
                connection_id,
            } => {
                self.handle_connection_closed(&user_id, &connection_id).await;
            }

            MeetingCommand::EndMeeting {
                requesting_user_id,
                respond_to,
            } => {
                let result = self.handle_end_meeting(&requesting_user_id).await;
                let _ = respond_to.send(result);
            }

            MeetingCommand::MediaUpdate { user_id, toggle } => {
                self.handle_media_update(&user_id, toggle).await;
            }

            MeetingCommand::Chat {
                user_id,
                message,
                is_private,
                recipient_id,
            } => {
                self.handle_chat(&user_id, message, is_private, recipient_id)
                    .await;
            }

            MeetingCommand::Signal {
                from_user_id,
                to_user_id,
                kind,
                payload,
            } => {
                self.handle_signal(&from_user_id, &to_user_id, kind, payload);
            }

            MeetingCommand::ScreenShare { user_id, active } => {
                self.handle_screen_share(&user_id, active);
            }

            MeetingCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    /// Handle a join request from a connection.
    #[instrument(skip_all, fields(meeting_id = %self.meeting_id, user_id = %user_id))]
    async fn handle_join(
        &mut self,
        user_id: String,
        name: String,
        email: Option<String>,
        password: Option<String>,
        handle: ConnectionHandle,
    ) -> Result<JoinReply, RelayError> {
        if self.is_shutting_down {
            return Err(RelayError::Draining);
        }

        let outcome = self
            .lifecycle
            .request_join(&self.meeting_id, &user_id, &name, email, password)
            .await?;

        match outcome {
            JoinOutcome::Joined {
                meeting,
                participant,
            } => {
                // A superseded handle can only be a zombie connection whose
                // cleanup never ran; drop it without a second Leave.
                if let Some(stale) = self.router.bind(user_id.clone(), handle.clone()) {
                    debug!(
                        target: "relay.actor.meeting",
                        connection_id = %stale.connection_id(),
                        "Superseded stale connection handle"
                    );
                    self.metrics.connection_unbound();
                }
                self.metrics.connection_bound();

                handle.send(ServerEvent::JoinSuccess {
                    meeting: Box::new(meeting.clone()),
                    participant: participant.clone(),
                });
                handle.send(ServerEvent::ExistingParticipants(
                    self.router.existing_participants(&meeting, &user_id),
                ));
                self.router.broadcast(
                    &ServerEvent::UserJoined {
                        user_id: user_id.clone(),
                        name,
                        participant,
                    },
                    Some(&user_id),
                );

                info!(
                    target: "relay.actor.meeting",
                    live = self.router.live_count(),
                    "Participant joined"
                );
                Ok(JoinReply::Joined)
            }

            JoinOutcome::Waiting {
                meeting,
                participant: _,
            } => {
                self.waiting.insert(user_id.clone(), handle.clone());
                handle.send(ServerEvent::WaitingRoom {
                    meeting_id: self.meeting_id.clone(),
                });
                // Only the host learns that somebody is waiting.
                self.router.relay_direct(
                    &meeting.host_id,
                    ServerEvent::UserWaiting {
                        user_id,
                        name,
                    },
                );

                info!(
                    target: "relay.actor.meeting",
                    waiting = self.waiting.len(),
                    "Participant parked in waiting room"
                );
                Ok(JoinReply::Waiting)
            }
        }
    }

    /// Handle a host admitting a waiting participant.
    #[instrument(skip_all, fields(meeting_id = %self.meeting_id, user_id = %target_user_id))]
    async fn handle_admit(
        &mut self,
        target_user_id: &str,
        requesting_user_id: &str,
    ) -> Result<(), RelayError> {
        if self.is_shutting_down {
            return Err(RelayError::Draining);
        }

        let (meeting, participant) = self
            .lifecycle
            .admit(&self.meeting_id, target_user_id, requesting_user_id)
            .await?;

        let Some(handle) = self.waiting.remove(target_user_id) else {
            // The waiting connection vanished between roster commit and now;
            // roll the roster back so no Joined entry exists without a
            // registry entry.
            let _ = self.lifecycle.leave(&self.meeting_id, target_user_id).await;
            return Err(RelayError::NotFound("Participant not found".to_string()));
        };

        self.router.bind(target_user_id.to_string(), handle.clone());
        self.metrics.connection_bound();

        handle.send(ServerEvent::Admitted {
            meeting: Box::new(meeting.clone()),
            participant: participant.clone(),
        });
        handle.send(ServerEvent::ExistingParticipants(
            self.router.existing_participants(&meeting, target_user_id),
        ));
        self.router.broadcast(
            &ServerEvent::UserJoined {
                user_id: participant.user_id.clone(),
                name: participant.name.clone(),
                participant,
            },
            Some(target_user_id),
        );

        info!(
            target: "relay.actor.meeting",
            live = self.router.live_count(),
            "Participant admitted"
        );
        Ok(())
    }

    /// Handle a connection going away.
    ///
    /// Explicit leave and transport disconnect both land here; the
    /// connection-id check makes duplicate notifications and superseded
    /// connections no-ops, so cleanup runs exactly once.
    async fn handle_connection_closed(&mut self, user_id: &str, connection_id: &str) {
        // Waiting-room departure: no broadcast, nobody ever saw them live.
        if let Some(parked) = self.waiting.get(user_id) {
            if parked.connection_id() == connection_id {
                self.waiting.remove(user_id);
                if let Err(err) = self.lifecycle.leave(&self.meeting_id, user_id).await {
                    error!(
                        target: "relay.actor.meeting",
                        meeting_id = %self.meeting_id,
                        user_id = %user_id,
                        error = %err,
                        "Failed to record waiting-room departure"
                    );
                }
            }
            return;
        }

        if !self.router.is_current(user_id, connection_id) {
            debug!(
                target: "relay.actor.meeting",
                meeting_id = %self.meeting_id,
                user_id = %user_id,
                connection_id = %connection_id,
                "Ignoring stale connection cleanup"
            );
            return;
        }

        self.router.unbind(user_id);
        self.metrics.connection_unbound();

        match self.lifecycle.leave(&self.meeting_id, user_id).await {
            Ok(LeaveOutcome::Left { ended, .. }) => {
                self.router.broadcast(
                    &ServerEvent::UserLeft {
                        user_id: user_id.to_string(),
                    },
                    None,
                );
                if ended {
                    self.is_shutting_down = true;
                    self.metrics.meeting_ended();
                }
                info!(
                    target: "relay.actor.meeting",
                    meeting_id = %self.meeting_id,
                    user_id = %user_id,
                    remaining = self.router.live_count(),
                    ended,
                    "Participant left"
                );
            }
            Ok(LeaveOutcome::AlreadyClosed | LeaveOutcome::NotFound) => {}
            Err(err) => {
                // Registry is already consistent (entry removed); the
                // durable record is the only casualty.
                error!(
                    target: "relay.actor.meeting",
                    meeting_id = %self.meeting_id,
                    user_id = %user_id,
                    error = %err,
                    "Failed to record departure"
                );
            }
        }
    }

    /// Handle the host ending the meeting for everyone.
    #[instrument(skip_all, fields(meeting_id = %self.meeting_id))]
    async fn handle_end_meeting(&mut self, requesting_user_id: &str) -> Result<(), RelayError> {
        self.lifecycle
            .end(&self.meeting_id, requesting_user_id)
            .await?;

        self.is_shutting_down = true;
        self.metrics.meeting_ended();

        let notice = ServerEvent::MeetingEnded {
            message: "Meeting ended by host".to_string(),
        };
        self.router.broadcast(&notice, None);
        for handle in self.waiting.values() {
            handle.send(notice.clone());
        }

        let cleared = self.router.clear();
        for _ in 0..cleared {
            self.metrics.connection_unbound();
        }
        self.waiting.clear();

        info!(
            target: "relay.actor.meeting",
            cleared,
            "Meeting ended by host"
        );
        Ok(())
    }

    /// Handle a media-flag toggle.
    async fn handle_media_update(&mut self, user_id: &str, toggle: MediaToggle) {
        if !self.is_live(user_id) {
            warn!(
                target: "relay.actor.meeting",
                meeting_id = %self.meeting_id,
                user_id = %user_id,
                "Media update from unregistered participant"
            );
            return;
        }

        let updated = match self
            .lifecycle
            .update_media(&self.meeting_id, user_id, toggle.as_patch())
            .await
        {
            Ok(meeting) => meeting,
            Err(err) => {
                self.report_error(user_id, &err);
                return;
            }
        };

        let event = match toggle {
            MediaToggle::Mute { is_muted } => ServerEvent::ParticipantMuted {
                user_id: user_id.to_string(),
                is_muted,
            },
            MediaToggle::Video { is_video_off } => ServerEvent::ParticipantVideoToggled {
                user_id: user_id.to_string(),
                is_video_off,
            },
            MediaToggle::Hand { is_hand_raised } => ServerEvent::HandRaised {
                user_id: user_id.to_string(),
                name: updated
                    .participant(user_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| user_id.to_string()),
                is_hand_raised,
            },
        };
        self.router.broadcast(&event, Some(user_id));
    }

    /// Handle a chat message: persist, then relay.
    async fn handle_chat(
        &mut self,
        user_id: &str,
        message: String,
        is_private: bool,
        recipient_id: Option<String>,
    ) {
        if !self.is_live(user_id) {
            warn!(
                target: "relay.actor.meeting",
                meeting_id = %self.meeting_id,
                user_id = %user_id,
                "Chat from unregistered participant"
            );
            return;
        }

        match self
            .lifecycle
            .record_chat(&self.meeting_id, user_id, message, is_private, recipient_id)
            .await
        {
            Ok(chat) => self.router.relay_chat(&chat),
            Err(err) => self.report_error(user_id, &err),
        }
    }

    /// Relay a point-to-point negotiation payload.
    fn handle_signal(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        kind: SignalKind,
        payload: serde_json::Value,
    ) {
        if !self.is_live(from_user_id) {
            warn!(
                target: "relay.actor.meeting",
                meeting_id = %self.meeting_id,
                user_id = %from_user_id,
                "Signaling message from unregistered participant"
            );
            return;
        }

        let from = from_user_id.to_string();
        let event = match kind {
            SignalKind::Offer => ServerEvent::Offer { from, payload },
            SignalKind::Answer => ServerEvent::Answer { from, payload },
            SignalKind::IceCandidate => ServerEvent::IceCandidate { from, payload },
        };
        // Absent target: silent drop, the peer may already be gone.
        self.router.relay_direct(to_user_id, event);
    }

    /// Broadcast screen-share start/stop.
    fn handle_screen_share(&self, user_id: &str, active: bool) {
        if !self.is_live(user_id) {
            return;
        }
        let event = if active {
            ServerEvent::ScreenShareStarted {
                user_id: user_id.to_string(),
            }
        } else {
            ServerEvent::ScreenShareStopped {
                user_id: user_id.to_string(),
            }
        };
        self.router.broadcast(&event, Some(user_id));
    }

    /// Build a live snapshot.
    fn snapshot(&self) -> MeetingSnapshot {
        MeetingSnapshot {
            meeting_id: self.meeting_id.clone(),
            live_participants: self.router.live_user_ids(),
            waiting_participants: self.waiting.keys().cloned().collect(),
            is_shutting_down: self.is_shutting_down,
        }
    }

    fn is_live(&self, user_id: &str) -> bool {
        self.router.is_live(user_id)
    }

    /// Report a fault only to the connection whose event triggered it.
    fn report_error(&self, user_id: &str, err: &RelayError) {
        error!(
            target: "relay.actor.meeting",
            meeting_id = %self.meeting_id,
            user_id = %user_id,
            error = %err,
            "Command failed"
        );
        self.router.relay_direct(
            user_id,
            ServerEvent::Error {
                message: err.client_message(),
            },
        );
    }

    /// Drop all live state on relay shutdown. Durable records are left
    /// as-is: a restart is equivalent to every participant disconnecting.
    fn graceful_shutdown(&mut self) {
        let notice = ServerEvent::MeetingEnded {
            message: "Server is shutting down".to_string(),
        };
        self.router.broadcast(&notice, None);
        for handle in self.waiting.values() {
            handle.send(notice.clone());
        }

        let cleared = self.router.clear();
        for _ in 0..cleared {
            self.metrics.connection_unbound();
        }
        self.waiting.clear();
        self.is_shutting_down = true;
    }
}
