//! `RelaySupervisor` - singleton supervisor for meeting actors.
//!
//! The supervisor is the top-level actor of the relay:
//!
//! - Owns the meeting_id -> `MeetingActorHandle` map and spawns a
//!   `MeetingActor` on first demand
//! - Never performs store I/O in its own turn, so unrelated meetings are
//!   never serialized against each other
//! - Applies load shedding against the configured meeting cap
//! - Owns the root `CancellationToken` for graceful shutdown
//!
//! A meeting actor that drains (last connection gone) reports back with
//! `MeetingFinished` and its entry is dropped; the meeting key disappears
//! when its last registration does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::meeting::{MeetingActor, MeetingActorHandle};
use super::messages::{SupervisorMessage, SupervisorStatus};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::errors::RelayError;
use crate::lifecycle::MeetingLifecycle;

/// Default channel buffer size for the supervisor mailbox.
const SUPERVISOR_CHANNEL_BUFFER: usize = 1024;

/// Per-meeting drain timeout during shutdown.
const MEETING_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the `RelaySupervisor`.
///
/// This is the public interface of the actor system: connection drivers and
/// the HTTP API resolve meeting actors through it.
#[derive(Clone)]
pub struct RelaySupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
    cancel_token: CancellationToken,
}

impl RelaySupervisorHandle {
    /// Spawn the supervisor and return a handle to it.
    #[must_use]
    pub fn new(
        lifecycle: MeetingLifecycle,
        metrics: Arc<ActorMetrics>,
        max_meetings: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(SUPERVISOR_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RelaySupervisor {
            receiver,
            self_sender: sender.clone(),
            cancel_token: cancel_token.clone(),
            meetings: HashMap::new(),
            accepting_new: true,
            lifecycle,
            metrics,
            max_meetings,
            mailbox: MailboxMonitor::new(ActorType::Supervisor, "relay"),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Resolve (or spawn) the actor owning the given meeting.
    pub async fn meeting_handle(
        &self,
        meeting_id: String,
    ) -> Result<MeetingActorHandle, RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(SupervisorMessage::GetOrSpawn {
                meeting_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current supervisor status.
    pub async fn status(&self) -> Result<SupervisorStatus, RelayError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(SupervisorMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RelayError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor system (graceful shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor system is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Internal state for a managed meeting.
struct ManagedMeeting {
    /// Handle to the meeting actor.
    handle: MeetingActorHandle,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
}

/// The `RelaySupervisor` implementation.
struct RelaySupervisor {
    /// Message receiver.
    receiver: mpsc::Receiver<SupervisorMessage>,
    /// Clone of our own sender, handed to meeting actors for finish
    /// notifications.
    self_sender: mpsc::Sender<SupervisorMessage>,
    /// Root cancellation token.
    cancel_token: CancellationToken,
    /// Managed meetings by ID.
    meetings: HashMap<String, ManagedMeeting>,
    /// Whether new meetings are being accepted.
    accepting_new: bool,
    /// Shared lifecycle manager handed to every meeting actor.
    lifecycle: MeetingLifecycle,
    /// Shared metrics.
    metrics: Arc<ActorMetrics>,
    /// Load-shedding cap on live meetings.
    max_meetings: usize,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RelaySupervisor {
    /// Run the actor message loop.
    #[instrument(skip_all, name = "relay.actor.supervisor")]
    async fn run(mut self) {
        info!(
            target: "relay.actor.supervisor",
            max_meetings = self.max_meetings,
            "RelaySupervisor started"
        );

        loop {
            self.reap_finished_meetings();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "relay.actor.supervisor",
                        "RelaySupervisor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "relay.actor.supervisor",
                                "RelaySupervisor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "relay.actor.supervisor",
            meetings_remaining = self.meetings.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RelaySupervisor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: SupervisorMessage) {
        match message {
            SupervisorMessage::GetOrSpawn {
                meeting_id,
                respond_to,
            } => {
                let result = self.get_or_spawn(meeting_id);
                let _ = respond_to.send(result);
            }

            SupervisorMessage::MeetingFinished { meeting_id } => {
                if let Some(managed) = self.meetings.remove(&meeting_id) {
                    debug!(
                        target: "relay.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Meeting actor finished"
                    );
                    let _ =
                        tokio::time::timeout(Duration::from_millis(100), managed.task_handle).await;
                }
            }

            SupervisorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(SupervisorStatus {
                    meeting_count: self.meetings.len(),
                    connection_count: self.metrics.live_connections(),
                    is_draining: !self.accepting_new,
                });
            }
        }
    }

    /// Resolve an existing meeting actor or spawn a fresh one.
    ///
    /// No store I/O happens here: a meeting that turns out not to exist is
    /// discovered by the meeting actor itself, which then drains right away.
    fn get_or_spawn(&mut self, meeting_id: String) -> Result<MeetingActorHandle, RelayError> {
        if !self.accepting_new {
            return Err(RelayError::Draining);
        }

        let stale = match self.meetings.get(&meeting_id) {
            Some(managed) if !managed.handle.is_closed() => {
                return Ok(managed.handle.clone());
            }
            // Stale entry from an actor that stopped without the finish
            // notification being processed yet.
            Some(_) => true,
            None => false,
        };
        if stale {
            self.meetings.remove(&meeting_id);
        }

        if self.meetings.len() >= self.max_meetings {
            warn!(
                target: "relay.actor.supervisor",
                meeting_id = %meeting_id,
                live_meetings = self.meetings.len(),
                "Meeting cap reached, shedding join"
            );
            return Err(RelayError::CapacityExceeded(
                "Server is at meeting capacity".to_string(),
            ));
        }

        let (handle, task_handle) = MeetingActor::spawn(
            meeting_id.clone(),
            self.lifecycle.clone(),
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
            self.self_sender.clone(),
        );
        self.metrics.meeting_started();

        debug!(
            target: "relay.actor.supervisor",
            meeting_id = %meeting_id,
            live_meetings = self.meetings.len() + 1,
            "Spawned meeting actor"
        );

        self.meetings.insert(
            meeting_id,
            ManagedMeeting {
                handle: handle.clone(),
                task_handle,
            },
        );
        Ok(handle)
    }

    /// Drop entries whose actor task already terminated (panic safety net;
    /// the normal path is the `MeetingFinished` notification).
    fn reap_finished_meetings(&mut self) {
        let finished: Vec<String> = self
            .meetings
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for meeting_id in finished {
            if let Some(managed) = self.meetings.remove(&meeting_id) {
                if managed.handle.is_closed() {
                    debug!(
                        target: "relay.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Reaped finished meeting actor"
                    );
                } else {
                    warn!(
                        target: "relay.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Meeting actor terminated unexpectedly"
                    );
                }
            }
        }
    }

    /// Perform graceful shutdown: cancellation has already propagated to
    /// every meeting actor through child tokens; wait for them to drain.
    async fn graceful_shutdown(&mut self) {
        self.accepting_new = false;

        info!(
            target: "relay.actor.supervisor",
            meetings = self.meetings.len(),
            "Draining meeting actors"
        );

        for (meeting_id, managed) in self.meetings.drain() {
            match tokio::time::timeout(MEETING_DRAIN_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "relay.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Meeting actor drained"
                    );
                }
                Ok(Err(join_error)) => {
                    warn!(
                        target: "relay.actor.supervisor",
                        meeting_id = %meeting_id,
                        error = ?join_error,
                        "Meeting actor task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "relay.actor.supervisor",
                        meeting_id = %meeting_id,
                        "Meeting actor drain timed out"
                    );
                }
            }
        }

        info!(
            target: "relay.actor.supervisor",
            "Graceful shutdown complete"
        );
    }
}
