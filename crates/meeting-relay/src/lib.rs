//! Meeting Relay Service Library
//!
//! Core functionality for the Meeting Relay - a stateful WebSocket
//! signaling server responsible for:
//!
//! - The meeting session state machine (join eligibility, roles,
//!   waiting-room admission, capacity, auto-ending)
//! - The authoritative live-connection registry per meeting
//! - Routing negotiation and control messages between exactly the right
//!   set of live connections
//!
//! The relay carries negotiation metadata only - never audio/video bytes.
//!
//! # Architecture
//!
//! ```text
//! RelaySupervisor (singleton)
//! └── MeetingActor (one per live meeting)
//!     ├── MeetingLifecycle  -> MeetingStore (durable documents)
//!     ├── SignalingRouter   -> SessionRegistry (live handles)
//!     └── waiting room map
//! ConnectionDriver (one per WebSocket, Unbound -> Waiting/Bound -> Closed)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - supervisor and per-meeting actors
//! - [`api`] - meetings HTTP API
//! - [`config`] - service configuration from environment
//! - [`connection`] - per-connection state machine
//! - [`errors`] - error taxonomy with wire/HTTP mappings
//! - [`lifecycle`] - the meeting state machine over the store
//! - [`observability`] - health probes
//! - [`registry`] - per-meeting session registry
//! - [`router`] - signaling fan-out
//! - [`store`] - durable store contract + in-memory implementation
//! - [`ws`] - WebSocket transport loop

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

pub mod actors;
pub mod api;
pub mod config;
pub mod connection;
pub mod errors;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod router;
pub mod store;
pub mod ws;

use actors::RelaySupervisorHandle;
use lifecycle::MeetingLifecycle;
use observability::HealthState;

/// Shared state handed to every HTTP/WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: RelaySupervisorHandle,
    pub lifecycle: MeetingLifecycle,
    pub health: Arc<HealthState>,
}

/// Build the full application router: signaling WebSocket, meetings API and
/// health probes.
#[must_use]
pub fn app(state: AppState) -> Router {
    let health = Arc::clone(&state.health);
    Router::new()
        .route("/ws", axum::routing::get(ws::ws_connect))
        .with_state(state.clone())
        .merge(api::api_router(state))
        .merge(observability::health_router(health))
        .layer(TraceLayer::new_for_http())
}
