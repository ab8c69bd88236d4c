//! Meeting Relay
//!
//! Stateful WebSocket signaling server for real-time meetings.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize the in-memory meeting store and lifecycle manager
//! 3. Spawn the actor system (`RelaySupervisorHandle`)
//! 4. Serve the WebSocket endpoint, meetings API and health probes
//! 5. On SIGTERM/ctrl-c: stop accepting, drain meeting actors, exit
//!
//! Live-connection state is process-local by design: a restart is
//! equivalent to every participant disconnecting.

use std::sync::Arc;
use std::time::Duration;

use meeting_relay::actors::{ActorMetrics, RelaySupervisorHandle};
use meeting_relay::config::Config;
use meeting_relay::lifecycle::MeetingLifecycle;
use meeting_relay::observability::HealthState;
use meeting_relay::store::MemoryStore;
use meeting_relay::{app, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meeting_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Meeting Relay");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        region = %config.region,
        bind_address = %config.bind_address,
        max_meetings = config.max_meetings,
        shutdown_grace_seconds = config.shutdown_grace_seconds,
        "Configuration loaded successfully"
    );

    // Durable meeting documents; in-memory behind the store contract.
    let store = Arc::new(MemoryStore::new());
    let lifecycle = MeetingLifecycle::new(store);

    // Actor system
    info!("Initializing actor system...");
    let metrics = ActorMetrics::new();
    let supervisor =
        RelaySupervisorHandle::new(lifecycle.clone(), Arc::clone(&metrics), config.max_meetings);

    let health = Arc::new(HealthState::new());
    let state = AppState {
        supervisor: supervisor.clone(),
        lifecycle,
        health: Arc::clone(&health),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    health.set_ready();
    info!(bind_address = %config.bind_address, "Meeting Relay listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop routing new traffic, then drain the actor system.
    info!("Shutting down");
    health.set_not_ready();
    supervisor.cancel();
    tokio::time::sleep(Duration::from_secs(config.shutdown_grace_seconds)).await;

    info!("Meeting Relay stopped");
    Ok(())
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
