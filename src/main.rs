//! courier-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use courier_gateway::app_state::AppState;
use courier_gateway::build_app;
use courier_gateway::config::{GatewayConfig, LogFormat};
use courier_gateway::domain::{InMemoryMembershipStore, MembershipStore, TypingRegistry};
use courier_gateway::persistence::PostgresMembershipStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, policy = %config.message_notify_policy, "starting courier-gateway");

    // Membership source
    let membership: Arc<dyn MembershipStore> = if config.persistence_enabled {
        let store = PostgresMembershipStore::connect(&config).await?;
        store.migrate().await?;
        tracing::info!("membership backed by postgres");
        Arc::new(store)
    } else {
        tracing::warn!("persistence disabled; membership is in-memory and empty");
        Arc::new(InMemoryMembershipStore::new())
    };

    // Build application state
    let app_state = AppState::new(&config, membership);

    if let Some(period) = config.typing_sweep_interval() {
        spawn_typing_sweep(Arc::clone(app_state.realtime.typing()), period);
    }

    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops expired typing entries.
fn spawn_typing_sweep(typing: Arc<TypingRegistry>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = typing.sweep_stale();
            if removed > 0 {
                tracing::debug!(removed, "stale typing entries swept");
            }
        }
    });
}
