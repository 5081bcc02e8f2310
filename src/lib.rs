//! # courier-gateway
//!
//! Real-time fanout gateway for a chat platform.
//!
//! Domain services own persistence; once they commit a change they
//! publish a [`domain::DomainEvent`] here. The gateway keeps only
//! process-local live state (who is connected, who is typing) and turns
//! transport-bound events into WebSocket sends.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + ConnectionHub (ws/)
//!     │
//!     ├── RealtimeService (service/)
//!     ├── EventBus (domain/) ──► EventDispatcher (dispatch/) ──► Transport
//!     │
//!     ├── ConnectionRegistry, TypingRegistry (domain/)
//!     │
//!     └── MembershipStore: PostgreSQL (persistence/) or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the full HTTP application: REST API, `/ws` upgrade and layers.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws::handler::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
