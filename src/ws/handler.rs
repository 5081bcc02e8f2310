//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::GatewayError;

/// Query parameters of the upgrade request.
///
/// Authentication happens upstream; the gateway trusts the user id it is
/// handed.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    /// Authenticated user opening the socket.
    pub user_id: UserId,
}

/// `GET /ws?user_id=…`: Upgrade HTTP connection to WebSocket.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a nil user id.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectParams>,
    State(state): State<AppState>,
) -> Result<Response, GatewayError> {
    if params.user_id.is_nil() {
        return Err(GatewayError::InvalidRequest("user_id must not be nil".to_string()));
    }
    let user_id = params.user_id;
    Ok(ws.on_upgrade(move |socket| run_connection(socket, user_id, state)))
}
