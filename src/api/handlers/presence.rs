//! Presence and typing queries: online status, typing users, cooldowns.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{
    BatchOnlineRequest, BatchOnlineResponse, DirectTypingResponse, OnlineStatusDto,
    RateLimitResponse, TypingUsersResponse,
};
use crate::app_state::AppState;
use crate::domain::{ChannelId, UserId};
use crate::error::{ErrorResponse, GatewayError};

fn online_status(state: &AppState, user_id: UserId) -> OnlineStatusDto {
    let connection_count = state.realtime.connections().get_connections(user_id).len();
    OnlineStatusDto {
        user_id: *user_id.as_uuid(),
        online: connection_count > 0,
        connection_count,
    }
}

/// `GET /users/{id}/online`: Online status of one user.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/online",
    tag = "Presence",
    summary = "Is a user online",
    description = "A user is online while at least one connection is open.",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Online status", body = OnlineStatusDto),
    )
)]
pub async fn get_online(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    Json(online_status(&state, UserId::from_uuid(id)))
}

/// `POST /users/online`: Online status of many users.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an empty id list.
#[utoipa::path(
    post,
    path = "/api/v1/users/online",
    tag = "Presence",
    summary = "Batch online lookup",
    description = "Returns one online status per requested user, in request order.",
    request_body = BatchOnlineRequest,
    responses(
        (status = 200, description = "Online statuses", body = BatchOnlineResponse),
        (status = 400, description = "Empty request", body = ErrorResponse),
    )
)]
pub async fn batch_online(
    State(state): State<AppState>,
    Json(req): Json<BatchOnlineRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    if req.user_ids.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "user_ids must not be empty".to_string(),
        ));
    }

    let users: Vec<OnlineStatusDto> = req
        .user_ids
        .into_iter()
        .map(|id| online_status(&state, UserId::from_uuid(id)))
        .collect();
    let online_count = users.iter().filter(|u| u.online).count();

    Ok(Json(BatchOnlineResponse {
        users,
        online_count,
    }))
}

/// `GET /channels/{id}/typing`: Users typing in a channel.
#[utoipa::path(
    get,
    path = "/api/v1/channels/{id}/typing",
    tag = "Typing",
    summary = "Users typing in a channel",
    description = "Users whose typing signal in the channel has not expired.",
    params(("id" = Uuid, Path, description = "Channel ID")),
    responses(
        (status = 200, description = "Typing users", body = TypingUsersResponse),
    )
)]
pub async fn channel_typing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let channel_id = ChannelId::from_uuid(id);
    let user_ids = state
        .realtime
        .typing_users(channel_id)
        .into_iter()
        .map(|u| *u.as_uuid())
        .collect();
    Json(TypingUsersResponse {
        channel_id: id,
        user_ids,
    })
}

/// `GET /users/{id}/typing/{recipient_id}`: Direct typing state.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/typing/{recipient_id}",
    tag = "Typing",
    summary = "Is a user typing to another",
    params(
        ("id" = Uuid, Path, description = "Typing user ID"),
        ("recipient_id" = Uuid, Path, description = "Recipient user ID"),
    ),
    responses(
        (status = 200, description = "Direct typing state", body = DirectTypingResponse),
    )
)]
pub async fn direct_typing(
    State(state): State<AppState>,
    Path((id, recipient_id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let typing = state
        .realtime
        .typing()
        .is_user_typing(UserId::from_uuid(id), UserId::from_uuid(recipient_id));
    Json(DirectTypingResponse {
        user_id: id,
        recipient_id,
        typing,
    })
}

/// `GET /users/{id}/rate-limited`: Typing cooldown state.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/rate-limited",
    tag = "Typing",
    summary = "Is a user inside the typing cooldown",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Cooldown state", body = RateLimitResponse),
    )
)]
pub async fn rate_limited(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let rate_limited = state
        .realtime
        .typing()
        .is_rate_limited(UserId::from_uuid(id));
    Json(RateLimitResponse {
        user_id: id,
        rate_limited,
    })
}

/// Presence and typing routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/online", post(batch_online))
        .route("/users/{id}/online", get(get_online))
        .route("/users/{id}/typing/{recipient_id}", get(direct_typing))
        .route("/users/{id}/rate-limited", get(rate_limited))
        .route("/channels/{id}/typing", get(channel_typing))
}
