//! Event ingestion for other services.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::PublishResponse;
use crate::app_state::AppState;
use crate::domain::DomainEvent;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events`: Publish a committed domain event.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidEvent`] if the event fails validation.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Publish a domain event",
    description = "Validates the event and publishes it to local handlers and, for transport-bound kinds, to connected clients. The body is a domain event tagged by `event_type`.",
    request_body(content = serde_json::Value, description = "Domain event tagged by `event_type`"),
    responses(
        (status = 202, description = "Event accepted", body = PublishResponse),
        (status = 400, description = "Malformed event", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> Result<impl IntoResponse, GatewayError> {
    let event_type = event.event_type_str();
    let report = state.realtime.publish(event).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(PublishResponse::new(event_type, report)),
    ))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
