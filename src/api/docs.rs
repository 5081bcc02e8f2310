//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    BatchOnlineRequest, BatchOnlineResponse, DirectTypingResponse, OnlineStatusDto,
    PublishResponse, RateLimitResponse, TypingUsersResponse,
};
use crate::api::handlers::system::HealthResponse;
use crate::error::{ErrorBody, ErrorResponse};

/// Courier gateway OpenAPI documentation.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Courier Gateway API",
        description = "Real-time presence, typing and event fanout.

Live events are delivered over the `/ws` WebSocket; this API answers
point-in-time queries and accepts events from other services.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        // Presence
        crate::api::handlers::presence::get_online,
        crate::api::handlers::presence::batch_online,
        // Typing
        crate::api::handlers::presence::channel_typing,
        crate::api::handlers::presence::direct_typing,
        crate::api::handlers::presence::rate_limited,
        // Events
        crate::api::handlers::events::publish_event,
        // System
        crate::api::handlers::system::health_handler,
    ),
    components(schemas(
        OnlineStatusDto,
        BatchOnlineRequest,
        BatchOnlineResponse,
        TypingUsersResponse,
        DirectTypingResponse,
        RateLimitResponse,
        PublishResponse,
        HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Presence", description = "Online status"),
        (name = "Typing", description = "Typing indicators"),
        (name = "Events", description = "Domain event ingestion"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;
