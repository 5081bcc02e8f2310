//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints except `/health` are mounted under `/api/v1`.

pub mod docs;
pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
    };

    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::domain::{ChannelId, ConnectionId, InMemoryMembershipStore, UserId};

    fn state() -> AppState {
        AppState::new(
            &GatewayConfig::default(),
            Arc::new(InMemoryMembershipStore::new()),
        )
    }

    async fn call(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let app = build_router().with_state(state);
        let Ok(response) = app.oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        let Ok(req) = Request::get(uri).body(Body::empty()) else {
            panic!("bad request");
        };
        req
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        let Ok(req) = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("bad request");
        };
        req
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let state = state();
        state
            .realtime
            .connect(UserId::new(), ConnectionId::new())
            .await;

        let (status, body) = call(state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["online_users"], 1);
        assert_eq!(body["connections"], 1);
    }

    #[tokio::test]
    async fn online_lookup() {
        let state = state();
        let user = UserId::new();
        state.realtime.connect(user, ConnectionId::new()).await;

        let (status, body) = call(state, get(&format!("/api/v1/users/{user}/online"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["online"], true);
        assert_eq!(body["connection_count"], 1);
    }

    #[tokio::test]
    async fn batch_online_keeps_order() {
        let state = state();
        let online = UserId::new();
        let offline = UserId::new();
        state.realtime.connect(online, ConnectionId::new()).await;

        let body = serde_json::json!({ "user_ids": [offline, online] });
        let (status, body) = call(state, post_json("/api/v1/users/online", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["online_count"], 1);
        assert_eq!(body["users"][0]["online"], false);
        assert_eq!(body["users"][1]["online"], true);
    }

    #[tokio::test]
    async fn batch_online_rejects_empty() {
        let body = serde_json::json!({ "user_ids": [] });
        let (status, body) = call(state(), post_json("/api/v1/users/online", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1001);
    }

    #[tokio::test]
    async fn typing_queries() {
        let state = state();
        let user = UserId::new();
        let channel = ChannelId::new();
        let _ = state.realtime.start_typing(channel, user).await;

        let (_, typing) = call(state.clone(), get(&format!("/api/v1/channels/{channel}/typing"))).await;
        assert_eq!(typing["user_ids"][0], user.to_string());

        let (_, limited) = call(state, get(&format!("/api/v1/users/{user}/rate-limited"))).await;
        assert_eq!(limited["rate_limited"], true);
    }

    #[tokio::test]
    async fn direct_typing_query() {
        let state = state();
        let user = UserId::new();
        let recipient = UserId::new();
        let _ = state.realtime.start_direct_typing(user, recipient).await;

        let (_, body) = call(
            state.clone(),
            get(&format!("/api/v1/users/{user}/typing/{recipient}")),
        )
        .await;
        assert_eq!(body["typing"], true);

        let (_, reverse) = call(state, get(&format!("/api/v1/users/{recipient}/typing/{user}"))).await;
        assert_eq!(reverse["typing"], false);
    }

    #[tokio::test]
    async fn publish_accepts_valid_event() {
        let event = serde_json::json!({
            "event_type": "server_updated",
            "server_id": uuid::Uuid::new_v4(),
            "timestamp": chrono::Utc::now(),
        });
        let (status, body) = call(state(), post_json("/api/v1/events", &event)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["event_type"], "server_updated");
        assert_eq!(body["dispatched"], false);
    }

    #[tokio::test]
    async fn publish_rejects_invalid_event() {
        let event = serde_json::json!({
            "event_type": "server_updated",
            "server_id": uuid::Uuid::nil(),
            "timestamp": chrono::Utc::now(),
        });
        let (status, body) = call(state(), post_json("/api/v1/events", &event)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], 1002);
    }
}
