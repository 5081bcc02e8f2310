//! Presence and typing query DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Online status of a single user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnlineStatusDto {
    /// User ID.
    pub user_id: Uuid,
    /// At least one connection is open.
    pub online: bool,
    /// Number of open connections.
    pub connection_count: usize,
}

/// Request body for `POST /users/online`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchOnlineRequest {
    /// Users to look up. Duplicates are answered once each.
    pub user_ids: Vec<Uuid>,
}

/// Response body for `POST /users/online`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchOnlineResponse {
    /// One entry per requested user, in request order.
    pub users: Vec<OnlineStatusDto>,
    /// How many of the requested users are online.
    pub online_count: usize,
}

/// Users currently typing in a channel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TypingUsersResponse {
    /// Channel ID.
    pub channel_id: Uuid,
    /// Users with a live typing signal, in no particular order.
    pub user_ids: Vec<Uuid>,
}

/// Whether one user is typing to another.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DirectTypingResponse {
    /// Typing user.
    pub user_id: Uuid,
    /// User being written to.
    pub recipient_id: Uuid,
    /// The signal is still live.
    pub typing: bool,
}

/// Typing cooldown state of a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RateLimitResponse {
    /// User ID.
    pub user_id: Uuid,
    /// Another typing signal now would be dropped.
    pub rate_limited: bool,
}
