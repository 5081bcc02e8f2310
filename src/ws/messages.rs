//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChannelId, PresenceStatus, UserId};

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server message stamped with the current time.
    #[must_use]
    pub fn server(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error reply carrying `code` and `message`.
    #[must_use]
    pub fn error(id: String, code: u32, message: impl Into<String>) -> Self {
        Self::server(
            id,
            WsMessageType::Error,
            serde_json::json!({
                "code": code,
                "message": message.into(),
            }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket.
///
/// Carried in the `payload` of a [`WsMessageType::Command`] envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Start receiving live events for a channel.
    JoinChannel {
        /// Channel to join.
        channel_id: ChannelId,
    },
    /// Stop receiving live events for a channel.
    LeaveChannel {
        /// Channel to leave.
        channel_id: ChannelId,
    },
    /// The user started typing in a channel.
    StartTyping {
        /// Channel being typed in.
        channel_id: ChannelId,
    },
    /// The user stopped typing in a channel.
    StopTyping {
        /// Channel that was typed in.
        channel_id: ChannelId,
    },
    /// The user started typing to another user.
    StartDirectTyping {
        /// User being written to.
        recipient_id: UserId,
    },
    /// The user changed their presence status.
    SetPresence {
        /// New status.
        status: PresenceStatus,
    },
    /// Liveness probe.
    Ping,
}
