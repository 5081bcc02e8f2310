//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection:
//! commands from the client are executed against the realtime service,
//! and frames queued on the hub are written back to the socket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;

use super::hub::ConnectionHub;
use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::app_state::AppState;
use crate::domain::{ConnectionId, UserId};
use crate::error::GatewayError;
use crate::service::{RealtimeService, TypingOutcome};

/// Runs the read/write loop for a single WebSocket connection.
///
/// The connection is registered on the hub and with the realtime service
/// before the loop starts, and fully released when it ends.
pub async fn run_connection(socket: WebSocket, user_id: UserId, state: AppState) {
    let connection_id = ConnectionId::new();
    let mut outbound = state.hub.register(connection_id);
    let mut session = Session::new(
        user_id,
        connection_id,
        Arc::clone(&state.realtime),
        Arc::clone(&state.hub),
    );
    state.realtime.connect(user_id, connection_id).await;
    tracing::debug!(%user_id, %connection_id, "ws connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = session.handle_text_message(&text).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            // Frame queued by the dispatcher
            frame = outbound.recv() => {
                match frame {
                    Some(json) => {
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    session.close().await;
    tracing::debug!(%user_id, %connection_id, "ws connection closed");
}

/// Command state of one authenticated socket.
#[derive(Debug)]
pub struct Session {
    user_id: UserId,
    connection_id: ConnectionId,
    realtime: Arc<RealtimeService>,
    hub: Arc<ConnectionHub>,
    subs: SubscriptionManager,
}

impl Session {
    /// Creates a session for `connection_id` owned by `user_id`.
    #[must_use]
    pub fn new(
        user_id: UserId,
        connection_id: ConnectionId,
        realtime: Arc<RealtimeService>,
        hub: Arc<ConnectionHub>,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            realtime,
            hub,
            subs: SubscriptionManager::new(),
        }
    }

    /// Channels this session has joined.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subs
    }

    /// Handles a text frame from the client, returning the JSON reply.
    pub async fn handle_text_message(&mut self, text: &str) -> Option<String> {
        let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
            let err = WsMessage::error(String::new(), 400, "malformed JSON");
            return serde_json::to_string(&err).ok();
        };

        let reply = match serde_json::from_value::<WsCommand>(msg.payload) {
            Ok(command) => match self.execute(command).await {
                Ok(payload) => WsMessage::server(msg.id, WsMessageType::Response, payload),
                Err(e) => {
                    tracing::debug!(user_id = %self.user_id, error = %e, "ws command failed");
                    WsMessage::error(msg.id, e.error_code(), e.to_string())
                }
            },
            Err(e) => WsMessage::error(msg.id, 404, format!("unknown command: {e}")),
        };
        serde_json::to_string(&reply).ok()
    }

    async fn execute(&mut self, command: WsCommand) -> Result<serde_json::Value, GatewayError> {
        match command {
            WsCommand::JoinChannel { channel_id } => {
                self.realtime.join_channel(self.user_id, channel_id).await?;
                self.hub
                    .join_group(&channel_id.group_name(), self.connection_id);
                let newly_joined = self.subs.join(channel_id);
                Ok(json!({ "joined": channel_id, "already_joined": !newly_joined }))
            }
            WsCommand::LeaveChannel { channel_id } => {
                self.hub
                    .leave_group(&channel_id.group_name(), self.connection_id);
                let was_joined = self.subs.leave(channel_id);
                Ok(json!({ "left": channel_id, "was_joined": was_joined }))
            }
            WsCommand::StartTyping { channel_id } => {
                let outcome = self.realtime.start_typing(channel_id, self.user_id).await?;
                Ok(json!({ "typing": channel_id, "throttled": outcome == TypingOutcome::Throttled }))
            }
            WsCommand::StopTyping { channel_id } => {
                self.realtime.stop_typing(channel_id, self.user_id).await?;
                Ok(json!({ "stopped": channel_id }))
            }
            WsCommand::StartDirectTyping { recipient_id } => {
                let outcome = self
                    .realtime
                    .start_direct_typing(self.user_id, recipient_id)
                    .await?;
                Ok(json!({ "typing_to": recipient_id, "throttled": outcome == TypingOutcome::Throttled }))
            }
            WsCommand::SetPresence { status } => {
                self.realtime.set_presence(self.user_id, status).await?;
                Ok(json!({ "status": status }))
            }
            WsCommand::Ping => Ok(json!({ "pong": true })),
        }
    }

    /// Leaves every joined group and releases the connection.
    pub async fn close(mut self) {
        for channel_id in self.subs.drain() {
            self.hub
                .leave_group(&channel_id.group_name(), self.connection_id);
        }
        self.hub.unregister(self.connection_id);
        self.realtime
            .disconnect(self.user_id, self.connection_id)
            .await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::dispatch::Transport;
    use crate::domain::{ChannelId, InMemoryMembershipStore};

    struct Fixture {
        state: AppState,
        membership: Arc<InMemoryMembershipStore>,
    }

    fn fixture() -> Fixture {
        let membership = Arc::new(InMemoryMembershipStore::new());
        let state = AppState::new(
            &GatewayConfig::default(),
            Arc::<InMemoryMembershipStore>::clone(&membership),
        );
        Fixture { state, membership }
    }

    async fn open(state: &AppState, user_id: UserId) -> Session {
        let connection_id = ConnectionId::new();
        state.realtime.connect(user_id, connection_id).await;
        Session::new(
            user_id,
            connection_id,
            Arc::clone(&state.realtime),
            Arc::clone(&state.hub),
        )
    }

    fn command(payload: serde_json::Value) -> String {
        json!({
            "id": "req-1",
            "type": "command",
            "timestamp": chrono::Utc::now(),
            "payload": payload,
        })
        .to_string()
    }

    async fn reply(session: &mut Session, payload: serde_json::Value) -> WsMessage {
        let Some(text) = session.handle_text_message(&command(payload)).await else {
            panic!("no reply");
        };
        let Ok(msg) = serde_json::from_str::<WsMessage>(&text) else {
            panic!("reply is not a WsMessage: {text}");
        };
        msg
    }

    #[tokio::test]
    async fn malformed_json_gets_error() {
        let f = fixture();
        let mut session = open(&f.state, UserId::new()).await;
        let Some(text) = session.handle_text_message("{not json").await else {
            panic!("no reply");
        };
        assert!(text.contains("malformed JSON"));
    }

    #[tokio::test]
    async fn unknown_command_gets_404() {
        let f = fixture();
        let mut session = open(&f.state, UserId::new()).await;
        let msg = reply(&mut session, json!({ "command": "swap" })).await;
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.id, "req-1");
        assert_eq!(msg.payload["code"], 404);
    }

    #[tokio::test]
    async fn ping_pongs() {
        let f = fixture();
        let mut session = open(&f.state, UserId::new()).await;
        let msg = reply(&mut session, json!({ "command": "ping" })).await;
        assert_eq!(msg.msg_type, WsMessageType::Response);
        assert_eq!(msg.payload["pong"], true);
    }

    #[tokio::test]
    async fn join_requires_membership() {
        let f = fixture();
        let user = UserId::new();
        let channel = ChannelId::new();
        let mut session = open(&f.state, user).await;

        let msg = reply(&mut session, json!({ "command": "join_channel", "channel_id": channel })).await;
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload["code"], 2001);
        assert!(f.state.hub.group_connections(&channel.group_name()).await.is_empty());
    }

    #[tokio::test]
    async fn join_and_leave_update_group() {
        let f = fixture();
        let user = UserId::new();
        let channel = ChannelId::new();
        f.membership.add_member(channel, user);
        let mut session = open(&f.state, user).await;

        let msg = reply(&mut session, json!({ "command": "join_channel", "channel_id": channel })).await;
        assert_eq!(msg.msg_type, WsMessageType::Response);
        assert_eq!(msg.payload["already_joined"], false);
        assert_eq!(f.state.hub.group_connections(&channel.group_name()).await.len(), 1);
        assert!(session.subscriptions().is_joined(channel));

        let msg = reply(&mut session, json!({ "command": "leave_channel", "channel_id": channel })).await;
        assert_eq!(msg.payload["was_joined"], true);
        assert!(f.state.hub.group_connections(&channel.group_name()).await.is_empty());
    }

    #[tokio::test]
    async fn second_typing_signal_is_throttled() {
        let f = fixture();
        let user = UserId::new();
        let channel = ChannelId::new();
        let mut session = open(&f.state, user).await;

        let first = reply(&mut session, json!({ "command": "start_typing", "channel_id": channel })).await;
        assert_eq!(first.payload["throttled"], false);
        let second = reply(&mut session, json!({ "command": "start_typing", "channel_id": channel })).await;
        assert_eq!(second.payload["throttled"], true);
        assert_eq!(f.state.realtime.typing_users(channel), vec![user]);

        let stopped = reply(&mut session, json!({ "command": "stop_typing", "channel_id": channel })).await;
        assert_eq!(stopped.msg_type, WsMessageType::Response);
        assert!(f.state.realtime.typing_users(channel).is_empty());
    }

    #[tokio::test]
    async fn direct_typing_to_self_is_rejected() {
        let f = fixture();
        let user = UserId::new();
        let mut session = open(&f.state, user).await;

        let msg = reply(
            &mut session,
            json!({ "command": "start_direct_typing", "recipient_id": user }),
        )
        .await;
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload["code"], 1002);
    }

    #[tokio::test]
    async fn close_releases_everything() {
        let f = fixture();
        let user = UserId::new();
        let channel = ChannelId::new();
        f.membership.add_member(channel, user);
        let mut session = open(&f.state, user).await;
        let _ = reply(&mut session, json!({ "command": "join_channel", "channel_id": channel })).await;
        assert!(f.state.realtime.is_online(user));

        session.close().await;
        assert!(!f.state.realtime.is_online(user));
        assert_eq!(f.state.hub.group_count(), 0);
    }
}
