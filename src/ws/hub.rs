//! WebSocket implementation of [`Transport`].
//!
//! Each accepted socket registers a bounded outbound queue with the
//! [`ConnectionHub`]. Sends never wait on a socket: a full queue or a
//! closed connection counts as a failure for that one recipient and the
//! send moves on.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::messages::{WsMessage, WsMessageType};
use crate::dispatch::{Transport, TransportError};
use crate::domain::ConnectionId;

/// Outbound queues and channel groups for all live sockets.
#[derive(Debug)]
pub struct ConnectionHub {
    senders: DashMap<ConnectionId, mpsc::Sender<String>>,
    groups: DashMap<String, HashSet<ConnectionId>>,
    buffer: usize,
}

impl ConnectionHub {
    /// Creates a hub whose per-connection queues hold `buffer` frames.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            senders: DashMap::new(),
            groups: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Registers a socket and returns the receiving end of its queue.
    pub fn register(&self, connection_id: ConnectionId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.senders.insert(connection_id, tx);
        rx
    }

    /// Drops a socket's queue. Group memberships must be left separately.
    pub fn unregister(&self, connection_id: ConnectionId) {
        self.senders.remove(&connection_id);
    }

    /// Adds the connection to `group`. Returns `false` if already joined.
    pub fn join_group(&self, group: &str, connection_id: ConnectionId) -> bool {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(connection_id)
    }

    /// Removes the connection from `group`. Returns `false` if not joined.
    pub fn leave_group(&self, group: &str, connection_id: ConnectionId) -> bool {
        let mut left = false;
        let _ = self.groups.remove_if_mut(group, |_, members| {
            left = members.remove(&connection_id);
            members.is_empty()
        });
        left
    }

    /// Number of registered sockets.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }

    /// Number of groups with at least one member.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn deliver(&self, connection_id: ConnectionId, frame: &str) -> Result<(), TransportError> {
        let Some(sender) = self.senders.get(&connection_id).map(|s| s.value().clone()) else {
            return Err(TransportError::ConnectionClosed(connection_id));
        };
        match sender.try_send(frame.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Backpressure(connection_id)),
            Err(TrySendError::Closed(_)) => Err(TransportError::ConnectionClosed(connection_id)),
        }
    }

    fn deliver_all<I>(&self, targets: I, frame: &str) -> Result<(), TransportError>
    where
        I: IntoIterator<Item = ConnectionId>,
    {
        let mut total = 0usize;
        let mut failed = 0usize;
        for connection_id in targets {
            total += 1;
            if let Err(e) = self.deliver(connection_id, frame) {
                failed += 1;
                tracing::debug!(%connection_id, error = %e, "frame dropped");
            }
        }
        if failed > 0 {
            Err(TransportError::Undelivered { failed, total })
        } else {
            Ok(())
        }
    }
}

/// Wraps a transport send in the server-event envelope.
fn encode(method: &str, args: &serde_json::Value) -> String {
    let msg = WsMessage::server(
        uuid::Uuid::new_v4().to_string(),
        WsMessageType::Event,
        serde_json::json!({
            "method": method,
            "data": args,
        }),
    );
    serde_json::to_string(&msg).unwrap_or_default()
}

#[async_trait]
impl Transport for ConnectionHub {
    async fn send_to_group(
        &self,
        group: &str,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<(), TransportError> {
        let members = self.group_connections(group).await;
        self.deliver_all(members, &encode(method, args))
    }

    async fn send_to_connections(
        &self,
        connection_ids: &[ConnectionId],
        method: &str,
        args: &serde_json::Value,
    ) -> Result<(), TransportError> {
        self.deliver_all(connection_ids.iter().copied(), &encode(method, args))
    }

    async fn send_to_all(&self, method: &str, args: &serde_json::Value) -> Result<(), TransportError> {
        let everyone: Vec<ConnectionId> = self.senders.iter().map(|e| *e.key()).collect();
        self.deliver_all(everyone, &encode(method, args))
    }

    async fn group_connections(&self, group: &str) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn decode(frame: &str) -> WsMessage {
        let Ok(msg) = serde_json::from_str::<WsMessage>(frame) else {
            panic!("frame is not a WsMessage: {frame}");
        };
        msg
    }

    #[tokio::test]
    async fn group_send_reaches_only_members() {
        let hub = ConnectionHub::new(8);
        let inside = ConnectionId::new();
        let outside = ConnectionId::new();
        let mut rx_inside = hub.register(inside);
        let mut rx_outside = hub.register(outside);
        assert!(hub.join_group("channel:a", inside));
        assert!(!hub.join_group("channel:a", inside));

        let sent = hub
            .send_to_group("channel:a", "typing_started", &serde_json::json!({ "x": 1 }))
            .await;
        assert!(sent.is_ok());

        let Some(frame) = rx_inside.recv().await else {
            panic!("member did not receive frame");
        };
        let msg = decode(&frame);
        assert_eq!(msg.msg_type, WsMessageType::Event);
        assert_eq!(msg.payload["method"], "typing_started");
        assert_eq!(msg.payload["data"]["x"], 1);
        assert!(rx_outside.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_group_send_is_ok() {
        let hub = ConnectionHub::new(8);
        let sent = hub
            .send_to_group("channel:nobody", "typing_started", &serde_json::Value::Null)
            .await;
        assert!(sent.is_ok());
    }

    #[tokio::test]
    async fn closed_connection_is_reported_but_others_get_frame() {
        let hub = ConnectionHub::new(8);
        let alive = ConnectionId::new();
        let gone = ConnectionId::new();
        let mut rx_alive = hub.register(alive);
        let rx_gone = hub.register(gone);
        drop(rx_gone);

        let result = hub
            .send_to_connections(&[gone, alive], "message_notification", &serde_json::json!({}))
            .await;
        assert_eq!(result, Err(TransportError::Undelivered { failed: 1, total: 2 }));
        assert!(rx_alive.recv().await.is_some());
    }

    #[tokio::test]
    async fn full_queue_is_backpressure() {
        let hub = ConnectionHub::new(1);
        let conn = ConnectionId::new();
        let _rx = hub.register(conn);

        assert!(hub.deliver(conn, "one").is_ok());
        assert_eq!(hub.deliver(conn, "two"), Err(TransportError::Backpressure(conn)));
    }

    #[tokio::test]
    async fn unknown_connection_is_closed() {
        let hub = ConnectionHub::new(4);
        let conn = ConnectionId::new();
        assert_eq!(hub.deliver(conn, "x"), Err(TransportError::ConnectionClosed(conn)));
    }

    #[tokio::test]
    async fn send_to_all_reaches_everyone() {
        let hub = ConnectionHub::new(4);
        let mut receivers: Vec<_> = (0..3).map(|_| hub.register(ConnectionId::new())).collect();

        let result = hub
            .send_to_all("presence_changed", &serde_json::json!({}))
            .await;
        assert!(result.is_ok());
        for rx in &mut receivers {
            assert!(rx.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn leaving_last_member_drops_group() {
        let hub = ConnectionHub::new(4);
        let conn = ConnectionId::new();
        let _ = hub.join_group("channel:b", conn);
        assert_eq!(hub.group_count(), 1);

        assert!(hub.leave_group("channel:b", conn));
        assert!(!hub.leave_group("channel:b", conn));
        assert_eq!(hub.group_count(), 0);
        assert!(hub.group_connections("channel:b").await.is_empty());
    }

    #[tokio::test]
    async fn unregister_removes_sender() {
        let hub = ConnectionHub::new(4);
        let conn = ConnectionId::new();
        let _rx = hub.register(conn);
        assert_eq!(hub.connection_count(), 1);
        hub.unregister(conn);
        assert_eq!(hub.connection_count(), 0);
    }
}
