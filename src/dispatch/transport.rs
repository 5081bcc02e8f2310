//! Outbound send primitives the dispatcher relies on.
//!
//! The gateway's own WebSocket layer implements [`Transport`] with
//! [`crate::ws::ConnectionHub`]; tests substitute a recorder. Group
//! membership ("who is viewing channel C right now") belongs to the
//! transport and is only ever queried from here.

use std::fmt;

use async_trait::async_trait;

use crate::domain::ConnectionId;

/// Failure of a single outbound send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection is no longer registered with the transport.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// The connection's outbound queue is full.
    #[error("connection {0} is not keeping up")]
    Backpressure(ConnectionId),

    /// Some targets of a multi-connection send were not reached.
    #[error("{failed} of {total} connections were not reached")]
    Undelivered {
        /// Targets that failed.
        failed: usize,
        /// Targets attempted.
        total: usize,
    },
}

/// Send capability exposed by the real-time transport.
///
/// `method` names the client-side handler and `args` is forwarded as-is.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends to every connection currently joined to `group`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the group send could not be issued.
    async fn send_to_group(
        &self,
        group: &str,
        method: &str,
        args: &serde_json::Value,
    ) -> Result<(), TransportError>;

    /// Sends to each listed connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Undelivered`] when any target failed; the
    /// remaining targets are still attempted.
    async fn send_to_connections(
        &self,
        connection_ids: &[ConnectionId],
        method: &str,
        args: &serde_json::Value,
    ) -> Result<(), TransportError>;

    /// Sends to every connected client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Undelivered`] when any target failed.
    async fn send_to_all(&self, method: &str, args: &serde_json::Value) -> Result<(), TransportError>;

    /// Returns the connections currently joined to `group`.
    async fn group_connections(&self, group: &str) -> Vec<ConnectionId>;
}
