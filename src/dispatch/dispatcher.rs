//! Per-kind fanout of transport-bound events.
//!
//! | Event                  | Recipients                                        |
//! |------------------------|---------------------------------------------------|
//! | message received       | channel group, then every persisted member's connections |
//! | typing started/stopped | channel group                                     |
//! | direct typing started  | the recipient's connections                       |
//! | presence changed       | all clients                                       |
//! | online state changed   | all clients                                       |
//!
//! Every recipient send is independent: a failure is logged and the fanout
//! moves on to the next recipient.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use super::transport::Transport;
use crate::domain::{
    ChannelId, ConnectionId, ConnectionRegistry, DomainEvent, EventSink, MembershipStore, UserId,
};
use crate::error::GatewayError;

/// Transport method used for the per-member message notification.
pub const MESSAGE_NOTIFICATION_METHOD: &str = "message_notification";

/// Which persisted members receive the message notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// Every persisted member, whether or not they are watching the channel.
    #[default]
    AllMembers,
    /// Only connections that are not already in the channel group.
    OutsideGroup,
}

impl fmt::Display for NotifyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllMembers => f.write_str("all_members"),
            Self::OutsideGroup => f.write_str("outside_group"),
        }
    }
}

impl FromStr for NotifyPolicy {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all_members" | "all" => Ok(Self::AllMembers),
            "outside_group" => Ok(Self::OutsideGroup),
            other => Err(GatewayError::InvalidRequest(format!(
                "unknown notify policy: {other}"
            ))),
        }
    }
}

/// Applies the fanout table to transport-bound events.
///
/// Holds no state of its own beyond its collaborators; it only reads the
/// [`ConnectionRegistry`] and never holds a registry guard across a send.
#[derive(Debug)]
pub struct EventDispatcher {
    transport: Arc<dyn Transport>,
    connections: Arc<ConnectionRegistry>,
    membership: Arc<dyn MembershipStore>,
    policy: NotifyPolicy,
}

impl EventDispatcher {
    /// Creates a dispatcher with the default [`NotifyPolicy::AllMembers`].
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        connections: Arc<ConnectionRegistry>,
        membership: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            transport,
            connections,
            membership,
            policy: NotifyPolicy::default(),
        }
    }

    /// Replaces the message-notification policy.
    #[must_use]
    pub fn with_policy(mut self, policy: NotifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the active message-notification policy.
    #[must_use]
    pub const fn policy(&self) -> NotifyPolicy {
        self.policy
    }

    /// Resolves every persisted member of `channel_id` to their open
    /// connections. Offline members map to an empty `Vec`.
    ///
    /// # Errors
    ///
    /// Propagates [`GatewayError::PersistenceError`] from the membership
    /// store.
    pub async fn resolve_channel_member_connections(
        &self,
        channel_id: ChannelId,
    ) -> Result<HashMap<UserId, Vec<ConnectionId>>, GatewayError> {
        let members = self.membership.channel_members(channel_id).await?;
        Ok(self.connections.get_connections_many(members))
    }

    /// Sends a new message to the channel group, then notifies every
    /// persisted member.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized or membership
    /// cannot be resolved. The group send has already happened by then.
    pub async fn on_message_received(
        &self,
        channel_id: ChannelId,
        event: &DomainEvent,
    ) -> Result<(), GatewayError> {
        let payload = to_payload(event)?;
        let group = channel_id.group_name();
        let method = event.event_type_str();

        if let Err(e) = self.transport.send_to_group(&group, method, &payload).await {
            tracing::warn!(%channel_id, error = %e, "group send failed");
        }

        let members = self.resolve_channel_member_connections(channel_id).await?;
        let watching: HashSet<ConnectionId> = match self.policy {
            NotifyPolicy::AllMembers => HashSet::new(),
            NotifyPolicy::OutsideGroup => self
                .transport
                .group_connections(&group)
                .await
                .into_iter()
                .collect(),
        };

        let mut notified = 0usize;
        for (user_id, connections) in members {
            let targets: Vec<ConnectionId> = connections
                .into_iter()
                .filter(|conn| !watching.contains(conn))
                .collect();
            if targets.is_empty() {
                tracing::trace!(%channel_id, %user_id, "member has no connections to notify");
                continue;
            }
            match self
                .transport
                .send_to_connections(&targets, MESSAGE_NOTIFICATION_METHOD, &payload)
                .await
            {
                Ok(()) => notified += 1,
                Err(e) => {
                    tracing::warn!(%channel_id, %user_id, error = %e, "member notification failed");
                }
            }
        }

        tracing::debug!(%channel_id, notified, "message fanout complete");
        Ok(())
    }

    /// Sends a typing start/stop signal to the channel group.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub async fn on_typing_changed(
        &self,
        channel_id: ChannelId,
        event: &DomainEvent,
    ) -> Result<(), GatewayError> {
        let payload = to_payload(event)?;
        if let Err(e) = self
            .transport
            .send_to_group(&channel_id.group_name(), event.event_type_str(), &payload)
            .await
        {
            tracing::warn!(%channel_id, error = %e, "typing send failed");
        }
        Ok(())
    }

    /// Sends a direct typing signal to the recipient's connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub async fn on_direct_typing(
        &self,
        recipient_id: UserId,
        event: &DomainEvent,
    ) -> Result<(), GatewayError> {
        let targets = self.connections.get_connections(recipient_id);
        if targets.is_empty() {
            return Ok(());
        }
        let payload = to_payload(event)?;
        if let Err(e) = self
            .transport
            .send_to_connections(&targets, event.event_type_str(), &payload)
            .await
        {
            tracing::warn!(%recipient_id, error = %e, "direct typing send failed");
        }
        Ok(())
    }

    /// Broadcasts a presence change to every connected client.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub async fn on_presence_changed(&self, event: &DomainEvent) -> Result<(), GatewayError> {
        self.broadcast(event).await
    }

    /// Broadcasts an online/offline transition to every connected client.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub async fn on_online_state_changed(&self, event: &DomainEvent) -> Result<(), GatewayError> {
        self.broadcast(event).await
    }

    async fn broadcast(&self, event: &DomainEvent) -> Result<(), GatewayError> {
        let payload = to_payload(event)?;
        if let Err(e) = self
            .transport
            .send_to_all(event.event_type_str(), &payload)
            .await
        {
            tracing::warn!(kind = event.event_type_str(), error = %e, "broadcast incomplete");
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for EventDispatcher {
    async fn dispatch(&self, event: &DomainEvent) -> Result<(), GatewayError> {
        match event {
            DomainEvent::MessageReceived { channel_id, .. } => {
                self.on_message_received(*channel_id, event).await
            }
            DomainEvent::TypingStarted { channel_id, .. }
            | DomainEvent::TypingStopped { channel_id, .. } => {
                self.on_typing_changed(*channel_id, event).await
            }
            DomainEvent::DirectTypingStarted { recipient_id, .. } => {
                self.on_direct_typing(*recipient_id, event).await
            }
            DomainEvent::PresenceChanged { .. } => self.on_presence_changed(event).await,
            DomainEvent::OnlineStateChanged { .. } => self.on_online_state_changed(event).await,
            DomainEvent::MessageUpdated { .. }
            | DomainEvent::MessageDeleted { .. }
            | DomainEvent::ContactRequestReceived { .. }
            | DomainEvent::ContactRequestAccepted { .. }
            | DomainEvent::ChannelCreated { .. }
            | DomainEvent::ChannelUpdated { .. }
            | DomainEvent::ChannelDeleted { .. }
            | DomainEvent::ServerUpdated { .. }
            | DomainEvent::ServerDeleted { .. }
            | DomainEvent::MemberJoined { .. }
            | DomainEvent::MemberLeft { .. }
            | DomainEvent::CallStarted { .. }
            | DomainEvent::CallEnded { .. }
            | DomainEvent::ReactionAdded { .. }
            | DomainEvent::ReactionRemoved { .. } => {
                tracing::trace!(kind = event.event_type_str(), "not transport-bound");
                Ok(())
            }
        }
    }
}

fn to_payload(event: &DomainEvent) -> Result<serde_json::Value, GatewayError> {
    serde_json::to_value(event).map_err(|e| GatewayError::Internal(e.to_string()))
}
