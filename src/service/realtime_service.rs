//! Realtime service: gates client signals and publishes domain events.

use std::sync::Arc;

use crate::domain::{
    ChannelId, Clock, ConnectionId, ConnectionRegistry, DomainEvent, EventBus, MembershipStore,
    PresenceStatus, PublishReport, SystemClock, TypingRegistry, UserId,
};
use crate::error::GatewayError;

/// What happened to a typing signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingOutcome {
    /// Recorded and broadcast.
    Published,
    /// Dropped: the user already signalled within the cooldown.
    Throttled,
}

/// Orchestration layer between the transport/REST surface and the core.
///
/// Every mutation follows the same pattern: check → update registry →
/// publish event → return. The registries answer the checks directly; the
/// bus takes care of local listeners and the network fanout.
#[derive(Debug, Clone)]
pub struct RealtimeService {
    connections: Arc<ConnectionRegistry>,
    typing: Arc<TypingRegistry>,
    membership: Arc<dyn MembershipStore>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl RealtimeService {
    /// Creates a new `RealtimeService` on the system clock.
    #[must_use]
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        typing: Arc<TypingRegistry>,
        membership: Arc<dyn MembershipStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            connections,
            typing,
            membership,
            event_bus,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used to timestamp emitted events.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Returns a reference to the inner [`TypingRegistry`].
    #[must_use]
    pub fn typing(&self) -> &Arc<TypingRegistry> {
        &self.typing
    }

    /// Registers a new transport connection. Publishes
    /// `online_state_changed` if this is the user's first connection.
    pub async fn connect(&self, user_id: UserId, connection_id: ConnectionId) {
        let outcome = self.connections.add_connection(user_id, connection_id);
        tracing::info!(%user_id, %connection_id, came_online = outcome.came_online, "connection opened");

        if outcome.came_online {
            self.publish_online_state(user_id, true).await;
        }
    }

    /// Unregisters a transport connection. Publishes
    /// `online_state_changed` if it was the user's last one.
    pub async fn disconnect(&self, user_id: UserId, connection_id: ConnectionId) {
        let outcome = self.connections.remove_connection(user_id, connection_id);
        tracing::info!(%user_id, %connection_id, went_offline = outcome.went_offline, "connection closed");

        if outcome.went_offline {
            self.publish_online_state(user_id, false).await;
        }
    }

    /// Handles a "start typing" signal in a channel.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] if the ids are malformed.
    pub async fn start_typing(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<TypingOutcome, GatewayError> {
        if self.typing.is_rate_limited(user_id) {
            tracing::trace!(%channel_id, %user_id, "typing throttled");
            return Ok(TypingOutcome::Throttled);
        }

        let event = DomainEvent::TypingStarted {
            channel_id,
            user_id,
            timestamp: self.clock.now(),
        };
        event.validate()?;

        self.typing.track_typing(channel_id, user_id);
        self.event_bus.publish(event).await?;
        Ok(TypingOutcome::Published)
    }

    /// Handles a "stop typing" signal in a channel.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] if the ids are malformed.
    pub async fn stop_typing(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), GatewayError> {
        let event = DomainEvent::TypingStopped {
            channel_id,
            user_id,
            timestamp: self.clock.now(),
        };
        event.validate()?;

        self.typing.clear_typing(channel_id, user_id);
        self.event_bus.publish(event).await?;
        Ok(())
    }

    /// Handles a "start typing" signal in a direct conversation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] if the ids are malformed or
    /// name the same user twice.
    pub async fn start_direct_typing(
        &self,
        user_id: UserId,
        recipient_id: UserId,
    ) -> Result<TypingOutcome, GatewayError> {
        if self.typing.is_rate_limited(user_id) {
            tracing::trace!(%user_id, %recipient_id, "direct typing throttled");
            return Ok(TypingOutcome::Throttled);
        }

        let event = DomainEvent::DirectTypingStarted {
            user_id,
            recipient_id,
            timestamp: self.clock.now(),
        };
        event.validate()?;

        self.typing.track_direct_typing(user_id, recipient_id);
        self.event_bus.publish(event).await?;
        Ok(TypingOutcome::Published)
    }

    /// Publishes a presence change for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] if the id is malformed.
    pub async fn set_presence(
        &self,
        user_id: UserId,
        status: PresenceStatus,
    ) -> Result<PublishReport, GatewayError> {
        tracing::info!(%user_id, ?status, "presence changed");
        self.event_bus
            .publish(DomainEvent::PresenceChanged {
                user_id,
                status,
                timestamp: self.clock.now(),
            })
            .await
    }

    /// Authorizes `user_id` to join the live group of `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotChannelMember`] if the user is not a
    /// persisted member, or a persistence error if the lookup failed.
    pub async fn join_channel(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> Result<(), GatewayError> {
        if self.membership.is_member(channel_id, user_id).await? {
            Ok(())
        } else {
            tracing::warn!(%user_id, %channel_id, "join refused");
            Err(GatewayError::NotChannelMember {
                channel_id,
                user_id,
            })
        }
    }

    /// Publishes an event produced by another service.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] if the event is malformed.
    pub async fn publish(&self, event: DomainEvent) -> Result<PublishReport, GatewayError> {
        let kind = event.event_type_str();
        let report = self.event_bus.publish(event).await?;
        tracing::debug!(
            kind,
            dispatched = report.dispatched,
            handlers_run = report.handlers_run,
            handlers_failed = report.handlers_failed,
            "event published"
        );
        Ok(report)
    }

    /// Returns `true` if the user has at least one open connection.
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.connections.is_online(user_id)
    }

    /// Returns the users currently typing in `channel_id`.
    #[must_use]
    pub fn typing_users(&self, channel_id: ChannelId) -> Vec<UserId> {
        self.typing.get_typing_users(channel_id)
    }

    async fn publish_online_state(&self, user_id: UserId, online: bool) {
        let event = DomainEvent::OnlineStateChanged {
            user_id,
            online,
            timestamp: self.clock.now(),
        };
        if let Err(e) = self.event_bus.publish(event).await {
            tracing::error!(%user_id, online, error = %e, "online state event rejected");
        }
    }
}
