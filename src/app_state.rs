//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::dispatch::{EventDispatcher, Transport};
use crate::domain::{
    ConnectionRegistry, EventBus, EventSink, MembershipStore, SystemClock, TypingRegistry,
};
use crate::service::RealtimeService;
use crate::ws::ConnectionHub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Realtime service for all client signals and published events.
    pub realtime: Arc<RealtimeService>,
    /// WebSocket hub; the transport behind the event dispatcher.
    pub hub: Arc<ConnectionHub>,
}

impl AppState {
    /// Wires registries, hub, dispatcher, bus and service from `config`.
    ///
    /// The dispatcher is bound as the bus sink, so every transport-bound
    /// event published through the service reaches connected sockets.
    #[must_use]
    pub fn new(config: &GatewayConfig, membership: Arc<dyn MembershipStore>) -> Self {
        let hub = Arc::new(ConnectionHub::new(config.ws_outbound_buffer));
        let connections = Arc::new(ConnectionRegistry::new());
        let typing = Arc::new(TypingRegistry::with_clock(
            config.typing_config(),
            Arc::new(SystemClock),
        ));

        let transport: Arc<dyn Transport> = Arc::<ConnectionHub>::clone(&hub);
        let dispatcher: Arc<dyn EventSink> = Arc::new(
            EventDispatcher::new(transport, Arc::clone(&connections), Arc::clone(&membership))
                .with_policy(config.message_notify_policy),
        );
        let event_bus = EventBus::with_sink(dispatcher);

        let realtime = Arc::new(RealtimeService::new(
            connections,
            typing,
            membership,
            event_bus,
        ));

        Self { realtime, hub }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InMemoryMembershipStore;

    #[test]
    fn wires_dispatcher_as_sink() {
        let state = AppState::new(
            &GatewayConfig::default(),
            Arc::new(InMemoryMembershipStore::new()),
        );
        assert!(state.realtime.event_bus().has_sink());
        assert_eq!(state.hub.connection_count(), 0);
    }
}
