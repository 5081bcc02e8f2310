//! Domain layer: identifiers, events, registries and the event bus.
//!
//! This module holds all process-local real-time state: who is connected
//! ([`ConnectionRegistry`]), who is typing ([`TypingRegistry`]), and the
//! [`EventBus`] that carries committed state changes to local listeners
//! and to the transport dispatcher.

pub mod clock;
pub mod connection_registry;
pub mod event;
pub mod event_bus;
pub mod ids;
pub mod membership;
pub mod typing_registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection_registry::{AddOutcome, ConnectionRegistry, RemoveOutcome};
pub use event::{DomainEvent, EventKind, PresenceStatus};
pub use event_bus::{EventBus, EventHandler, EventSink, PublishReport, Subscription};
pub use ids::{CallId, ChannelId, ConnectionId, MessageId, ServerId, UserId};
pub use membership::{InMemoryMembershipStore, MembershipStore};
pub use typing_registry::{TypingConfig, TypingRegistry};
