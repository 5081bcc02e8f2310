//! Dispatch layer: turns transport-bound events into network sends.
//!
//! [`EventDispatcher`] is bound to the [`crate::domain::EventBus`] as its
//! sink and talks to clients only through the [`Transport`] trait.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{EventDispatcher, MESSAGE_NOTIFICATION_METHOD, NotifyPolicy};
pub use transport::{Transport, TransportError};
