//! Service layer: orchestration between the transport and the core.
//!
//! [`RealtimeService`] applies rate-limit and membership gates, updates the
//! registries, and emits events through the [`super::domain::EventBus`].

pub mod realtime_service;

pub use realtime_service::{RealtimeService, TypingOutcome};
