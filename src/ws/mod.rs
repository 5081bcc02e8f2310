//! WebSocket layer: connection handling, command routing, outbound fanout.
//!
//! The WebSocket endpoint at `/ws` carries client signals (joining
//! channels, typing, presence) in and dispatcher events out. The
//! [`ConnectionHub`] is the gateway's [`crate::dispatch::Transport`].

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;
pub mod subscription;

pub use hub::ConnectionHub;
