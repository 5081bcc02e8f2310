//! Data Transfer Objects for REST request/response serialization.
//!
//! Identifiers cross the wire as plain UUID strings.

pub mod event_dto;
pub mod presence_dto;

pub use event_dto::*;
pub use presence_dto::*;
