//! Persistence layer: PostgreSQL channel membership.
//!
//! The gateway never writes membership; it only answers "who belongs to
//! channel C" and "may user U join C" through
//! [`crate::domain::MembershipStore`]. The concrete implementation uses
//! `sqlx::PgPool` for async PostgreSQL access.

pub mod postgres;

pub use postgres::PostgresMembershipStore;
