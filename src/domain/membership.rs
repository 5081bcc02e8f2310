//! Persisted channel membership, as seen from the gateway.
//!
//! Membership is owned by another service; the gateway only reads it. The
//! PostgreSQL implementation lives in [`crate::persistence`]. The in-memory
//! store below backs tests and single-process deployments without a
//! database.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{ChannelId, UserId};
use crate::error::GatewayError;

/// Read access to "who belongs to channel C at all".
#[async_trait]
pub trait MembershipStore: Send + Sync + fmt::Debug {
    /// Returns every persisted member of `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] when the backing store
    /// cannot be reached.
    async fn channel_members(&self, channel_id: ChannelId) -> Result<Vec<UserId>, GatewayError>;

    /// Returns `true` if `user_id` is a persisted member of `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] when the backing store
    /// cannot be reached.
    async fn is_member(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool, GatewayError>;
}

/// Process-local [`MembershipStore`].
#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    members: DashMap<ChannelId, HashSet<UserId>>,
}

impl InMemoryMembershipStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `user_id` to `channel_id`. Idempotent.
    pub fn add_member(&self, channel_id: ChannelId, user_id: UserId) {
        self.members.entry(channel_id).or_default().insert(user_id);
    }

    /// Removes `user_id` from `channel_id`.
    pub fn remove_member(&self, channel_id: ChannelId, user_id: UserId) {
        let _ = self.members.remove_if_mut(&channel_id, |_, users| {
            users.remove(&user_id);
            users.is_empty()
        });
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn channel_members(&self, channel_id: ChannelId) -> Result<Vec<UserId>, GatewayError> {
        Ok(self
            .members
            .get(&channel_id)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn is_member(&self, channel_id: ChannelId, user_id: UserId) -> Result<bool, GatewayError> {
        Ok(self
            .members
            .get(&channel_id)
            .is_some_and(|users| users.contains(&user_id)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn members_round_trip() {
        let store = InMemoryMembershipStore::new();
        let channel = ChannelId::new();
        let a = UserId::new();
        let b = UserId::new();
        store.add_member(channel, a);
        store.add_member(channel, b);
        store.add_member(channel, a);

        let mut members = assert_ok!(store.channel_members(channel).await);
        members.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(members, expected);
        assert!(assert_ok!(store.is_member(channel, a).await));
    }

    #[tokio::test]
    async fn unknown_channel_is_empty() {
        let store = InMemoryMembershipStore::new();
        let members = assert_ok!(store.channel_members(ChannelId::new()).await);
        assert!(members.is_empty());
        assert!(!assert_ok!(store.is_member(ChannelId::new(), UserId::new()).await));
    }

    #[tokio::test]
    async fn remove_member_drops_empty_channel() {
        let store = InMemoryMembershipStore::new();
        let channel = ChannelId::new();
        let user = UserId::new();
        store.add_member(channel, user);
        store.remove_member(channel, user);

        assert!(!assert_ok!(store.is_member(channel, user).await));
        assert!(store.members.is_empty());
    }

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl MembershipStore for Unreachable {
        async fn channel_members(&self, _: ChannelId) -> Result<Vec<UserId>, GatewayError> {
            Err(GatewayError::PersistenceError("connection refused".to_string()))
        }

        async fn is_member(&self, _: ChannelId, _: UserId) -> Result<bool, GatewayError> {
            Err(GatewayError::PersistenceError("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn store_errors_surface_as_persistence_errors() {
        let store: Box<dyn MembershipStore> = Box::new(Unreachable);
        let err = assert_err!(store.channel_members(ChannelId::new()).await);
        assert!(matches!(err, GatewayError::PersistenceError(_)));
    }
}
