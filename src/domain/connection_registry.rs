//! Concurrent map of who is reachable, and on which connections.
//!
//! [`ConnectionRegistry`] stores every live transport session keyed by the
//! user that owns it. Each user's set is mutated through the `DashMap`
//! entry API, so two tabs connecting or disconnecting at the same moment
//! are serialized on that user's key while unrelated users never contend.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;

use super::{ConnectionId, UserId};

/// Result of [`ConnectionRegistry::add_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// `false` when the connection id was already registered.
    pub inserted: bool,
    /// `true` when this connection took the user from offline to online.
    pub came_online: bool,
}

/// Result of [`ConnectionRegistry::remove_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// `false` when the connection id was not registered for that user.
    pub removed: bool,
    /// `true` when this removal closed the user's last connection.
    pub went_offline: bool,
}

/// Authoritative map from user to open connections.
///
/// # Invariants
///
/// - A user key is present iff its connection set is non-empty.
/// - "Online" means the key is present.
///
/// # Concurrency
///
/// - Add/remove on the same user are linearizable (single shard lock held
///   for the whole read-modify-write).
/// - Reads clone out of the map and return a best-effort snapshot.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection_id` for `user_id`. Idempotent.
    pub fn add_connection(&self, user_id: UserId, connection_id: ConnectionId) -> AddOutcome {
        let mut set = self.connections.entry(user_id).or_default();
        let came_online = set.is_empty();
        let inserted = set.insert(connection_id);
        AddOutcome {
            inserted,
            came_online: came_online && inserted,
        }
    }

    /// Unregisters `connection_id`, dropping the user entirely once the
    /// last connection is gone.
    pub fn remove_connection(&self, user_id: UserId, connection_id: ConnectionId) -> RemoveOutcome {
        let mut removed = false;
        let dropped = self
            .connections
            .remove_if_mut(&user_id, |_, set| {
                removed = set.remove(&connection_id);
                set.is_empty()
            })
            .is_some();
        RemoveOutcome {
            removed,
            went_offline: dropped && removed,
        }
    }

    /// Returns the user's open connections, empty if none.
    #[must_use]
    pub fn get_connections(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.connections
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the open connections of every requested user.
    ///
    /// The result is total over the input: users without connections map
    /// to an empty `Vec`.
    #[must_use]
    pub fn get_connections_many<I>(&self, user_ids: I) -> HashMap<UserId, Vec<ConnectionId>>
    where
        I: IntoIterator<Item = UserId>,
    {
        user_ids
            .into_iter()
            .map(|user_id| (user_id, self.get_connections(user_id)))
            .collect()
    }

    /// Returns `true` if the user has at least one open connection.
    #[must_use]
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.connections
            .get(&user_id)
            .is_some_and(|set| !set.is_empty())
    }

    /// Returns every user that is currently online.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of users with at least one connection.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.connections.len()
    }

    /// Total number of open connections across all users.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns `true` if the registry holds any entry for `user_id`.
    #[must_use]
    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.connections.contains_key(&user_id)
    }
}
