//! Per-connection channel subscriptions.
//!
//! Tracks which channel groups a WebSocket client has joined so the
//! connection can leave all of them when it closes.

use std::collections::HashSet;

use crate::domain::ChannelId;

/// Manages the set of joined channels for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    channel_ids: HashSet<ChannelId>,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a joined channel. Returns `false` if it was already joined.
    pub fn join(&mut self, channel_id: ChannelId) -> bool {
        self.channel_ids.insert(channel_id)
    }

    /// Forgets a channel. Returns `false` if it was not joined.
    pub fn leave(&mut self, channel_id: ChannelId) -> bool {
        self.channel_ids.remove(&channel_id)
    }

    /// Returns `true` if the channel is joined.
    #[must_use]
    pub fn is_joined(&self, channel_id: ChannelId) -> bool {
        self.channel_ids.contains(&channel_id)
    }

    /// Returns the number of joined channels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.channel_ids.len()
    }

    /// Empties the set, yielding every channel that was joined.
    pub fn drain(&mut self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channel_ids.drain()
    }
}
