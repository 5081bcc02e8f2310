//! Ephemeral "user is typing" signals and the typing rate limiter.
//!
//! Nothing here expires on a timer. Each entry records the last time a
//! signal arrived and queries compare that against the clock, so a read
//! at `t0 + ttl` sees the entry as gone even though it is still stored.
//! [`TypingRegistry::sweep_stale`] exists purely to reclaim that memory in
//! long-lived processes; it never changes what a query returns.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use super::clock::{Clock, SystemClock};
use super::{ChannelId, UserId};

/// Time windows used by [`TypingRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingConfig {
    /// How long a typing signal stays active.
    pub ttl: TimeDelta,
    /// Minimum spacing between two typing updates from the same user.
    pub rate_limit: TimeDelta,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            ttl: TimeDelta::seconds(5),
            rate_limit: TimeDelta::seconds(1),
        }
    }
}

/// Registry of channel typing, direct typing and per-user throttling.
///
/// Channel and direct typing are independent tracks, but both refresh the
/// same per-user rate-limit timestamp so a user shares one throttle across
/// all conversations.
#[derive(Debug)]
pub struct TypingRegistry {
    channel_typing: DashMap<ChannelId, HashMap<UserId, DateTime<Utc>>>,
    direct_typing: DashMap<(UserId, UserId), DateTime<Utc>>,
    last_update: DashMap<UserId, DateTime<Utc>>,
    config: TypingConfig,
    clock: Arc<dyn Clock>,
}

impl TypingRegistry {
    /// Creates a registry on the system clock with default windows.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(TypingConfig::default(), Arc::new(SystemClock))
    }

    /// Creates a registry with explicit windows and clock.
    #[must_use]
    pub fn with_clock(config: TypingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            channel_typing: DashMap::new(),
            direct_typing: DashMap::new(),
            last_update: DashMap::new(),
            config,
            clock,
        }
    }

    /// Returns the configured windows.
    #[must_use]
    pub const fn config(&self) -> TypingConfig {
        self.config
    }

    /// Records that `user_id` is typing in `channel_id`.
    pub fn track_typing(&self, channel_id: ChannelId, user_id: UserId) {
        let now = self.clock.now();
        self.channel_typing
            .entry(channel_id)
            .or_default()
            .insert(user_id, now);
        self.last_update.insert(user_id, now);
    }

    /// Records that `user_id` is typing to `recipient_id` in a direct
    /// conversation.
    pub fn track_direct_typing(&self, user_id: UserId, recipient_id: UserId) {
        let now = self.clock.now();
        self.direct_typing.insert((user_id, recipient_id), now);
        self.last_update.insert(user_id, now);
    }

    /// Removes `user_id` from the channel's typing set.
    ///
    /// The rate-limit timestamp is left untouched.
    pub fn clear_typing(&self, channel_id: ChannelId, user_id: UserId) {
        let _ = self.channel_typing.remove_if_mut(&channel_id, |_, users| {
            users.remove(&user_id);
            users.is_empty()
        });
    }

    /// Returns the users whose last signal in `channel_id` is within the
    /// typing window.
    #[must_use]
    pub fn get_typing_users(&self, channel_id: ChannelId) -> Vec<UserId> {
        let now = self.clock.now();
        self.channel_typing
            .get(&channel_id)
            .map(|users| {
                users
                    .iter()
                    .filter(|(_, ts)| is_fresh(now, **ts, self.config.ttl))
                    .map(|(user_id, _)| *user_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns `true` if `user_id` is currently typing to `recipient_id`.
    #[must_use]
    pub fn is_user_typing(&self, user_id: UserId, recipient_id: UserId) -> bool {
        let now = self.clock.now();
        self.direct_typing
            .get(&(user_id, recipient_id))
            .is_some_and(|ts| is_fresh(now, *ts, self.config.ttl))
    }

    /// Returns `true` if `user_id` sent any typing signal within the
    /// cooldown. Does not refresh the timestamp.
    #[must_use]
    pub fn is_rate_limited(&self, user_id: UserId) -> bool {
        let now = self.clock.now();
        self.last_update
            .get(&user_id)
            .is_some_and(|ts| is_fresh(now, *ts, self.config.rate_limit))
    }

    /// Drops every entry that is already outside its window and returns how
    /// many were removed.
    pub fn sweep_stale(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.config.ttl;
        let mut swept = 0;

        self.channel_typing.retain(|_, users| {
            let before = users.len();
            users.retain(|_, ts| is_fresh(now, *ts, ttl));
            swept += before - users.len();
            !users.is_empty()
        });

        let before = self.direct_typing.len();
        self.direct_typing.retain(|_, ts| is_fresh(now, *ts, ttl));
        swept += before.saturating_sub(self.direct_typing.len());

        let before = self.last_update.len();
        self.last_update
            .retain(|_, ts| is_fresh(now, *ts, self.config.rate_limit));
        swept += before.saturating_sub(self.last_update.len());

        if swept > 0 {
            tracing::debug!(swept, "swept stale typing entries");
        }
        swept
    }

    /// Number of stored entries across all maps, stale ones included.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        let channel: usize = self
            .channel_typing
            .iter()
            .map(|entry| entry.value().len())
            .sum();
        channel + self.direct_typing.len() + self.last_update.len()
    }
}

/// An entry recorded at `recorded` is live while `now - recorded < window`.
fn is_fresh(now: DateTime<Utc>, recorded: DateTime<Utc>, window: TimeDelta) -> bool {
    now - recorded < window
}

impl Default for TypingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::clock::ManualClock;

    fn registry() -> (TypingRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let registry = TypingRegistry::with_clock(
            TypingConfig::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (registry, clock)
    }

    #[test]
    fn channel_typing_visible_until_ttl() {
        let (registry, clock) = registry();
        let channel = ChannelId::new();
        let user = UserId::new();

        registry.track_typing(channel, user);
        assert_eq!(registry.get_typing_users(channel), vec![user]);

        clock.advance(TimeDelta::milliseconds(4999));
        assert_eq!(registry.get_typing_users(channel), vec![user]);

        clock.advance(TimeDelta::milliseconds(1));
        assert!(registry.get_typing_users(channel).is_empty());
    }

    #[test]
    fn stale_entries_are_filtered_not_deleted() {
        let (registry, clock) = registry();
        let channel = ChannelId::new();
        registry.track_typing(channel, UserId::new());

        clock.advance(TimeDelta::seconds(10));
        assert!(registry.get_typing_users(channel).is_empty());
        // channel entry + rate-limit entry
        assert_eq!(registry.entry_count(), 2);
    }

    #[test]
    fn retyping_refreshes_window() {
        let (registry, clock) = registry();
        let channel = ChannelId::new();
        let user = UserId::new();

        registry.track_typing(channel, user);
        clock.advance(TimeDelta::seconds(4));
        registry.track_typing(channel, user);
        clock.advance(TimeDelta::seconds(4));
        assert_eq!(registry.get_typing_users(channel), vec![user]);
    }

    #[test]
    fn unknown_channel_has_no_typers() {
        let (registry, _) = registry();
        assert!(registry.get_typing_users(ChannelId::new()).is_empty());
    }

    #[test]
    fn direct_typing_visible_until_ttl() {
        let (registry, clock) = registry();
        let user = UserId::new();
        let recipient = UserId::new();

        registry.track_direct_typing(user, recipient);
        assert!(registry.is_user_typing(user, recipient));
        assert!(!registry.is_user_typing(recipient, user));

        clock.advance(TimeDelta::milliseconds(4999));
        assert!(registry.is_user_typing(user, recipient));

        clock.advance(TimeDelta::milliseconds(1));
        assert!(!registry.is_user_typing(user, recipient));
    }

    #[test]
    fn channel_and_direct_tracks_are_independent() {
        let (registry, _) = registry();
        let channel = ChannelId::new();
        let user = UserId::new();
        let recipient = UserId::new();

        registry.track_typing(channel, user);
        assert!(!registry.is_user_typing(user, recipient));

        registry.track_direct_typing(user, recipient);
        assert_eq!(registry.get_typing_users(channel), vec![user]);
    }

    #[test]
    fn rate_limit_window() {
        let (registry, clock) = registry();
        let user = UserId::new();
        assert!(!registry.is_rate_limited(user));

        registry.track_typing(ChannelId::new(), user);
        assert!(registry.is_rate_limited(user));

        clock.advance(TimeDelta::milliseconds(999));
        assert!(registry.is_rate_limited(user));

        clock.advance(TimeDelta::milliseconds(1));
        assert!(!registry.is_rate_limited(user));
    }

    #[test]
    fn direct_typing_shares_the_throttle() {
        let (registry, clock) = registry();
        let user = UserId::new();

        registry.track_direct_typing(user, UserId::new());
        assert!(registry.is_rate_limited(user));

        clock.advance(TimeDelta::seconds(1));
        assert!(!registry.is_rate_limited(user));
    }

    #[test]
    fn rate_limit_check_does_not_refresh() {
        let (registry, clock) = registry();
        let user = UserId::new();
        registry.track_typing(ChannelId::new(), user);

        for _ in 0..5 {
            clock.advance(TimeDelta::milliseconds(300));
            let _ = registry.is_rate_limited(user);
        }
        assert!(!registry.is_rate_limited(user));
    }

    #[test]
    fn clear_typing_removes_only_that_user() {
        let (registry, _) = registry();
        let channel = ChannelId::new();
        let a = UserId::new();
        let b = UserId::new();
        registry.track_typing(channel, a);
        registry.track_typing(channel, b);

        registry.clear_typing(channel, a);
        assert_eq!(registry.get_typing_users(channel), vec![b]);
        assert!(registry.is_rate_limited(a));

        registry.clear_typing(channel, b);
        assert!(registry.get_typing_users(channel).is_empty());
    }

    #[test]
    fn sweep_reclaims_only_stale_entries() {
        let (registry, clock) = registry();
        let channel = ChannelId::new();
        let old = UserId::new();
        let fresh = UserId::new();

        registry.track_typing(channel, old);
        registry.track_direct_typing(old, fresh);
        clock.advance(TimeDelta::seconds(6));
        registry.track_typing(channel, fresh);

        // old: channel + direct + rate-limit
        assert_eq!(registry.sweep_stale(), 3);
        assert_eq!(registry.get_typing_users(channel), vec![fresh]);
        assert!(registry.is_rate_limited(fresh));
        assert_eq!(registry.entry_count(), 2);
    }

    #[test]
    fn sweep_does_not_change_query_results() {
        let (registry, clock) = registry();
        let channel = ChannelId::new();
        let user = UserId::new();
        registry.track_typing(channel, user);
        clock.advance(TimeDelta::seconds(2));

        let before = registry.get_typing_users(channel);
        let _ = registry.sweep_stale();
        assert_eq!(registry.get_typing_users(channel), before);
    }

    #[test]
    fn custom_windows_are_honoured() {
        let clock = Arc::new(ManualClock::default());
        let config = TypingConfig {
            ttl: TimeDelta::seconds(2),
            rate_limit: TimeDelta::milliseconds(200),
        };
        let registry = TypingRegistry::with_clock(config, Arc::clone(&clock) as Arc<dyn Clock>);
        let channel = ChannelId::new();
        let user = UserId::new();

        registry.track_typing(channel, user);
        clock.advance(TimeDelta::milliseconds(200));
        assert!(!registry.is_rate_limited(user));
        clock.advance(TimeDelta::milliseconds(1800));
        assert!(registry.get_typing_users(channel).is_empty());
    }
}
