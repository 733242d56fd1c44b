use std::{default::Default, ops::Deref, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::client::UserId;

/// Horizon of the spam-detection window in seconds
pub const SPAM_WINDOW_SECS: i64 = 10;

/// Moderation state tracked for a single user
///
/// Created lazily the first time a user is observed; absent users behave as
/// default state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserState {
    /// User may only post an exact greeting while set
    pub restricted: bool,
    /// Blacklist violations since the last mute
    pub warning_count: u32,
    /// Non-bot members this user has added
    pub invite_count: u32,
    /// Recent message timestamps, pruned to the spam window on every append
    pub recent_messages: Vec<DateTime<Utc>>,
}

impl UserState {
    /// Clear the restriction flag, returning whether it actually transitioned
    pub fn unlock(&mut self) -> bool {
        let was_restricted = self.restricted;
        self.restricted = false;
        was_restricted
    }

    /// Increment the warning counter and return the new count
    pub fn increment_warning(&mut self) -> u32 {
        self.warning_count += 1;
        self.warning_count
    }

    /// Reset the warning counter
    pub fn reset_warnings(&mut self) {
        self.warning_count = 0;
    }

    /// Credit `n` invites and return the new cumulative total
    pub fn add_invites(&mut self, n: u32) -> u32 {
        self.invite_count += n;
        self.invite_count
    }

    /// Record a message timestamp, prune entries older than the spam window
    /// relative to `now`, and return the resulting window count
    pub fn record_message(&mut self, now: DateTime<Utc>) -> usize {
        self.recent_messages.push(now);
        let horizon = Duration::seconds(SPAM_WINDOW_SECS);
        self.recent_messages
            .retain(|t| now.signed_duration_since(*t) < horizon);
        self.recent_messages.len()
    }
}

/// Point-in-time view of the store, for the admin surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Users currently limited to greetings
    pub restricted_users: usize,
    /// Users with a nonzero warning counter
    pub users_with_warnings: usize,
    /// Sum of invite counts across all users
    pub invites_tracked: u64,
}

/// Centralized per-user moderation state
#[derive(Clone, Default)]
pub struct Data(Arc<DataInner>);

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("users", &self.0.users.len())
            .finish()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(DataInner::new()))
    }

    /// Run `f` against a user's state under that user's entry lock
    ///
    /// The closure sees the live state; concurrent operations for the same
    /// user serialize here while other users proceed in parallel.
    pub fn with_user<T>(&self, user_id: UserId, f: impl FnOnce(&mut UserState) -> T) -> T {
        let mut entry = self.0.users.entry(user_id).or_default();
        f(entry.value_mut())
    }

    /// Get a copy of a user's state, default if the user is unknown
    #[must_use]
    pub fn get(&self, user_id: UserId) -> UserState {
        self.0
            .users
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Set or clear a user's greeting-only restriction
    pub fn set_restricted(&self, user_id: UserId, restricted: bool) {
        self.with_user(user_id, |state| state.restricted = restricted);
    }

    /// Clear the restriction, returning whether the flag actually flipped
    ///
    /// Both unlock paths (invite threshold and timeout) race through this;
    /// the loser sees `false` and stays silent.
    pub fn unlock(&self, user_id: UserId) -> bool {
        self.with_user(user_id, UserState::unlock)
    }

    /// Increment a user's warning counter and return the new count
    pub fn increment_warning(&self, user_id: UserId) -> u32 {
        self.with_user(user_id, UserState::increment_warning)
    }

    /// Reset a user's warning counter
    pub fn reset_warnings(&self, user_id: UserId) {
        self.with_user(user_id, UserState::reset_warnings);
    }

    /// Credit invites to a user and return the new cumulative total
    pub fn add_invites(&self, user_id: UserId, n: u32) -> u32 {
        self.with_user(user_id, |state| state.add_invites(n))
    }

    /// Record a message timestamp and return the current window count
    pub fn record_message_time(&self, user_id: UserId, now: DateTime<Utc>) -> usize {
        self.with_user(user_id, |state| state.record_message(now))
    }

    /// Pure read of the current counters
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = StatsSnapshot::default();

        for entry in self.0.users.iter() {
            let state = entry.value();
            if state.restricted {
                snapshot.restricted_users += 1;
            }
            if state.warning_count > 0 {
                snapshot.users_with_warnings += 1;
            }
            snapshot.invites_tracked += u64::from(state.invite_count);
        }

        snapshot
    }
}

/// Inner storage behind the cheaply-cloneable handle
#[derive(Default)]
pub struct DataInner {
    /// Map of user ID to moderation state
    users: DashMap<UserId, UserState>,
}

impl DataInner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    /// Number of users observed so far
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
