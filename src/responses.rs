//! Reply text for moderation notices
//!
//! Everything the bot says lives here so the pipeline stays free of
//! formatting concerns.

use crate::client::UserId;
use crate::data::StatsSnapshot;
use crate::rules::{INVITE_UNLOCK_THRESHOLD, WARNING_LIMIT};

/// HTML mention of a user
#[must_use]
pub fn mention(user_id: UserId) -> String {
    format!("<a href=\"tg://user?id={user_id}\">user</a>")
}

/// Welcome notice for a newly joined member
#[must_use]
pub fn welcome(user_id: UserId) -> String {
    format!(
        "👋 Welcome {}!\n\n\
         🔒 You can only say 'Hi' for now.\n\n\
         📌 To unlock full access:\n\
         • Add {INVITE_UNLOCK_THRESHOLD} members to this group, OR\n\
         • Wait 1 hour\n\n\
         This message will self-destruct in 20 seconds.",
        mention(user_id)
    )
}

/// Reminder sent when a restricted user posts anything but a greeting
#[must_use]
pub fn restricted_notice(user_id: UserId) -> String {
    format!(
        "⚠️ {}\nYou can only say 'Hi' for now.\n\n\
         To unlock: Add {INVITE_UNLOCK_THRESHOLD} members or wait 1 hour.",
        mention(user_id)
    )
}

/// Warning for a blacklist violation below the mute threshold
#[must_use]
pub fn warning(user_id: UserId, count: u32) -> String {
    format!(
        "⚠️ Warning {count}/{WARNING_LIMIT}\n{}\nDon't use inappropriate words!",
        mention(user_id)
    )
}

/// Notice sent alongside the escalation mute
#[must_use]
pub fn mute_notice(user_id: UserId) -> String {
    format!(
        "🚫 {}\n{WARNING_LIMIT} warnings received!\nMuted for 2 hours.",
        mention(user_id)
    )
}

/// Notice for a deleted link
#[must_use]
pub fn link_notice(user_id: UserId) -> String {
    format!("🚫 {}\nLinks are not allowed!", mention(user_id))
}

/// Notice for a deleted forward
#[must_use]
pub fn forward_notice(user_id: UserId) -> String {
    format!("🚫 {}\nForwarded messages are not allowed!", mention(user_id))
}

/// Notice sent alongside the spam mute
#[must_use]
pub fn spam_notice(user_id: UserId) -> String {
    format!("🚫 {}\nSpam detected! Muted for 5 minutes.", mention(user_id))
}

/// Notice for the timed unlock
#[must_use]
pub fn unlock_notice() -> String {
    "🔓 User unlocked! You can now send any message.".to_string()
}

/// Notice for the invite-threshold unlock
#[must_use]
pub fn invite_unlock_notice(user_id: UserId) -> String {
    format!(
        "🎉 Congratulations! You've added {INVITE_UNLOCK_THRESHOLD} members.\n\
         🔓 Full access unlocked!\n{}",
        mention(user_id)
    )
}

/// Feature overview for the start command
#[must_use]
pub fn start_text() -> String {
    "🤖 Bot Active!\n\n\
     Features:\n\
     ✅ Auto welcome (20s delete)\n\
     ✅ Blacklist words (3 warns = 2h mute)\n\
     ✅ Block forwards & links\n\
     ✅ New member restrictions\n\
     ✅ Anti-spam\n\n\
     Admin Commands:\n\
     /stats - Bot statistics"
        .to_string()
}

/// Render the stats snapshot
#[must_use]
pub fn stats_text(stats: &StatsSnapshot) -> String {
    format!(
        "📊 Bot Statistics\n\n\
         👥 Restricted users: {}\n\
         ⚠️ Users with warnings: {}\n\
         🎯 Total invites tracked: {}",
        stats.restricted_users, stats.users_with_warnings, stats.invites_tracked
    )
}
