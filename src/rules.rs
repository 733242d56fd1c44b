//! Rule evaluation for inbound messages
//!
//! Pure decision logic: given message text and the sender's state, produce
//! the moderation decision. The priority chain (restriction gate, blacklist,
//! links) short-circuits at the first match; the forward and spam checks are
//! independent entry points evaluated on their own.

use std::fmt;

use crate::data::UserState;

/// Substrings that always violate chat policy, checked in listed order
pub const BLACKLIST: &[&str] = &[
    "පොඩි", "කාමුක", "ලිංගික", "අසභ්‍ය", "sex", "porn", "xxx", "adult", "nude",
];

/// Exact replies a restricted user is still allowed to send
pub const GREETINGS: &[&str] = &["hi", "hello", "හායි", "හලෝ", "hey"];

/// Link fragments that are never allowed
pub const LINK_MARKERS: &[&str] = &["http://", "https://", "t.me/"];

/// Warnings before a mute
pub const WARNING_LIMIT: u32 = 3;
/// Mute duration after repeated warnings
pub const WARNING_MUTE_SECS: i64 = 2 * 60 * 60;
/// Messages allowed inside the spam window before a mute
pub const SPAM_LIMIT: usize = 5;
/// Mute duration for spamming
pub const SPAM_MUTE_SECS: i64 = 5 * 60;
/// Invites needed to lift a new-member restriction early
pub const INVITE_UNLOCK_THRESHOLD: u32 = 5;
/// Delay before a welcome notice is deleted
pub const WELCOME_DELETE_SECS: u64 = 20;
/// Delay before a new-member restriction lifts on its own
pub const AUTO_UNLOCK_SECS: u64 = 60 * 60;

/// Why a message was acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Restricted user posted something other than a greeting
    RestrictedNonGreeting,
    /// Text contained the given blacklisted substring
    Blacklist(&'static str),
    /// Text contained a link
    Link,
    /// Message was forwarded
    Forward,
    /// Too many messages inside the spam window
    Spam,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestrictedNonGreeting => write!(f, "restricted: greeting only"),
            Self::Blacklist(word) => write!(f, "blacklisted word: {word}"),
            Self::Link => write!(f, "links not allowed"),
            Self::Forward => write!(f, "forwards not allowed"),
            Self::Spam => write!(f, "spam"),
        }
    }
}

/// Outcome of evaluating a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Message passes
    Allow,
    /// Delete the message and explain, counters untouched
    DeleteOnly { violation: Violation },
    /// Delete the message and warn; the counter has already been advanced
    DeleteAndWarn { violation: Violation, count: u32 },
    /// Delete the message and mute the sender
    DeleteAndMute { violation: Violation, mute_secs: i64 },
}

/// Evaluate a message against the priority chain, applying counter deltas
/// to `state`
///
/// Call this under the sender's entry lock so the escalation counter cannot
/// interleave across concurrent messages.
pub fn evaluate_message(text: &str, state: &mut UserState) -> Decision {
    let lowered = text.to_lowercase();

    // 1. Restriction gate: exact-match against the greeting set, not substring
    if state.restricted && !is_greeting(&lowered) {
        return Decision::DeleteOnly {
            violation: Violation::RestrictedNonGreeting,
        };
    }

    // 2. Blacklist with escalation
    if let Some(word) = matched_blacklist(&lowered) {
        let count = state.increment_warning();
        if count >= WARNING_LIMIT {
            state.reset_warnings();
            return Decision::DeleteAndMute {
                violation: Violation::Blacklist(word),
                mute_secs: WARNING_MUTE_SECS,
            };
        }
        return Decision::DeleteAndWarn {
            violation: Violation::Blacklist(word),
            count,
        };
    }

    // 3. Links
    if contains_link(&lowered) {
        return Decision::DeleteOnly {
            violation: Violation::Link,
        };
    }

    Decision::Allow
}

/// Forward interception, independent of the text rules
#[must_use]
pub fn check_forward(is_forwarded: bool) -> Option<Decision> {
    is_forwarded.then_some(Decision::DeleteOnly {
        violation: Violation::Forward,
    })
}

/// Spam check over the already-recorded window count
#[must_use]
pub fn check_spam(window_count: usize) -> Option<Decision> {
    (window_count > SPAM_LIMIT).then_some(Decision::DeleteAndMute {
        violation: Violation::Spam,
        mute_secs: SPAM_MUTE_SECS,
    })
}

/// Whether lower-cased text is exactly an allowed greeting once trimmed
#[must_use]
pub fn is_greeting(lowered: &str) -> bool {
    let trimmed = lowered.trim();
    GREETINGS.iter().any(|g| *g == trimmed)
}

/// First blacklisted substring present in lower-cased text, if any
#[must_use]
pub fn matched_blacklist(lowered: &str) -> Option<&'static str> {
    BLACKLIST.iter().copied().find(|word| lowered.contains(word))
}

/// Whether lower-cased text contains a link fragment
#[must_use]
pub fn contains_link(lowered: &str) -> bool {
    LINK_MARKERS.iter().any(|marker| lowered.contains(marker))
}
