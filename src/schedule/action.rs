//! Delayed action payloads
//!
//! This module defines the units of work the scheduler fires once their
//! delay has elapsed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::{ChatId, MessageId, UserId};

/// Kind of delayed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelayedActionKind {
    /// Remove a previously sent message
    DeleteMessage,
    /// Lift a new-member restriction once the timeout expires
    AutoUnlock,
}

impl fmt::Display for DelayedActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeleteMessage => write!(f, "Delete Message"),
            Self::AutoUnlock => write!(f, "Auto Unlock"),
        }
    }
}

/// A one-shot unit of work executed after a fixed delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayedAction {
    /// Delete a message (welcome-notice cleanup)
    DeleteMessage {
        chat_id: ChatId,
        message_id: MessageId,
    },
    /// Lift a user's greeting-only restriction if it is still in place
    AutoUnlock { chat_id: ChatId, user_id: UserId },
}

impl DelayedAction {
    /// Get the kind of this action
    #[must_use]
    pub fn kind(&self) -> DelayedActionKind {
        match self {
            Self::DeleteMessage { .. } => DelayedActionKind::DeleteMessage,
            Self::AutoUnlock { .. } => DelayedActionKind::AutoUnlock,
        }
    }

    /// The user this action targets, if it targets one
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::DeleteMessage { .. } => None,
            Self::AutoUnlock { user_id, .. } => Some(*user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind() {
        let action = DelayedAction::DeleteMessage {
            chat_id: -100,
            message_id: 42,
        };
        assert_eq!(action.kind(), DelayedActionKind::DeleteMessage);
        assert_eq!(action.user_id(), None);

        let action = DelayedAction::AutoUnlock {
            chat_id: -100,
            user_id: 12345,
        };
        assert_eq!(action.kind(), DelayedActionKind::AutoUnlock);
        assert_eq!(action.user_id(), Some(12345));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DelayedActionKind::DeleteMessage.to_string(), "Delete Message");
        assert_eq!(DelayedActionKind::AutoUnlock.to_string(), "Auto Unlock");
    }
}
