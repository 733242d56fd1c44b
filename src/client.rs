//! Chat-client adapter boundary
//!
//! Inbound events consumed from the chat platform and the outbound calls the
//! moderation pipeline makes against it. The transport itself lives behind
//! the [`ChatApi`] trait; the engine never talks to the platform directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::CONSOLE_TARGET;

/// Chat identifier (group chats are commonly negative)
pub type ChatId = i64;
/// User identifier
pub type UserId = u64;
/// Message identifier, unique within a chat
pub type MessageId = i64;

/// Errors surfaced by the chat-client adapter
#[derive(Debug, Error)]
pub enum ClientError {
    /// The message is already gone
    #[error("message not found: chat {chat_id}, message {message_id}")]
    MessageNotFound {
        chat_id: ChatId,
        message_id: MessageId,
    },

    /// The bot lacks the rights for the call
    #[error("insufficient permissions: {0}")]
    PermissionDenied(String),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Generic error
    #[error("client error: {0}")]
    Other(String),
}

/// Text formatting applied to an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageFormat {
    #[default]
    Plain,
    Html,
}

/// Permission set applied when restricting a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPermissions {
    pub can_send_messages: bool,
}

impl ChatPermissions {
    /// Permissions of a muted member
    #[must_use]
    pub fn muted() -> Self {
        Self {
            can_send_messages: false,
        }
    }
}

/// A member referenced in a join event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub is_bot: bool,
}

/// One or more members joined a chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMembersEvent {
    pub chat_id: ChatId,
    /// The user whose update introduced the members
    pub inviter: UserId,
    pub members: Vec<Member>,
}

/// A text message arrived
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMessageEvent {
    pub chat_id: ChatId,
    pub sender: UserId,
    pub message_id: MessageId,
    pub text: String,
    /// The message carries forward metadata
    pub is_forwarded: bool,
}

/// Inbound events consumed from the chat-client adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatEvent {
    NewMembers(NewMembersEvent),
    Text(TextMessageEvent),
}

/// Outbound operations against the chat platform
///
/// Every call is fallible I/O; the pipeline logs failures and moves on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Delete a message from a chat
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), ClientError>;

    /// Send a message to a chat, returning the new message's ID
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: MessageFormat,
    ) -> Result<MessageId, ClientError>;

    /// Restrict a member's permissions until the given time
    async fn restrict_user(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        permissions: ChatPermissions,
        until: DateTime<Utc>,
    ) -> Result<(), ClientError>;
}

/// Client that logs outbound calls instead of performing them
///
/// Used to run the engine without a wired transport.
#[derive(Debug, Default)]
pub struct NullClient {
    next_message_id: AtomicI64,
}

impl NullClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatApi for NullClient {
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), ClientError> {
        debug!(target: CONSOLE_TARGET, chat_id, message_id, "delete_message");
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: MessageFormat,
    ) -> Result<MessageId, ClientError> {
        debug!(target: CONSOLE_TARGET, chat_id, text, format = ?format, "send_message");
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn restrict_user(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        permissions: ChatPermissions,
        until: DateTime<Utc>,
    ) -> Result<(), ClientError> {
        debug!(
            target: CONSOLE_TARGET,
            chat_id,
            user_id,
            can_send_messages = permissions.can_send_messages,
            until = %until,
            "restrict_user"
        );
        Ok(())
    }
}
