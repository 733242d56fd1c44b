//! Moderation pipeline
//!
//! Routes each inbound event through the applicable rule entry points,
//! applies state deltas, and translates decisions into chat-client calls.
//! Adapter failures are logged and swallowed; no event can take the
//! dispatch loop down.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc::Receiver;
use tracing::{info, warn};

use crate::client::{
    ChatApi, ChatEvent, ChatId, ChatPermissions, MessageFormat, MessageId, NewMembersEvent,
    TextMessageEvent, UserId,
};
use crate::data::Data;
use crate::responses;
use crate::rules::{self, Decision, Violation};
use crate::schedule::{ActionExecutor, DelayedAction, ScheduleResult, Scheduler};
use crate::{ERROR_TARGET, EVENT_TARGET, MODERATION_TARGET};

/// Orchestrates event intake, rule evaluation and side-effect dispatch
pub struct Moderator<C> {
    data: Data,
    scheduler: Scheduler,
    client: C,
}

impl<C: ChatApi> Moderator<C> {
    /// Create a new pipeline over the given store, scheduler and client
    pub fn new(data: Data, scheduler: Scheduler, client: C) -> Self {
        Self {
            data,
            scheduler,
            client,
        }
    }

    /// The store backing this pipeline
    #[must_use]
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Consume events until the inbound channel closes
    pub async fn run(&self, mut rx: Receiver<ChatEvent>) {
        info!(target: EVENT_TARGET, "Moderation pipeline started");

        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }

        info!(target: EVENT_TARGET, "Event stream closed, pipeline stopping");
    }

    /// Dispatch a single inbound event
    pub async fn handle_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::NewMembers(event) => self.handle_new_members(&event).await,
            ChatEvent::Text(message) => self.handle_text_message(&message).await,
        }
    }

    /// Handle a join: restrict each new member, schedule the welcome cleanup
    /// and timed unlock, and credit the inviter
    pub async fn handle_new_members(&self, event: &NewMembersEvent) {
        for member in &event.members {
            if member.is_bot {
                continue;
            }

            self.data.set_restricted(member.id, true);
            info!(
                target: MODERATION_TARGET,
                user_id = member.id,
                chat_id = event.chat_id,
                "New member restricted to greetings"
            );

            if let Some(welcome_id) = self
                .try_send(
                    event.chat_id,
                    &responses::welcome(member.id),
                    MessageFormat::Html,
                )
                .await
            {
                self.scheduler.schedule_once(
                    Duration::from_secs(rules::WELCOME_DELETE_SECS),
                    DelayedAction::DeleteMessage {
                        chat_id: event.chat_id,
                        message_id: welcome_id,
                    },
                );
            }

            self.scheduler.schedule_once(
                Duration::from_secs(rules::AUTO_UNLOCK_SECS),
                DelayedAction::AutoUnlock {
                    chat_id: event.chat_id,
                    user_id: member.id,
                },
            );
        }

        self.track_invites(event).await;
    }

    /// Credit the inviter and unlock them once they cross the threshold
    async fn track_invites(&self, event: &NewMembersEvent) {
        let added = event.members.iter().filter(|m| !m.is_bot).count() as u32;
        if added == 0 {
            return;
        }

        let total = self.data.add_invites(event.inviter, added);
        info!(
            target: MODERATION_TARGET,
            user_id = event.inviter,
            added,
            total,
            "Invites credited"
        );

        if total >= rules::INVITE_UNLOCK_THRESHOLD && self.data.unlock(event.inviter) {
            info!(
                target: MODERATION_TARGET,
                user_id = event.inviter,
                "Unlocked via invite threshold"
            );
            self.try_send(
                event.chat_id,
                &responses::invite_unlock_notice(event.inviter),
                MessageFormat::Html,
            )
            .await;
        }
    }

    /// Run a text message through the rule entry points
    pub async fn handle_text_message(&self, message: &TextMessageEvent) {
        // Forward interception runs on its own, regardless of the text rules;
        // a second delete of the same message is a tolerated no-op.
        if let Some(decision) = rules::check_forward(message.is_forwarded) {
            self.apply_decision(message, decision).await;
        }

        let now = Utc::now();
        let (decision, window) = self.data.with_user(message.sender, |state| {
            let decision = rules::evaluate_message(&message.text, state);
            let window = state.record_message(now);
            (decision, window)
        });

        self.apply_decision(message, decision).await;

        if let Some(spam) = rules::check_spam(window) {
            self.apply_decision(message, spam).await;
        }
    }

    /// Execute a decision's side effects in order
    async fn apply_decision(&self, message: &TextMessageEvent, decision: Decision) {
        match decision {
            Decision::Allow => {}

            Decision::DeleteOnly { violation } => {
                self.log_decision(message, violation);
                self.try_delete(message.chat_id, message.message_id).await;

                let reply = match violation {
                    Violation::RestrictedNonGreeting => {
                        responses::restricted_notice(message.sender)
                    }
                    Violation::Link => responses::link_notice(message.sender),
                    Violation::Forward => responses::forward_notice(message.sender),
                    Violation::Blacklist(_) | Violation::Spam => return,
                };
                self.try_send(message.chat_id, &reply, MessageFormat::Html)
                    .await;
            }

            Decision::DeleteAndWarn { violation, count } => {
                self.log_decision(message, violation);
                self.try_delete(message.chat_id, message.message_id).await;
                self.try_send(
                    message.chat_id,
                    &responses::warning(message.sender, count),
                    MessageFormat::Html,
                )
                .await;
            }

            Decision::DeleteAndMute {
                violation,
                mute_secs,
            } => {
                self.log_decision(message, violation);
                self.try_delete(message.chat_id, message.message_id).await;
                self.try_restrict(message.chat_id, message.sender, mute_secs)
                    .await;

                let reply = match violation {
                    Violation::Spam => responses::spam_notice(message.sender),
                    _ => responses::mute_notice(message.sender),
                };
                self.try_send(message.chat_id, &reply, MessageFormat::Html)
                    .await;
            }
        }
    }

    fn log_decision(&self, message: &TextMessageEvent, violation: Violation) {
        info!(
            target: MODERATION_TARGET,
            user_id = message.sender,
            chat_id = message.chat_id,
            message_id = message.message_id,
            violation = %violation,
            "Message removed"
        );
    }

    /// Delete a message, logging and swallowing any failure
    async fn try_delete(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(e) = self.client.delete_message(chat_id, message_id).await {
            warn!(
                target: ERROR_TARGET,
                chat_id,
                message_id,
                error = %e,
                "Failed to delete message"
            );
        }
    }

    /// Send a message, logging and swallowing any failure
    async fn try_send(
        &self,
        chat_id: ChatId,
        text: &str,
        format: MessageFormat,
    ) -> Option<MessageId> {
        match self.client.send_message(chat_id, text, format).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                warn!(
                    target: ERROR_TARGET,
                    chat_id,
                    error = %e,
                    "Failed to send message"
                );
                None
            }
        }
    }

    /// Mute a member for `mute_secs`, logging and swallowing any failure
    async fn try_restrict(&self, chat_id: ChatId, user_id: UserId, mute_secs: i64) {
        let until = Utc::now() + chrono::Duration::seconds(mute_secs);
        if let Err(e) = self
            .client
            .restrict_user(chat_id, user_id, ChatPermissions::muted(), until)
            .await
        {
            warn!(
                target: ERROR_TARGET,
                chat_id,
                user_id,
                error = %e,
                "Failed to restrict user"
            );
        }
    }
}

/// Entry point for the scheduler's delayed actions
#[async_trait]
impl<C: ChatApi> ActionExecutor for Moderator<C> {
    async fn execute(&self, action: &DelayedAction) -> ScheduleResult<()> {
        match action {
            DelayedAction::DeleteMessage {
                chat_id,
                message_id,
            } => {
                self.try_delete(*chat_id, *message_id).await;
            }

            DelayedAction::AutoUnlock { chat_id, user_id } => {
                // The user may have been unlocked via invites since this was
                // scheduled; only the caller that flips the flag notifies.
                if self.data.unlock(*user_id) {
                    info!(
                        target: MODERATION_TARGET,
                        user_id = *user_id,
                        "Unlocked after timeout"
                    );
                    self.try_send(*chat_id, &responses::unlock_notice(), MessageFormat::Plain)
                        .await;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, Member, MockChatApi};
    use crate::rules::{SPAM_MUTE_SECS, WARNING_MUTE_SECS};
    use chrono::Duration as ChronoDuration;
    use mockall::predicate::eq;

    const CHAT: ChatId = -1000;
    const USER: UserId = 12345;
    const INVITER: UserId = 98765;

    fn join_event(inviter: UserId, members: Vec<Member>) -> NewMembersEvent {
        NewMembersEvent {
            chat_id: CHAT,
            inviter,
            members,
        }
    }

    fn human(id: UserId) -> Member {
        Member { id, is_bot: false }
    }

    fn text(sender: UserId, message_id: MessageId, text: &str) -> TextMessageEvent {
        TextMessageEvent {
            chat_id: CHAT,
            sender,
            message_id,
            text: text.to_string(),
            is_forwarded: false,
        }
    }

    fn moderator(client: MockChatApi) -> Moderator<MockChatApi> {
        Moderator::new(Data::new(), Scheduler::new(), client)
    }

    /// Rewind every pending task so run_due fires it
    async fn fire_pending(moderator: &Moderator<MockChatApi>) {
        for mut task in moderator.scheduler.store.get_all() {
            task.due_at = Utc::now() - ChronoDuration::seconds(1);
            moderator.scheduler.store.add(task);
        }
        moderator.scheduler.run_due(moderator).await;
    }

    #[tokio::test]
    async fn test_join_restricts_and_schedules() {
        let mut client = MockChatApi::new();
        client
            .expect_send_message()
            .times(1)
            .returning(|_, _, _| Ok(777));

        let moderator = moderator(client);
        moderator
            .handle_new_members(&join_event(
                INVITER,
                vec![human(USER), Member { id: 2, is_bot: true }],
            ))
            .await;

        // The human is restricted, the bot is not
        assert!(moderator.data().get(USER).restricted);
        assert!(!moderator.data().get(2).restricted);

        // One welcome delete plus one auto-unlock
        assert_eq!(moderator.scheduler.store.len(), 2);

        // Only the non-bot member counts as an invite
        assert_eq!(moderator.data().get(INVITER).invite_count, 1);
    }

    #[tokio::test]
    async fn test_join_scenario_delayed_actions() {
        let mut client = MockChatApi::new();
        // Welcome notice
        client
            .expect_send_message()
            .times(1)
            .returning(|_, _, _| Ok(777));

        let moderator = moderator(client);
        moderator
            .handle_new_members(&join_event(INVITER, vec![human(USER)]))
            .await;

        // Later: the welcome message is deleted and the user unlocked
        let mut client = MockChatApi::new();
        client
            .expect_delete_message()
            .with(eq(CHAT), eq(777))
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("unlocked"))
            .times(1)
            .returning(|_, _, _| Ok(778));

        let moderator = Moderator::new(
            moderator.data.clone(),
            moderator.scheduler.clone(),
            client,
        );
        fire_pending(&moderator).await;

        assert!(!moderator.data().get(USER).restricted);
        assert!(moderator.scheduler.store.is_empty());
    }

    #[tokio::test]
    async fn test_invite_unlock_exactly_once() {
        let mut client = MockChatApi::new();
        // Five welcome notices plus exactly one congratulation
        client
            .expect_send_message()
            .returning(|_, _, _| Ok(1));

        let moderator = moderator(client);
        moderator.data().set_restricted(INVITER, true);

        for id in 1..=4 {
            moderator
                .handle_new_members(&join_event(INVITER, vec![human(id)]))
                .await;
            assert!(moderator.data().get(INVITER).restricted);
        }

        moderator
            .handle_new_members(&join_event(INVITER, vec![human(5)]))
            .await;
        assert!(!moderator.data().get(INVITER).restricted);
        assert_eq!(moderator.data().get(INVITER).invite_count, 5);

        // Further joins keep accumulating but never unlock again
        moderator
            .handle_new_members(&join_event(INVITER, vec![human(6)]))
            .await;
        assert_eq!(moderator.data().get(INVITER).invite_count, 6);
        assert!(!moderator.data().get(INVITER).restricted);
    }

    #[tokio::test]
    async fn test_invite_unlock_notice_sent_once() {
        let mut client = MockChatApi::new();
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("Congratulations"))
            .times(1)
            .returning(|_, _, _| Ok(1));
        // Welcome notices for the joining members
        client
            .expect_send_message()
            .withf(|_, text, _| !text.contains("Congratulations"))
            .returning(|_, _, _| Ok(1));

        let moderator = moderator(client);
        moderator.data().set_restricted(INVITER, true);

        moderator
            .handle_new_members(&join_event(
                INVITER,
                (1..=5).map(human).collect(),
            ))
            .await;
        moderator
            .handle_new_members(&join_event(INVITER, vec![human(6)]))
            .await;
    }

    #[tokio::test]
    async fn test_auto_unlock_is_noop_after_invite_unlock() {
        let mut client = MockChatApi::new();
        // No unlock notice may go out
        client.expect_send_message().never();
        client.expect_delete_message().never();

        let moderator = moderator(client);
        moderator.data().set_restricted(USER, false);

        moderator
            .execute(&DelayedAction::AutoUnlock {
                chat_id: CHAT,
                user_id: USER,
            })
            .await
            .unwrap();

        assert!(!moderator.data().get(USER).restricted);
    }

    #[tokio::test]
    async fn test_restricted_greeting_passes() {
        let mut client = MockChatApi::new();
        client.expect_delete_message().never();
        client.expect_send_message().never();

        let moderator = moderator(client);
        moderator.data().set_restricted(USER, true);

        moderator.handle_text_message(&text(USER, 1, "Hi")).await;
        assert!(moderator.data().get(USER).restricted);
    }

    #[tokio::test]
    async fn test_restricted_other_text_deleted() {
        let mut client = MockChatApi::new();
        client
            .expect_delete_message()
            .with(eq(CHAT), eq(1))
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("only say 'Hi'"))
            .times(1)
            .returning(|_, _, _| Ok(2));

        let moderator = moderator(client);
        moderator.data().set_restricted(USER, true);

        moderator
            .handle_text_message(&text(USER, 1, "hello everyone, great to be here"))
            .await;
    }

    #[tokio::test]
    async fn test_blacklist_warns_then_mutes() {
        let mut client = MockChatApi::new();
        client
            .expect_delete_message()
            .times(3)
            .returning(|_, _| Ok(()));
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("Warning 1/3"))
            .times(1)
            .returning(|_, _, _| Ok(2));
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("Warning 2/3"))
            .times(1)
            .returning(|_, _, _| Ok(3));
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("Muted for 2 hours"))
            .times(1)
            .returning(|_, _, _| Ok(4));
        client
            .expect_restrict_user()
            .withf(|_, user_id, permissions, until| {
                *user_id == USER
                    && !permissions.can_send_messages
                    && (*until - Utc::now()).num_seconds() > WARNING_MUTE_SECS - 60
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let moderator = moderator(client);

        moderator
            .handle_text_message(&text(USER, 1, "I sell xxx content"))
            .await;
        assert_eq!(moderator.data().get(USER).warning_count, 1);

        moderator.handle_text_message(&text(USER, 2, "porn")).await;
        assert_eq!(moderator.data().get(USER).warning_count, 2);

        moderator
            .handle_text_message(&text(USER, 3, "nude pics here"))
            .await;
        assert_eq!(moderator.data().get(USER).warning_count, 0);
    }

    #[tokio::test]
    async fn test_link_deleted_without_warning() {
        let mut client = MockChatApi::new();
        client
            .expect_delete_message()
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("Links are not allowed"))
            .times(1)
            .returning(|_, _, _| Ok(2));

        let moderator = moderator(client);
        moderator
            .handle_text_message(&text(USER, 1, "check this out http://example.com"))
            .await;

        assert_eq!(moderator.data().get(USER).warning_count, 0);
    }

    #[tokio::test]
    async fn test_forwarded_message_from_restricted_user_double_delete() {
        let mut client = MockChatApi::new();
        // Both entry points delete; the second attempt failing is tolerated
        client
            .expect_delete_message()
            .times(2)
            .returning(|chat_id, message_id| {
                static FIRST: std::sync::atomic::AtomicBool =
                    std::sync::atomic::AtomicBool::new(true);
                if FIRST.swap(false, std::sync::atomic::Ordering::SeqCst) {
                    Ok(())
                } else {
                    Err(ClientError::MessageNotFound {
                        chat_id,
                        message_id,
                    })
                }
            });
        client.expect_send_message().returning(|_, _, _| Ok(2));

        let moderator = moderator(client);
        moderator.data().set_restricted(USER, true);

        let mut message = text(USER, 1, "look at this");
        message.is_forwarded = true;
        moderator.handle_text_message(&message).await;
    }

    #[tokio::test]
    async fn test_spam_burst_mutes_once() {
        let mut client = MockChatApi::new();
        client
            .expect_delete_message()
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_send_message()
            .withf(|_, text, _| text.contains("Spam detected"))
            .times(1)
            .returning(|_, _, _| Ok(2));
        client
            .expect_restrict_user()
            .withf(|_, _, _, until| {
                let secs = (*until - Utc::now()).num_seconds();
                secs > SPAM_MUTE_SECS - 60 && secs <= SPAM_MUTE_SECS + 60
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let moderator = moderator(client);

        // Six clean messages in one burst: only the sixth crosses the limit
        for i in 1..=6 {
            moderator
                .handle_text_message(&text(USER, i, "nice weather today"))
                .await;
        }
    }

    #[tokio::test]
    async fn test_adapter_failures_do_not_stop_processing() {
        let mut client = MockChatApi::new();
        client
            .expect_delete_message()
            .returning(|_, _| Err(ClientError::PermissionDenied("no rights".to_string())));
        client
            .expect_send_message()
            .returning(|_, _, _| Err(ClientError::Network("offline".to_string())));

        let moderator = moderator(client);
        moderator.data().set_restricted(USER, true);

        // Both events survive the failing adapter; state still advances
        moderator
            .handle_text_message(&text(USER, 1, "not a greeting"))
            .await;
        moderator
            .handle_text_message(&text(USER, 2, "still not a greeting"))
            .await;

        assert_eq!(moderator.data().get(USER).recent_messages.len(), 2);
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let mut client = MockChatApi::new();
        client
            .expect_send_message()
            .times(1)
            .returning(|_, _, _| Ok(777));

        let moderator = std::sync::Arc::new(moderator(client));
        let (tx, rx) = tokio::sync::mpsc::channel(8);

        let runner = {
            let moderator = moderator.clone();
            tokio::spawn(async move { moderator.run(rx).await })
        };

        tx.send(ChatEvent::NewMembers(join_event(INVITER, vec![human(USER)])))
            .await
            .unwrap();
        tx.send(ChatEvent::Text(text(USER, 1, "hi")))
            .await
            .unwrap();
        drop(tx);

        runner.await.unwrap();
        assert!(moderator.data().get(USER).restricted);
    }
}
