// Per-conversation chat channel: inbound frames are persisted, then
// broadcast to the conversation's group.
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, OwnedMutexGuard};

use crate::error::{AppError, AppResult};
use crate::ids::{ConversationId, ProfileId};
use crate::messages::{Message, MessageDraft, MessageService};
use crate::realtime::broker::{ConnId, DynBroker, Frame};

/// One participant's live connection to a conversation.
#[derive(Debug, Clone)]
pub struct ChannelSession {
    pub conversation: ConversationId,
    pub profile: ProfileId,
    pub conn: ConnId,
}

/// What happened to one inbound frame.
#[derive(Debug)]
pub enum FrameOutcome {
    Delivered(Message),
    Dropped,
    Failed,
}

/// Per-group turn lock held across persist + publish, so members see
/// messages in the order they were stored.
#[derive(Default)]
struct Sequencer {
    turns: Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Sequencer {
    async fn turn(&self, group: &ConversationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut turns = self.turns.lock().unwrap_or_else(|e| e.into_inner());
            turns.entry(group.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forget locks nobody is holding or waiting on.
    fn prune(&self) {
        let mut turns = self.turns.lock().unwrap_or_else(|e| e.into_inner());
        turns.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

#[derive(Clone)]
pub struct ChatHub {
    broker: DynBroker,
    messages: MessageService,
    sequencer: Arc<Sequencer>,
}

impl ChatHub {
    pub fn new(broker: DynBroker, messages: MessageService) -> Self {
        Self {
            broker,
            messages,
            sequencer: Arc::new(Sequencer::default()),
        }
    }

    pub fn messages(&self) -> &MessageService {
        &self.messages
    }

    /// Join the conversation's group. The caller has already checked that
    /// `profile` participates.
    pub fn join(
        &self,
        conversation: ConversationId,
        profile: ProfileId,
    ) -> (ChannelSession, mpsc::UnboundedReceiver<Frame>) {
        let conn = ConnId::generate();
        let rx = self.broker.join(&conversation, conn);
        tracing::info!("Profile {} connected to {} as {}", profile, conversation, conn);
        (
            ChannelSession {
                conversation,
                profile,
                conn,
            },
            rx,
        )
    }

    pub fn leave(&self, session: &ChannelSession) {
        self.broker.leave(&session.conversation, session.conn);
        self.sequencer.prune();
        tracing::info!(
            "Profile {} disconnected from {}",
            session.profile,
            session.conversation
        );
    }

    /// Persist, then publish to every member including the sender. Both
    /// steps happen inside the group's turn.
    pub async fn deliver(
        &self,
        conversation: &ConversationId,
        sender: &ProfileId,
        draft: MessageDraft,
    ) -> AppResult<Message> {
        let delivered = {
            let _turn = self.sequencer.turn(conversation).await;
            self.persist_and_publish(conversation, sender, draft).await
        };
        self.sequencer.prune();
        delivered
    }

    async fn persist_and_publish(
        &self,
        conversation: &ConversationId,
        sender: &ProfileId,
        draft: MessageDraft,
    ) -> AppResult<Message> {
        let message = self.messages.append(conversation, sender, draft).await?;
        let frame: Frame = serde_json::to_string(&message)?.into();
        let reached = self.broker.publish(conversation, frame);

        tracing::debug!(
            "Message {} published to {} member(s) of {}",
            message.id,
            reached,
            conversation
        );
        Ok(message)
    }

    /// Handle one text frame from a connection. Bad frames are dropped;
    /// a failed write is reported to the sender alone.
    pub async fn handle_frame(&self, session: &ChannelSession, raw: &str) -> FrameOutcome {
        let draft: MessageDraft = match serde_json::from_str(raw) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(
                    "Dropping malformed frame from {} on {}: {}",
                    session.profile,
                    session.conversation,
                    e
                );
                return FrameOutcome::Dropped;
            }
        };

        match self
            .deliver(&session.conversation, &session.profile, draft)
            .await
        {
            Ok(message) => FrameOutcome::Delivered(message),
            Err(AppError::Validation(reason)) => {
                tracing::warn!(
                    "Dropping invalid message from {} on {}: {}",
                    session.profile,
                    session.conversation,
                    reason
                );
                FrameOutcome::Dropped
            }
            Err(e) => {
                tracing::error!(
                    "Delivery failed for {} on {}: {}",
                    session.profile,
                    session.conversation,
                    e
                );
                let frame = json!({ "error": "delivery_failed", "detail": e.public_message() });
                self.broker
                    .send_to(&session.conversation, session.conn, frame.to_string().into());
                FrameOutcome::Failed
            }
        }
    }
}
