use crate::attachments::{discard, DynAttachmentStore};
use crate::config::ChatConfig;
use crate::conversations::ConversationService;
use crate::error::AppResult;
use crate::ids::{ConversationId, MessageId, ProfileId};
use crate::messages::domain::{validate_text, LastMessage, Message, MessageDraft, NewMessage};
use crate::messages::repository::DynMessageRepository;

#[derive(Clone)]
pub struct MessageService {
    conversations: ConversationService,
    messages: DynMessageRepository,
    attachments: DynAttachmentStore,
    limits: ChatConfig,
}

impl MessageService {
    pub fn new(
        conversations: ConversationService,
        messages: DynMessageRepository,
        attachments: DynAttachmentStore,
        limits: ChatConfig,
    ) -> Self {
        Self {
            conversations,
            messages,
            attachments,
            limits,
        }
    }

    /// Validate, store the attachment if any, and append. The conversation
    /// must exist and `sender` must take part in it.
    pub async fn append(
        &self,
        conversation: &ConversationId,
        sender: &ProfileId,
        draft: MessageDraft,
    ) -> AppResult<Message> {
        validate_text(&draft.text, draft.attachment.is_some(), self.limits.max_text_len)?;
        self.conversations
            .get_for_participant(conversation, sender)
            .await?;

        let attachment = match &draft.attachment {
            Some(payload) => {
                let decoded = payload.decode(self.limits.max_attachment_bytes)?;
                Some(self.attachments.put(decoded).await?)
            }
            None => None,
        };

        let appended = self
            .messages
            .append(&NewMessage {
                id: MessageId::generate(),
                conversation: conversation.clone(),
                sender: sender.clone(),
                text: draft.text,
                attachment: attachment.clone(),
            })
            .await;
        let message = match appended {
            Ok(message) => message,
            Err(e) => {
                if let Some(stored) = attachment {
                    discard(&self.attachments, &[stored]).await;
                }
                return Err(e.into());
            }
        };

        tracing::debug!("Appended message {} to {}", message.id, conversation);
        Ok(message)
    }

    pub async fn last_message(&self, conversation: &ConversationId) -> AppResult<LastMessage> {
        Ok(self.messages.last_message(conversation).await?)
    }

    pub async fn list_for_conversation(
        &self,
        conversation: &ConversationId,
    ) -> AppResult<Vec<Message>> {
        Ok(self.messages.list_for_conversation(conversation).await?)
    }
}
