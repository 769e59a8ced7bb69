// Message types and validation - pure, no I/O
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::attachments::{AttachmentError, AttachmentPayload, StoredAttachment};
use crate::ids::{ConversationId, MessageId, ProfileId};

/// One immutable entry of a conversation's log. This is also the shape
/// broadcast to realtime listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation: ConversationId,
    pub sender: ProfileId,
    pub text: String,
    pub attachment_url: Option<String>,
    pub created_at: String,
}

/// Most recent message of a conversation, with an explicit marker for an
/// empty log. Serializes as the message or `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LastMessage {
    Some(Message),
    None,
}

impl LastMessage {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Some(message) => Some(message),
            Self::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<Option<Message>> for LastMessage {
    fn from(message: Option<Message>) -> Self {
        match message {
            Some(message) => Self::Some(message),
            None => Self::None,
        }
    }
}

/// What a participant sends, over REST or the realtime channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDraft {
    #[serde(default, alias = "conversation_message")]
    pub text: String,
    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
}

/// A validated message ready to be appended.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: MessageId,
    pub conversation: ConversationId,
    pub sender: ProfileId,
    pub text: String,
    pub attachment: Option<StoredAttachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageError {
    Empty,
    TooLong { max: usize },
    Attachment(AttachmentError),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Message needs text or an attachment"),
            Self::TooLong { max } => write!(f, "Message text exceeds {} characters", max),
            Self::Attachment(e) => write!(f, "Invalid attachment: {}", e),
        }
    }
}

impl std::error::Error for MessageError {}

impl From<AttachmentError> for MessageError {
    fn from(err: AttachmentError) -> Self {
        Self::Attachment(err)
    }
}

/// Text may be empty only when an attachment carries the message.
pub fn validate_text(text: &str, has_attachment: bool, max_chars: usize) -> Result<(), MessageError> {
    if text.trim().is_empty() && !has_attachment {
        return Err(MessageError::Empty);
    }
    if text.chars().count() > max_chars {
        return Err(MessageError::TooLong { max: max_chars });
    }
    Ok(())
}
