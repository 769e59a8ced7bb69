use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ConversationId, ProfileId, ProfilePair};
use crate::messages::{LastMessage, Message};

/// A persistent two-party conversation. There is at most one per unordered
/// pair of profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub initiator: ProfileId,
    pub receiver: ProfileId,
    pub created_at: String,
}

impl Conversation {
    pub fn is_participant(&self, profile: &ProfileId) -> bool {
        &self.initiator == profile || &self.receiver == profile
    }

    /// Ok when `profile` may read or write this conversation.
    pub fn ensure_participant(&self, profile: &ProfileId) -> Result<(), ConversationError> {
        if self.is_participant(profile) {
            Ok(())
        } else {
            Err(ConversationError::Forbidden(
                "Not a participant of this conversation".into(),
            ))
        }
    }
}

/// Conversation list entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: LastMessage,
}

/// Full conversation with its message log, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversationError {
    NotFound,
    Forbidden(String),
    InvalidTarget(String),
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Conversation does not exist"),
            Self::Forbidden(msg) => write!(f, "{}", msg),
            Self::InvalidTarget(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ConversationError {}

/// Canonical key of the conversation between `a` and `b`.
pub fn pair_for(a: &ProfileId, b: &ProfileId) -> Result<ProfilePair, ConversationError> {
    ProfilePair::new(a, b).ok_or_else(|| {
        ConversationError::InvalidTarget("A conversation needs two different profiles".into())
    })
}
