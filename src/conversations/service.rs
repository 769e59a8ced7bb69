use crate::conversations::domain::{
    pair_for, Conversation, ConversationDetail, ConversationError, ConversationSummary,
};
use crate::conversations::repository::DynConversationRepository;
use crate::error::AppResult;
use crate::ids::{ConversationId, ProfileId};
use crate::messages::repository::DynMessageRepository;
use crate::profiles::repository::DynProfileRepository;

#[derive(Clone)]
pub struct ConversationService {
    conversations: DynConversationRepository,
    messages: DynMessageRepository,
    profiles: DynProfileRepository,
}

impl ConversationService {
    pub fn new(
        conversations: DynConversationRepository,
        messages: DynMessageRepository,
        profiles: DynProfileRepository,
    ) -> Self {
        Self {
            conversations,
            messages,
            profiles,
        }
    }

    /// Returns the pair's conversation, creating it with `a` as initiator
    /// when absent. The flag is true when it was created.
    pub async fn get_or_create(
        &self,
        a: &ProfileId,
        b: &ProfileId,
    ) -> AppResult<(Conversation, bool)> {
        pair_for(a, b)?;
        Ok(self.conversations.get_or_create(a, b).await?)
    }

    /// Start talking to `participant`. Fails when that profile does not exist.
    pub async fn start(
        &self,
        initiator: &ProfileId,
        participant: &ProfileId,
    ) -> AppResult<(Conversation, bool)> {
        pair_for(initiator, participant)?;
        if self.profiles.get(participant).await?.is_none() {
            return Err(ConversationError::NotFound.into());
        }
        self.get_or_create(initiator, participant).await
    }

    pub async fn list_for_profile(
        &self,
        profile: &ProfileId,
    ) -> AppResult<Vec<ConversationSummary>> {
        Ok(self.conversations.list_for_profile(profile).await?)
    }

    /// The conversation, provided `viewer` takes part in it.
    pub async fn get_for_participant(
        &self,
        id: &ConversationId,
        viewer: &ProfileId,
    ) -> AppResult<Conversation> {
        let conversation = self
            .conversations
            .get(id)
            .await?
            .ok_or(ConversationError::NotFound)?;
        conversation.ensure_participant(viewer)?;
        Ok(conversation)
    }

    pub async fn get(
        &self,
        id: &ConversationId,
        viewer: &ProfileId,
    ) -> AppResult<ConversationDetail> {
        let conversation = self.get_for_participant(id, viewer).await?;
        let messages = self.messages.list_for_conversation(id).await?;
        Ok(ConversationDetail {
            conversation,
            messages,
        })
    }
}
