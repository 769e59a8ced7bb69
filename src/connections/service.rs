use serde::Serialize;

use crate::connections::domain::{
    ConnectionError, ConnectionRequest, Decision, RequestRole, RequestStatus,
};
use crate::connections::repository::DynConnectionRepository;
use crate::conversations::{Conversation, DynConversationRepository};
use crate::db::{now_timestamp, RepositoryError};
use crate::error::{AppError, AppResult};
use crate::ids::{ProfileId, RequestId};
use crate::profiles::DynProfileRepository;

/// Result of answering a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusOutcome {
    Accepted { conversation: Conversation },
    Rejected,
}

#[derive(Clone)]
pub struct ConnectionService {
    requests: DynConnectionRepository,
    conversations: DynConversationRepository,
    profiles: DynProfileRepository,
}

impl ConnectionService {
    pub fn new(
        requests: DynConnectionRepository,
        conversations: DynConversationRepository,
        profiles: DynProfileRepository,
    ) -> Self {
        Self {
            requests,
            conversations,
            profiles,
        }
    }

    pub async fn create_request(
        &self,
        sender: &ProfileId,
        receiver: &ProfileId,
    ) -> AppResult<ConnectionRequest> {
        let request = ConnectionRequest::new(sender.clone(), receiver.clone(), now_timestamp())?;

        if self.profiles.get(receiver).await?.is_none() {
            return Err(ConnectionError::InvalidTarget(
                "Receiver profile does not exist".into(),
            )
            .into());
        }

        if let Some(pair) = request.pair() {
            if self.conversations.find_by_pair(&pair).await?.is_some() {
                return Err(ConnectionError::DuplicateConversation.into());
            }
        }

        self.requests.create(&request).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AppError::from(ConnectionError::DuplicateRequest),
            other => other.into(),
        })?;

        tracing::info!(
            "Connection request {} from {} to {}",
            request.id,
            sender,
            receiver
        );
        Ok(request)
    }

    async fn load(&self, id: &RequestId) -> AppResult<ConnectionRequest> {
        self.requests
            .get(id)
            .await?
            .ok_or_else(|| ConnectionError::NotFound.into())
    }

    /// Receiver answers a pending request. Either way the request is gone
    /// afterwards; on acceptance the pair's conversation is returned.
    pub async fn update_status(
        &self,
        id: &RequestId,
        status: RequestStatus,
        acting: &ProfileId,
    ) -> AppResult<StatusOutcome> {
        let request = self.load(id).await?;

        match request.decide(status, acting)? {
            Decision::Accept => {
                let (conversation, created) =
                    self.requests.accept(&request).await.map_err(|e| match e {
                        // Lost a race with another answer or a withdrawal
                        RepositoryError::NotFound(_) => AppError::from(ConnectionError::NotFound),
                        other => other.into(),
                    })?;
                tracing::info!(
                    "Request {} accepted, conversation {}{}",
                    request.id,
                    conversation.id,
                    if created { " created" } else { " reused" }
                );
                Ok(StatusOutcome::Accepted { conversation })
            }
            Decision::Reject => {
                if !self.requests.delete(&request.id).await? {
                    return Err(ConnectionError::NotFound.into());
                }
                tracing::info!("Request {} rejected", request.id);
                Ok(StatusOutcome::Rejected)
            }
        }
    }

    pub async fn list_requests(
        &self,
        profile: &ProfileId,
        role: RequestRole,
    ) -> AppResult<Vec<ConnectionRequest>> {
        Ok(self.requests.list(profile, role).await?)
    }

    /// Sender or receiver deletes a pending request.
    pub async fn withdraw(&self, id: &RequestId, acting: &ProfileId) -> AppResult<()> {
        let request = self.load(id).await?;
        request.check_withdraw(acting)?;
        if !self.requests.delete(&request.id).await? {
            return Err(ConnectionError::NotFound.into());
        }
        tracing::info!("Request {} withdrawn by {}", request.id, acting);
        Ok(())
    }
}
