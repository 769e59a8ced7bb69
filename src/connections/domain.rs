// Connection request state machine - pure, no side effects
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ProfileId, ProfilePair, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a request the listing profile is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestRole {
    Sent,
    Received,
    #[default]
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub id: RequestId,
    pub sender: ProfileId,
    pub receiver: ProfileId,
    pub status: RequestStatus,
    pub created_at: String,
}

/// What an allowed status change does. Both outcomes remove the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Open (or reuse) the pair's conversation, then delete the request.
    Accept,
    /// Delete the request.
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    NotFound,
    Forbidden(String),
    InvalidTarget(String),
    InvalidTransition(String),
    DuplicateRequest,
    DuplicateConversation,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Connection request does not exist"),
            Self::Forbidden(msg) => write!(f, "{}", msg),
            Self::InvalidTarget(msg) => write!(f, "{}", msg),
            Self::InvalidTransition(msg) => write!(f, "{}", msg),
            Self::DuplicateRequest => write!(f, "A request between these profiles already exists"),
            Self::DuplicateConversation => {
                write!(f, "These profiles already have a conversation")
            }
        }
    }
}

impl std::error::Error for ConnectionError {}

impl ConnectionRequest {
    /// A fresh pending request. Sending to oneself is not a request.
    pub fn new(
        sender: ProfileId,
        receiver: ProfileId,
        created_at: String,
    ) -> Result<Self, ConnectionError> {
        if sender == receiver {
            return Err(ConnectionError::InvalidTarget(
                "Cannot send a connection request to yourself".into(),
            ));
        }
        Ok(Self {
            id: RequestId::generate(),
            sender,
            receiver,
            status: RequestStatus::Pending,
            created_at,
        })
    }

    pub fn pair(&self) -> Option<ProfilePair> {
        ProfilePair::new(&self.sender, &self.receiver)
    }

    pub fn involves(&self, profile: &ProfileId) -> bool {
        &self.sender == profile || &self.receiver == profile
    }

    /// Transition check: only the receiver may decide, only once, and only
    /// to a terminal status.
    pub fn decide(
        &self,
        status: RequestStatus,
        acting: &ProfileId,
    ) -> Result<Decision, ConnectionError> {
        if acting != &self.receiver {
            return Err(ConnectionError::Forbidden(
                "Only the receiver can answer a connection request".into(),
            ));
        }
        if self.status != RequestStatus::Pending {
            return Err(ConnectionError::InvalidTransition(format!(
                "Request is already {}",
                self.status
            )));
        }
        match status {
            RequestStatus::Accepted => Ok(Decision::Accept),
            RequestStatus::Rejected => Ok(Decision::Reject),
            RequestStatus::Pending => Err(ConnectionError::InvalidTransition(
                "A request can only be accepted or rejected".into(),
            )),
        }
    }

    /// Either side may take a pending request back.
    pub fn check_withdraw(&self, acting: &ProfileId) -> Result<(), ConnectionError> {
        if !self.involves(acting) {
            return Err(ConnectionError::Forbidden(
                "Not a party to this connection request".into(),
            ));
        }
        Ok(())
    }
}
