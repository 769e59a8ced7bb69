use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::attachments::AttachmentError;
use crate::connections::ConnectionError;
use crate::conversations::ConversationError;
use crate::db::RepositoryError;
use crate::messages::MessageError;
use crate::profiles::ProfileError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("A connection request between these profiles already exists")]
    DuplicateRequest,

    #[error("A conversation between these profiles already exists")]
    DuplicateConversation,

    #[error("This user already has a profile")]
    DuplicateProfile,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Stable machine-readable name used in the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidTarget(_) => "invalid_target",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::DuplicateRequest => "duplicate_request",
            AppError::DuplicateConversation => "duplicate_conversation",
            AppError::DuplicateProfile => "duplicate_profile",
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => "internal",
            AppError::Json(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition(_)
            | AppError::DuplicateRequest
            | AppError::DuplicateConversation
            | AppError::DuplicateProfile => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show a client. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) | AppError::Json(_) => {
                "Internal server error".to_string()
            }
            AppError::NotFound => "Not found".to_string(),
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::InvalidTarget(msg)
            | AppError::InvalidTransition(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => AppError::NotFound,
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::Conflict(msg) => AppError::Internal(format!("Conflict: {}", msg)),
        }
    }
}

impl From<AttachmentError> for AppError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::Storage(msg) => AppError::Internal(msg),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => AppError::NotFound,
            ProfileError::DuplicateProfile => AppError::DuplicateProfile,
            ProfileError::Validation(msg) => AppError::Validation(msg),
            ProfileError::Attachment(e) => e.into(),
        }
    }
}

impl From<ConnectionError> for AppError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotFound => AppError::NotFound,
            ConnectionError::Forbidden(msg) => AppError::Forbidden(msg),
            ConnectionError::InvalidTarget(msg) => AppError::InvalidTarget(msg),
            ConnectionError::InvalidTransition(msg) => AppError::InvalidTransition(msg),
            ConnectionError::DuplicateRequest => AppError::DuplicateRequest,
            ConnectionError::DuplicateConversation => AppError::DuplicateConversation,
        }
    }
}

impl From<ConversationError> for AppError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound => AppError::NotFound,
            ConversationError::Forbidden(msg) => AppError::Forbidden(msg),
            ConversationError::InvalidTarget(msg) => AppError::InvalidTarget(msg),
        }
    }
}

impl From<MessageError> for AppError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::Attachment(e) => e.into(),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!("{}", self);
        }

        (
            self.status(),
            Json(json!({ "error": self.kind(), "message": self.public_message() })),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
