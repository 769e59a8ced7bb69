pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{Conversation, ConversationDetail, ConversationError, ConversationSummary};
pub use repository::{
    ConversationRepository, DynConversationRepository, SqliteConversationRepository,
};
pub use service::ConversationService;
