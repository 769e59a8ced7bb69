pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{LastMessage, Message, MessageDraft, MessageError};
pub use repository::{DynMessageRepository, MessageRepository, SqliteMessageRepository};
pub use service::MessageService;
