use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::attachments::{DynAttachmentStore, LocalAttachmentStore};
use crate::config::Config;
use crate::connections::{ConnectionService, SqliteConnectionRepository};
use crate::conversations::{ConversationService, SqliteConversationRepository};
use crate::messages::{MessageService, SqliteMessageRepository};
use crate::profiles::{ProfileService, SqliteProfileRepository};
use crate::realtime::{ChatHub, LocalBroker};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub attachments: DynAttachmentStore,
    pub profiles: ProfileService,
    pub connections: ConnectionService,
    pub conversations: ConversationService,
    pub hub: ChatHub,
}

impl AppState {
    /// Wire the SQLite repositories, the upload directory and an in-process
    /// broker around one pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        let attachments: DynAttachmentStore =
            Arc::new(LocalAttachmentStore::new(config.uploads_path()));

        let profile_repo = Arc::new(SqliteProfileRepository::new(db.clone()));
        let conversation_repo = Arc::new(SqliteConversationRepository::new(db.clone()));
        let message_repo = Arc::new(SqliteMessageRepository::new(db.clone()));
        let connection_repo = Arc::new(SqliteConnectionRepository::new(db.clone()));

        let profiles = ProfileService::new(
            profile_repo.clone(),
            attachments.clone(),
            config.chat.max_attachment_bytes,
        );
        let conversations = ConversationService::new(
            conversation_repo.clone(),
            message_repo.clone(),
            profile_repo.clone(),
        );
        let connections = ConnectionService::new(connection_repo, conversation_repo, profile_repo);
        let messages = MessageService::new(
            conversations.clone(),
            message_repo,
            attachments.clone(),
            config.chat.clone(),
        );
        let hub = ChatHub::new(Arc::new(LocalBroker::new()), messages);

        Self {
            db,
            config,
            attachments,
            profiles,
            connections,
            conversations,
            hub,
        }
    }
}
