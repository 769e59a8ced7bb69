// Attachment decoding and the file storage collaborator.
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

const MAX_FORMAT_LEN: usize = 10;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttachmentError {
    #[error("Attachment is not valid base64")]
    InvalidEncoding,

    #[error("Attachment is empty")]
    Empty,

    #[error("Attachment exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("Unsupported attachment format: {0}")]
    InvalidFormat(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Attachment as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    /// Base64 content, optionally as a `data:...;base64,` URL.
    pub data: String,
    /// File extension, e.g. `png`.
    pub format: String,
}

/// Decoded attachment ready to be stored.
#[derive(Debug, Clone)]
pub struct DecodedAttachment {
    pub file_name: String,
    pub content: Bytes,
}

/// Where an attachment ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAttachment {
    pub file_name: String,
    pub url: String,
}

impl AttachmentPayload {
    /// Decode the content and name it with a fresh random token plus the
    /// declared extension. Names never derive from the content.
    pub fn decode(&self, max_bytes: usize) -> Result<DecodedAttachment, AttachmentError> {
        let format = normalize_format(&self.format)?;

        let encoded = match self.data.split_once(',') {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.data.as_str(),
        };
        let encoded = encoded.trim();

        // Cheap upper bound before allocating: 4 chars encode 3 bytes.
        if encoded.len() / 4 * 3 > max_bytes + 3 {
            return Err(AttachmentError::TooLarge { max: max_bytes });
        }

        let content = STANDARD
            .decode(encoded)
            .map_err(|_| AttachmentError::InvalidEncoding)?;
        if content.is_empty() {
            return Err(AttachmentError::Empty);
        }
        if content.len() > max_bytes {
            return Err(AttachmentError::TooLarge { max: max_bytes });
        }

        Ok(DecodedAttachment {
            file_name: format!("{}.{}", random_token(), format),
            content: Bytes::from(content),
        })
    }
}

fn normalize_format(format: &str) -> Result<String, AttachmentError> {
    let format = format.trim().trim_start_matches('.').to_ascii_lowercase();
    if format.is_empty()
        || format.len() > MAX_FORMAT_LEN
        || !format.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AttachmentError::InvalidFormat(format));
    }
    Ok(format)
}

/// 8 random bytes as 16 hex chars.
fn random_token() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Stored file names are always `<16 hex>.<alnum ext>`; anything else is
/// refused before touching the filesystem.
pub fn is_valid_file_name(name: &str) -> bool {
    let Some((token, ext)) = name.split_once('.') else {
        return false;
    };
    token.len() == 16
        && token.chars().all(|c| c.is_ascii_hexdigit())
        && normalize_format(ext).map(|e| e == ext).unwrap_or(false)
}

/// Storage collaborator: takes decoded bytes and a name, hands back a
/// retrievable reference. Location and retention are its own business.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn put(&self, attachment: DecodedAttachment)
        -> Result<StoredAttachment, AttachmentError>;

    async fn get(&self, file_name: &str) -> Result<Option<Bytes>, AttachmentError>;

    /// Drop a stored attachment. Removing one that is already gone is fine.
    async fn remove(&self, file_name: &str) -> Result<(), AttachmentError>;
}

/// Best-effort cleanup of files whose owning row was never written.
pub async fn discard(store: &DynAttachmentStore, stored: &[StoredAttachment]) {
    for attachment in stored {
        if let Err(e) = store.remove(&attachment.file_name).await {
            tracing::warn!("Failed to remove orphaned attachment {}: {}", attachment.file_name, e);
        }
    }
}

pub type DynAttachmentStore = Arc<dyn AttachmentStore>;

/// Writes attachments into a directory and serves them under `/media/`.
pub struct LocalAttachmentStore {
    root: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn put(
        &self,
        attachment: DecodedAttachment,
    ) -> Result<StoredAttachment, AttachmentError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AttachmentError::Storage(e.to_string()))?;

        let path = self.root.join(&attachment.file_name);
        tokio::fs::write(&path, &attachment.content)
            .await
            .map_err(|e| AttachmentError::Storage(e.to_string()))?;

        tracing::debug!(
            "Stored attachment {} ({} bytes)",
            attachment.file_name,
            attachment.content.len()
        );

        Ok(StoredAttachment {
            url: format!("/media/{}", attachment.file_name),
            file_name: attachment.file_name,
        })
    }

    async fn get(&self, file_name: &str) -> Result<Option<Bytes>, AttachmentError> {
        if !is_valid_file_name(file_name) {
            return Ok(None);
        }
        match tokio::fs::read(self.root.join(file_name)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AttachmentError::Storage(e.to_string())),
        }
    }

    async fn remove(&self, file_name: &str) -> Result<(), AttachmentError> {
        if !is_valid_file_name(file_name) {
            return Ok(());
        }
        match tokio::fs::remove_file(self.root.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AttachmentError::Storage(e.to_string())),
        }
    }
}
