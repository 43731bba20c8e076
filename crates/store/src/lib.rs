//! Conversation persistence for Tiller.
//!
//! One JSON document per conversation, stored in a flat directory keyed by
//! conversation id. Writes are whole-document; histories are small enough
//! that rewrite-on-save beats an incremental format.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tiller_core::error::StoreError;
use tiller_core::turn::Turn;

/// Maximum characters of the first user turn used as the title.
const TITLE_MAX_CHARS: usize = 48;

/// A stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDoc {
    pub id: String,
    pub title: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationDoc {
    pub fn new(id: impl Into<String>, turns: Vec<Turn>) -> Self {
        let now = Utc::now();
        let mut doc = Self {
            id: id.into(),
            title: String::new(),
            turns,
            created_at: now,
            updated_at: now,
        };
        doc.title = doc.derive_title();
        doc
    }

    /// Title from the first user turn, truncated on a char boundary.
    fn derive_title(&self) -> String {
        let first = self
            .turns
            .iter()
            .find(|t| t.role == tiller_core::turn::Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or("untitled");
        let mut title: String = first.chars().take(TITLE_MAX_CHARS).collect();
        if first.chars().count() > TITLE_MAX_CHARS {
            title.push('…');
        }
        title
    }
}

/// A listing entry: everything the picker UI needs without the turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub turn_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// The persistence contract.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create and persist a new conversation under a fresh id.
    async fn create(&self, turns: Vec<Turn>) -> Result<ConversationDoc, StoreError> {
        let doc = ConversationDoc::new(uuid::Uuid::new_v4().to_string(), turns);
        self.save(&doc).await?;
        Ok(doc)
    }

    /// Persist a conversation, overwriting any previous version.
    async fn save(&self, doc: &ConversationDoc) -> Result<(), StoreError>;

    /// Load a conversation by id.
    async fn load(&self, id: &str) -> Result<ConversationDoc, StoreError>;

    /// List stored conversations, most recently updated first.
    async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Delete a conversation by id.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Flat-directory JSON store.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        // Ids are uuids; reject anything path-shaped outright.
        self.dir.join(format!("{}.json", id.replace(['/', '\\'], "_")))
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Storage(format!("create {}: {e}", self.dir.display())))
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn save(&self, doc: &ConversationDoc) -> Result<(), StoreError> {
        self.ensure_dir().await?;
        let mut doc = doc.clone();
        doc.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| StoreError::Storage(format!("serialize {}: {e}", doc.id)))?;
        let path = self.path_for(&doc.id);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| StoreError::Storage(format!("write {}: {e}", path.display())))?;
        debug!(id = %doc.id, turns = doc.turns.len(), "conversation saved");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<ConversationDoc, StoreError> {
        let path = self.path_for(id);
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| StoreError::NotFound(id.to_string()))?;
        serde_json::from_str(&json)
            .map_err(|e| StoreError::Storage(format!("parse {}: {e}", path.display())))
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            // A store that was never written to is just empty.
            Err(_) => return Ok(Vec::new()),
        };

        let mut summaries = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_doc(&path).await {
                Ok(doc) => summaries.push(ConversationSummary {
                    id: doc.id,
                    title: doc.title,
                    turn_count: doc.turns.len(),
                    updated_at: doc.updated_at,
                }),
                Err(e) => {
                    // A corrupt file doesn't poison the listing.
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable conversation");
                }
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|_| StoreError::NotFound(id.to_string()))
    }
}

async fn read_doc(path: &Path) -> Result<ConversationDoc, StoreError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| StoreError::Storage(e.to_string()))
}
