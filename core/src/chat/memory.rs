// Durable chat history storage
use crate::ai::ChatMessage;
use crate::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Persistence seam for conversation history. Injected into sessions so the
/// storage location stays a host decision.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Load a session's history. Absent and unreadable histories are both
    /// `None`: corruption is recovered from, never fatal.
    async fn load(&self, session_id: &str) -> Option<Vec<ChatMessage>>;

    async fn save(&self, session_id: &str, history: &[ChatMessage]) -> Result<()>;
}

/// Stores each session as a JSON array of {role, content} objects under a
/// directory.
pub struct FileChatStore {
    dir: PathBuf,
}

impl FileChatStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl ChatStore for FileChatStore {
    async fn load(&self, session_id: &str) -> Option<Vec<ChatMessage>> {
        let path = self.path_for(session_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(_) => {
                debug!(target: "chat_memory", session = session_id, "no persisted history");
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(history) => Some(history),
            Err(e) => {
                warn!(
                    target: "chat_memory",
                    session = session_id,
                    error = %e,
                    "persisted history corrupted, starting fresh"
                );
                None
            }
        }
    }

    async fn save(&self, session_id: &str, history: &[ChatMessage]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let raw = serde_json::to_vec_pretty(history)?;
        tokio::fs::write(self.path_for(session_id), raw).await?;
        Ok(())
    }
}
