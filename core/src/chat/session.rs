// Assistant sessions with durable, per-session history
use super::memory::ChatStore;
use super::reference::ReferenceLibrary;
use crate::ai::{ChatMessage, DecisionGateway};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Reply returned when the AI backend fails. Users always get an answer,
/// never a transport error.
const APOLOGY_REPLY: &str =
    "I'm having trouble processing your request right now. Please try again.";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI customer support assistant for an e-commerce platform that sells \
     AI-powered landing page builder tools. Help users with product questions, pricing, \
     features, and general support. Be helpful, concise, and professional. \
     Do not mention you are an AI.";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: std::env::var("CHAT_SYSTEM_PROMPT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

/// A single conversation. History sits behind a mutex so two concurrent
/// requests against the same session serialize instead of interleaving.
pub struct ChatSession {
    id: String,
    system_prompt: String,
    history: Mutex<Vec<ChatMessage>>,
    gateway: Arc<dyn DecisionGateway>,
    store: Arc<dyn ChatStore>,
    library: Arc<ReferenceLibrary>,
}

impl ChatSession {
    /// Open a session, restoring persisted history when present. The system
    /// prompt is augmented with the reference resource directory when the
    /// library has content.
    pub async fn open(
        id: impl Into<String>,
        base_prompt: &str,
        gateway: Arc<dyn DecisionGateway>,
        store: Arc<dyn ChatStore>,
        library: Arc<ReferenceLibrary>,
    ) -> Self {
        let id = id.into();
        let system_prompt = if library.is_empty() {
            base_prompt.to_string()
        } else {
            format!("{}{}", base_prompt, library.resource_directory())
        };
        let history = match store.load(&id).await {
            Some(history) if !history.is_empty() => history,
            _ => vec![ChatMessage::system(system_prompt.clone())],
        };
        Self {
            id,
            system_prompt,
            history: Mutex::new(history),
            gateway,
            store,
            library,
        }
    }

    /// Truncate history back to the single system priming message.
    pub async fn reset(&self) {
        let mut history = self.history.lock().await;
        history.clear();
        history.push(ChatMessage::system(self.system_prompt.clone()));
        self.persist(&history).await;
        info!(target: "chat", session = %self.id, "chat history reset");
    }

    /// Run one turn: match reference material into the user turn, get a
    /// reply, record both sides. When the backend fails the user turn stays
    /// the last recorded state and the caller gets an apology instead of an
    /// error.
    pub async fn handle(&self, user_message: &str) -> String {
        let user_message = user_message.trim();
        let content = match self.library.match_message(user_message) {
            Some(reference) => {
                debug!(target: "chat", session = %self.id, key = %reference.key, "reference content matched");
                format!("{user_message}\n\n{}", reference.content)
            }
            None => user_message.to_string(),
        };

        let mut history = self.history.lock().await;
        history.push(ChatMessage::user(content));

        match self.gateway.converse(&history).await {
            Ok(reply) => {
                history.push(ChatMessage::assistant(reply.clone()));
                self.persist(&history).await;
                reply
            }
            Err(e) => {
                error!(target: "chat", session = %self.id, error = %e, "assistant reply failed");
                self.persist(&history).await;
                APOLOGY_REPLY.to_string()
            }
        }
    }

    /// Snapshot of the current history, oldest first.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    async fn persist(&self, history: &[ChatMessage]) {
        // A write failure does not fail the turn; the reply already exists.
        if let Err(e) = self.store.save(&self.id, history).await {
            error!(target: "chat", session = %self.id, error = %e, "failed to persist chat history");
        }
    }
}

/// Hands out one session object per id so all writers share the same lock.
pub struct SessionManager {
    sessions: DashMap<String, Arc<ChatSession>>,
    config: ChatConfig,
    gateway: Arc<dyn DecisionGateway>,
    store: Arc<dyn ChatStore>,
    library: Arc<ReferenceLibrary>,
}

impl SessionManager {
    pub fn new(
        config: ChatConfig,
        gateway: Arc<dyn DecisionGateway>,
        store: Arc<dyn ChatStore>,
        library: Arc<ReferenceLibrary>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            gateway,
            store,
            library,
        }
    }

    pub async fn session(&self, id: &str) -> Arc<ChatSession> {
        if let Some(existing) = self.sessions.get(id) {
            return existing.clone();
        }
        let created = Arc::new(
            ChatSession::open(
                id,
                &self.config.system_prompt,
                self.gateway.clone(),
                self.store.clone(),
                self.library.clone(),
            )
            .await,
        );
        // Two first requests can race here; the map keeps exactly one.
        let entry = self.sessions.entry(id.to_string()).or_insert(created);
        entry.value().clone()
    }
}
