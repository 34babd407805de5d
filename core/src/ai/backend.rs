use crate::{Result, VerveError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

use super::gateway::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a conversation in the wire format every backend accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Which backend variant serves completions for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local model server (development).
    Local,
    /// Hosted model API (production).
    Hosted,
}

/// Configuration for the AI backend, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub backend: BackendKind,
    pub base_url: String, // e.g., http://localhost:11434/v1
    pub model: String,    // e.g., llama3.1:latest
    pub api_key: Option<String>,
    pub temperature: f32,
    pub context_window: u32,
    pub request_timeout_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        let backend = match std::env::var("AI_BACKEND").ok().as_deref() {
            Some("hosted") => BackendKind::Hosted,
            _ => BackendKind::Local,
        };
        Self {
            backend,
            base_url: std::env::var("AI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:11434/v1".to_string()),
            model: std::env::var("AI_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "llama3.1:latest".to_string()),
            api_key: std::env::var("AI_API_KEY").ok().filter(|s| !s.is_empty()),
            temperature: std::env::var("AI_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
            context_window: std::env::var("AI_CONTEXT_WINDOW")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(4096),
            request_timeout_ms: std::env::var("AI_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

/// Chat-completion backend. One variant per deployment environment, chosen
/// once at startup and shared behind the gateway. Implementations hold no
/// caller state and are safe for concurrent use.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// A static identifier for the backend implementation
    fn name(&self) -> &'static str;

    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, GatewayError>;
}

fn build_http(timeout_ms: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| VerveError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

async fn send_chat_request(
    http: &Client,
    url: &str,
    api_key: Option<&str>,
    body: serde_json::Value,
    backend: &'static str,
) -> std::result::Result<String, GatewayError> {
    debug!(target: "ai_backend", backend, %url, "POST chat completion");

    let mut req = http.post(url).header("content-type", "application/json");
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }

    let resp = req.json(&body).send().await.map_err(|e| {
        error!(target: "ai_backend", backend, error = %e, "chat completion request failed");
        GatewayError::Unreachable(e.to_string())
    })?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        error!(target: "ai_backend", backend, status, "chat completion returned error status");
        return Err(GatewayError::Backend { status, body });
    }

    let val: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| GatewayError::InvalidResponse(format!("response body is not JSON: {e}")))?;

    extract_completion_text(&val).ok_or_else(|| {
        GatewayError::InvalidResponse("missing choices[0].message.content".to_string())
    })
}

fn extract_completion_text(v: &serde_json::Value) -> Option<String> {
    let text = v
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// OpenAI-compatible client for a local model server (Ollama style).
/// Unauthenticated; forwards the context-window option the local runtime
/// understands.
pub struct LocalModelClient {
    http: Client,
    cfg: AiConfig,
}

impl LocalModelClient {
    pub fn new(cfg: AiConfig) -> Result<Self> {
        let http = build_http(cfg.request_timeout_ms)?;
        Ok(Self { http, cfg })
    }
}

#[async_trait]
impl ChatBackend for LocalModelClient {
    fn name(&self) -> &'static str {
        "local-model"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, GatewayError> {
        let url = chat_completions_url(&self.cfg.base_url);
        let body = json!({
            "model": self.cfg.model,
            "messages": messages,
            "temperature": self.cfg.temperature,
            // Ollama-compatible servers read the context window from options
            "options": { "num_ctx": self.cfg.context_window },
        });
        send_chat_request(&self.http, &url, None, body, self.name()).await
    }
}

/// Client for a hosted OpenAI-compatible API. Requires an API key.
pub struct HostedModelClient {
    http: Client,
    cfg: AiConfig,
    api_key: String,
}

impl HostedModelClient {
    pub fn new(cfg: AiConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| VerveError::ConfigError("AI_API_KEY not configured".to_string()))?;
        let http = build_http(cfg.request_timeout_ms)?;
        Ok(Self { http, cfg, api_key })
    }
}

#[async_trait]
impl ChatBackend for HostedModelClient {
    fn name(&self) -> &'static str {
        "hosted-model"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> std::result::Result<String, GatewayError> {
        let url = chat_completions_url(&self.cfg.base_url);
        let body = json!({
            "model": self.cfg.model,
            "messages": messages,
            "temperature": self.cfg.temperature,
            "max_tokens": 1024,
        });
        send_chat_request(&self.http, &url, Some(&self.api_key), body, self.name()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_completions_url_normalizes_trailing_slash() {
        assert_eq!(
            chat_completions_url("http://localhost:11434/v1/"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("http://localhost:11434/v1"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn extract_completion_text_reads_chat_shape() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "  hello  "}}]
        });
        assert_eq!(extract_completion_text(&body), Some("hello".to_string()));
    }

    #[test]
    fn extract_completion_text_rejects_empty_and_missing() {
        assert_eq!(extract_completion_text(&json!({})), None);
        let blank = json!({"choices": [{"message": {"content": "   "}}]});
        assert_eq!(extract_completion_text(&blank), None);
    }

    #[test]
    fn chat_message_serializes_with_lowercase_roles() {
        let raw = serde_json::to_value(ChatMessage::assistant("ok")).unwrap();
        assert_eq!(raw, json!({"role": "assistant", "content": "ok"}));
    }

    #[test]
    fn hosted_client_requires_api_key() {
        let cfg = AiConfig {
            backend: BackendKind::Hosted,
            base_url: "http://localhost:11434/v1".to_string(),
            model: "test".to_string(),
            api_key: None,
            temperature: 0.7,
            context_window: 4096,
            request_timeout_ms: 5_000,
        };
        assert!(HostedModelClient::new(cfg).is_err());
    }
}
