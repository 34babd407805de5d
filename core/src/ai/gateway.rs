use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::backend::{
    AiConfig, BackendKind, ChatBackend, ChatMessage, HostedModelClient, LocalModelClient,
};

/// Why a gateway call produced no completion. Callers log these as the model
/// being unreachable or misbehaving, distinctly from their own parse
/// failures on a completion that did arrive.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Transport failure: the backend could not be reached at all.
    #[error("AI backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with a non-success status.
    #[error("AI backend returned status {status}: {body}")]
    Backend { status: u16, body: String },

    /// The backend answered 2xx but the completion could not be read.
    #[error("AI backend response malformed: {0}")]
    InvalidResponse(String),
}

/// Decision seam between business logic and the model service.
///
/// Stateless at this layer: `converse` callers own and resupply the full
/// history on every call. One attempt per request, no retries, so latency
/// stays bounded.
#[async_trait]
pub trait DecisionGateway: Send + Sync {
    /// Single-shot call where the caller expects a short, machine-parseable
    /// answer (a number, a JSON blob).
    async fn quick_analysis(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Multi-turn completion over an ordered, role-tagged history.
    async fn converse(&self, messages: &[ChatMessage]) -> Result<String, GatewayError>;
}

/// Gateway over the configured chat backend. One shared instance serves all
/// engines concurrently; it holds no caller-specific state.
pub struct AiGateway {
    backend: Arc<dyn ChatBackend>,
}

impl AiGateway {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Build the gateway from configuration, selecting the backend variant
    /// once at process start.
    pub fn from_config(cfg: AiConfig) -> crate::Result<Self> {
        let backend: Arc<dyn ChatBackend> = match cfg.backend {
            BackendKind::Local => Arc::new(LocalModelClient::new(cfg)?),
            BackendKind::Hosted => Arc::new(HostedModelClient::new(cfg)?),
        };
        Ok(Self { backend })
    }

    pub fn from_env() -> crate::Result<Self> {
        Self::from_config(AiConfig::default())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

#[async_trait]
impl DecisionGateway for AiGateway {
    async fn quick_analysis(&self, prompt: &str) -> Result<String, GatewayError> {
        debug!(target: "ai_gateway", backend = self.backend.name(), "quick analysis request");
        let messages = [ChatMessage::user(prompt)];
        self.backend.complete(&messages).await
    }

    async fn converse(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        debug!(
            target: "ai_gateway",
            backend = self.backend.name(),
            turns = messages.len(),
            "conversation request"
        );
        self.backend.complete(messages).await
    }
}
