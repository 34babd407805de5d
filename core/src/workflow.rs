// Webhook adapter for the external workflow engine
use crate::events::{names, Event};
use crate::{Result, VerveError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info};

/// Configuration for the workflow engine webhook endpoint, loaded from
/// environment variables.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub base_url: String, // e.g., http://localhost:5678/webhook-test/
    pub request_timeout_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("WORKFLOW_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:5678/webhook-test/".to_string()),
            request_timeout_ms: std::env::var("WORKFLOW_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5_000),
        }
    }
}

/// Outbound event sink. Delivery is best effort: implementations report the
/// outcome as a bool and never raise to callers, so automation keeps running
/// when the downstream engine is unreachable.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &Event) -> bool;

    /// The delay is encoded in the payload and honored by the receiver; no
    /// local timer is kept.
    async fn schedule_delayed(&self, event: &Event, delay: &str) -> bool;
}

/// HTTP client that forwards events to the workflow engine as webhooks.
pub struct WorkflowClient {
    http: Client,
    cfg: WorkflowConfig,
}

impl WorkflowClient {
    pub fn new(cfg: WorkflowConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| VerveError::WorkflowError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(WorkflowConfig::default())
    }

    /// Target address for an event: the configured base joined with the
    /// event name.
    pub fn webhook_url(&self, event_name: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), event_name)
    }

    async fn post(&self, event_name: &str, body: serde_json::Value) -> bool {
        let url = self.webhook_url(event_name);
        debug!(target: "workflow", %url, "POST webhook");

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(
                    target: "workflow",
                    event = event_name,
                    status = %resp.status(),
                    "webhook delivered"
                );
                true
            }
            Ok(resp) => {
                error!(
                    target: "workflow",
                    event = event_name,
                    status = %resp.status(),
                    "workflow engine rejected webhook"
                );
                false
            }
            Err(e) => {
                error!(
                    target: "workflow",
                    event = event_name,
                    error = %e,
                    "failed to reach workflow engine"
                );
                false
            }
        }
    }
}

#[async_trait]
impl EventSink for WorkflowClient {
    async fn publish(&self, event: &Event) -> bool {
        let body = json!({
            "event_name": event.name,
            "data": event.payload,
        });
        self.post(&event.name, body).await
    }

    async fn schedule_delayed(&self, event: &Event, delay: &str) -> bool {
        let body = json!({
            "event_name": event.name,
            "delay": delay,
            "data": event.payload,
        });
        self.post(names::SCHEDULE_EVENT, body).await
    }
}
