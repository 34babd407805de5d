// Verve Core Library
// Event-driven commerce automation and retention runtime

pub mod ai;
pub mod automation;
pub mod chat;
pub mod events;
pub mod limiter;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Export core types
pub use ai::{AiGateway, ChatMessage, ChatRole, DecisionGateway, GatewayError};
pub use automation::{CartAbandonmentEngine, ChurnEngine, DynamicPricingEngine};
pub use events::{Event, EventHandler, TriggerRegistry};
pub use workflow::{EventSink, WorkflowClient};

use std::sync::Arc;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerveError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, VerveError>;

/// External collaborators the automation core runs against. Everything the
/// engines read or act through is injected here; the core owns no schema,
/// no mail transport and no workflow timer.
pub struct Collaborators {
    pub users: Arc<dyn store::UserStore>,
    pub orders: Arc<dyn store::OrderStore>,
    pub carts: Arc<dyn store::CartStore>,
    pub products: Arc<dyn store::ProductStore>,
    pub demand: Arc<dyn store::DemandFeed>,
    pub mailer: Arc<dyn store::EmailSender>,
    pub gateway: Arc<dyn DecisionGateway>,
    pub sink: Arc<dyn EventSink>,
}

/// Core runtime: the automation engines plus the trigger registry, wired
/// once at startup.
pub struct AutomationCore {
    pub churn: Arc<ChurnEngine>,
    pub cart: Arc<CartAbandonmentEngine>,
    pub pricing: Arc<DynamicPricingEngine>,
    pub registry: Arc<TriggerRegistry>,
}

impl AutomationCore {
    pub fn new(c: Collaborators) -> Self {
        let churn = Arc::new(ChurnEngine::new(
            c.users.clone(),
            c.orders,
            c.gateway.clone(),
            c.sink.clone(),
        ));
        let cart = Arc::new(CartAbandonmentEngine::new(
            c.users,
            c.carts,
            c.products.clone(),
            c.gateway.clone(),
            c.mailer,
            c.sink.clone(),
        ));
        let pricing = Arc::new(DynamicPricingEngine::new(c.demand, c.products, c.gateway));

        let registry = Arc::new(TriggerRegistry::new(c.sink));
        automation::register_automation_triggers(&registry, cart.clone(), churn.clone());

        Self {
            churn,
            cart,
            pricing,
            registry,
        }
    }

    /// Entry point for the host's periodic scheduler.
    pub async fn run_scheduled_jobs(&self) -> Result<()> {
        tracing::info!(target: "automation", "running scheduled jobs");
        self.pricing.adjust_prices_for_demand().await?;
        tracing::info!(target: "automation", "all scheduled jobs completed");
        Ok(())
    }
}
