//! Automation workflows triggered by business events.
//!
//! Each engine runs to completion inside the call that triggered it; the
//! only blocking point is the AI gateway. Delay semantics ("1 hour after
//! cart creation") live in the external workflow engine, which re-enters the
//! system through the trigger registry when the wait is over.

mod cart;
mod churn;
mod pricing;

pub use cart::{CartAbandonmentEngine, EmailContent};
pub use churn::{
    rule_based_risk, ChurnEngine, EngagementMetrics, RiskThresholds, RiskTier,
};
pub use pricing::{DynamicPricingEngine, PricingConfig};

use crate::events::{names, Event, EventHandler, TriggerRegistry};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Runs the abandonment workflow when the delayed cart trigger fires.
pub struct CartAbandonmentTrigger {
    engine: Arc<CartAbandonmentEngine>,
}

impl CartAbandonmentTrigger {
    pub fn new(engine: Arc<CartAbandonmentEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for CartAbandonmentTrigger {
    async fn handle(&self, event: Event) -> Result<()> {
        let (Some(user_id), Some(cart_id)) =
            (event.u64_field("user_id"), event.u64_field("cart_id"))
        else {
            warn!(target: "automation", event = %event.name, "missing user_id or cart_id in payload");
            return Ok(());
        };
        self.engine.process_abandoned_cart(user_id, cart_id).await;
        Ok(())
    }
}

/// Re-checks churn risk when a low-engagement follow-up fires.
pub struct RetentionOfferTrigger {
    engine: Arc<ChurnEngine>,
}

impl RetentionOfferTrigger {
    pub fn new(engine: Arc<ChurnEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for RetentionOfferTrigger {
    async fn handle(&self, event: Event) -> Result<()> {
        let Some(user_id) = event.u64_field("user_id") else {
            warn!(target: "automation", event = %event.name, "missing user_id in payload");
            return Ok(());
        };
        self.engine.retention_offer(user_id).await;
        Ok(())
    }
}

/// Register the delayed automation triggers. Both are deferred through the
/// workflow engine; the host calls `TriggerRegistry::deliver` when they come
/// back.
pub fn register_automation_triggers(
    registry: &TriggerRegistry,
    cart: Arc<CartAbandonmentEngine>,
    churn: Arc<ChurnEngine>,
) {
    registry.register_delayed(
        names::CART_CREATED,
        "1 hour",
        Arc::new(CartAbandonmentTrigger::new(cart)),
    );
    registry.register_delayed(
        names::LOW_ENGAGEMENT,
        "24h",
        Arc::new(RetentionOfferTrigger::new(churn)),
    );
}
