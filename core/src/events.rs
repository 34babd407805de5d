// Business events and the trigger registry
use crate::workflow::EventSink;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Well-known event names exchanged with the workflow engine.
pub mod names {
    /// Order placed. Payload: order_id, user_id, total_amount, items, status,
    /// created_at.
    pub const ORDER_CREATED: &str = "order_created";
    /// Order moved between statuses. Payload: order_id, old_status,
    /// new_status, user_id.
    pub const ORDER_STATUS_CHANGED: &str = "order_status_changed";
    /// Order cancelled. Payload: order_id, user_id, reason, refund_amount.
    pub const ORDER_CANCELLED: &str = "order_cancelled";
    /// Cart opened; processed on a delay by the abandonment workflow.
    /// Payload: user_id, cart_id.
    pub const CART_CREATED: &str = "cart_created";
    /// Abandonment email went out. Payload: user_id, cart_id, cart_value,
    /// items_count.
    pub const CART_ABANDONMENT_EMAIL_SENT: &str = "cart_abandonment_email_sent";
    /// Payload: user_id, risk_score, action, urgency.
    pub const CHURN_HIGH_RISK: &str = "churn_high_risk";
    /// Payload: user_id, risk_score, action, urgency.
    pub const CHURN_MEDIUM_RISK: &str = "churn_medium_risk";
    /// Payload: user_id, discount, reason.
    pub const DISCOUNT_APPLIED: &str = "discount_applied";
    /// Raised by analytics when a user's activity drops off; processed on a
    /// delay. Payload: user_id.
    pub const LOW_ENGAGEMENT: &str = "low_engagement";
    /// Scheduling endpoint on the workflow engine, not a business event.
    pub const SCHEDULE_EVENT: &str = "schedule_event";
}

/// A named business event with an ordered payload. Transient: events are
/// handed to the sink and never persisted by the core.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub payload: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            name: name.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Integer payload field, accepting a JSON number or a numeric string.
    pub fn u64_field(&self, key: &str) -> Option<u64> {
        match self.payload.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Event handler trait
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<()>;
}

struct Registration {
    handler: Arc<dyn EventHandler>,
    delay: Option<String>,
}

/// Maps event names to handlers, populated once at startup.
///
/// Delayed registrations keep no local timer: `dispatch` forwards the event
/// to the workflow engine with the configured delay, and the host calls
/// `deliver` when the engine posts it back after waiting.
pub struct TriggerRegistry {
    registrations: DashMap<String, Vec<Registration>>,
    sink: Arc<dyn EventSink>,
}

impl TriggerRegistry {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            registrations: DashMap::new(),
            sink,
        }
    }

    /// Register a handler that runs in-process as soon as the event fires.
    pub fn register(&self, event_name: &str, handler: Arc<dyn EventHandler>) {
        self.add(event_name, handler, None);
    }

    /// Register a handler whose execution is deferred through the workflow
    /// engine. `delay` is a human-readable duration the engine understands,
    /// e.g. "1 hour".
    pub fn register_delayed(&self, event_name: &str, delay: &str, handler: Arc<dyn EventHandler>) {
        self.add(event_name, handler, Some(delay.to_string()));
    }

    fn add(&self, event_name: &str, handler: Arc<dyn EventHandler>, delay: Option<String>) {
        info!(
            target: "triggers",
            event = event_name,
            delay = delay.as_deref().unwrap_or("none"),
            "trigger registered"
        );
        self.registrations
            .entry(event_name.to_string())
            .or_default()
            .push(Registration { handler, delay });
    }

    pub fn handler_count(&self, event_name: &str) -> usize {
        self.registrations
            .get(event_name)
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Route a freshly fired business event. Delayed registrations are
    /// forwarded to the workflow engine; immediate ones run here. Handler
    /// failures are logged, never propagated.
    pub async fn dispatch(&self, event: Event) {
        let Some(regs) = self.registrations.get(&event.name) else {
            debug!(target: "triggers", event = %event.name, "no handlers registered");
            return;
        };
        // Snapshot so the dashmap guard is not held across awaits.
        let plan: Vec<(Arc<dyn EventHandler>, Option<String>)> = regs
            .iter()
            .map(|r| (r.handler.clone(), r.delay.clone()))
            .collect();
        drop(regs);

        for (handler, delay) in plan {
            match delay {
                Some(delay) => {
                    info!(target: "triggers", event = %event.name, %delay, "deferring to workflow engine");
                    if !self.sink.schedule_delayed(&event, &delay).await {
                        error!(target: "triggers", event = %event.name, "failed to schedule delayed trigger");
                    }
                }
                None => {
                    if let Err(e) = handler.handle(event.clone()).await {
                        error!(target: "triggers", event = %event.name, error = %e, "trigger handler failed");
                    }
                }
            }
        }
    }

    /// Run the handlers for an event that has come back from the workflow
    /// engine after its delay. The delay is not re-applied.
    pub async fn deliver(&self, event: Event) {
        let Some(regs) = self.registrations.get(&event.name) else {
            warn!(target: "triggers", event = %event.name, "delivered event has no handlers");
            return;
        };
        let handlers: Vec<Arc<dyn EventHandler>> = regs.iter().map(|r| r.handler.clone()).collect();
        drop(regs);

        for handler in handlers {
            if let Err(e) = handler.handle(event.clone()).await {
                error!(target: "triggers", event = %event.name, error = %e, "trigger handler failed");
            }
        }
    }
}
