// AI-powered churn risk prediction and retention triggers
use crate::ai::DecisionGateway;
use crate::events::{names, Event};
use crate::store::{OrderRecord, OrderStatus, OrderStore, UserStore};
use crate::workflow::EventSink;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Recency sentinel when the user has never ordered.
const NEVER_ORDERED_DAYS: i64 = 999;

/// Churn risk tier derived from a score via fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    High,
    Medium,
    Low,
    None,
}

#[derive(Debug, Clone)]
pub struct RiskThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: env_f64("CHURN_HIGH_RISK", 0.7),
            medium: env_f64("CHURN_MEDIUM_RISK", 0.4),
            low: env_f64("CHURN_LOW_RISK", 0.2),
        }
    }
}

impl RiskThresholds {
    pub fn tier(&self, score: f64) -> RiskTier {
        if score >= self.high {
            RiskTier::High
        } else if score >= self.medium {
            RiskTier::Medium
        } else if score >= self.low {
            RiskTier::Low
        } else {
            RiskTier::None
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

/// Engagement snapshot derived from a user's order history over a 90-day
/// window. Recomputed on every call, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementMetrics {
    pub user_id: u64,
    pub total_orders: usize,
    pub orders_last_30d: usize,
    pub orders_last_60d: usize,
    pub avg_order_value: f64,
    pub days_since_last_order: i64,
    pub total_spent: f64,
    pub frequency_declining: bool,
    pub has_cancelled_orders: bool,
}

impl EngagementMetrics {
    /// Derive metrics from orders inside the 90-day window ending at `now`.
    /// The order store is expected to have applied the window already.
    pub fn from_orders(user_id: u64, orders: &[OrderRecord], now: DateTime<Utc>) -> Self {
        let cutoff_30 = now - Duration::days(30);
        let cutoff_60 = now - Duration::days(60);

        let orders_last_30d = orders.iter().filter(|o| o.created_at >= cutoff_30).count();
        let orders_last_60d = orders.iter().filter(|o| o.created_at >= cutoff_60).count();

        let total_spent: f64 = orders.iter().map(|o| o.total_amount).sum();
        let avg_order_value = if orders.is_empty() {
            0.0
        } else {
            total_spent / orders.len() as f64
        };

        let days_since_last_order = orders
            .iter()
            .map(|o| o.created_at)
            .max()
            .map(|last| (now - last).num_days())
            .unwrap_or(NEVER_ORDERED_DAYS);

        Self {
            user_id,
            total_orders: orders.len(),
            orders_last_30d,
            orders_last_60d,
            avg_order_value,
            days_since_last_order,
            total_spent,
            // Fewer orders in the last 30 days than in the 30 before that.
            frequency_declining: orders_last_30d < orders_last_60d - orders_last_30d,
            has_cancelled_orders: orders.iter().any(|o| o.status == OrderStatus::Cancelled),
        }
    }
}

/// Deterministic fallback scoring, used when the AI judgment is unavailable
/// or unparseable.
pub fn rule_based_risk(metrics: &EngagementMetrics) -> f64 {
    let mut score = 0.0;

    // Recency
    if metrics.days_since_last_order > 60 {
        score += 0.4;
    } else if metrics.days_since_last_order > 30 {
        score += 0.2;
    }

    // Frequency
    if metrics.orders_last_30d == 0 {
        score += 0.3;
    }

    // Declining trend
    if metrics.frequency_declining {
        score += 0.2;
    }

    // Cancellations
    if metrics.has_cancelled_orders {
        score += 0.1;
    }

    score.min(1.0)
}

fn risk_prompt(metrics: &EngagementMetrics) -> String {
    format!(
        "Analyze this customer's churn risk based on their behavior metrics:\n\n\
         Customer profile:\n\
         - Days since last order: {}\n\
         - Total orders (90 days): {}\n\
         - Recent orders (30 days): {}\n\
         - Average order value: ${:.2}\n\
         - Total spent: ${:.2}\n\
         - Order frequency declining: {}\n\
         - Has cancelled orders: {}\n\n\
         Return a churn risk score between 0.0 (no risk) and 1.0 (very high risk).\n\
         Consider recency, frequency, monetary value and trend.\n\
         Respond with ONLY a number between 0.0 and 1.0, nothing else.",
        metrics.days_since_last_order,
        metrics.total_orders,
        metrics.orders_last_30d,
        metrics.avg_order_value,
        metrics.total_spent,
        metrics.frequency_declining,
        metrics.has_cancelled_orders,
    )
}

/// Predicts customer churn risk and fires retention workflows.
pub struct ChurnEngine {
    users: Arc<dyn UserStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn DecisionGateway>,
    sink: Arc<dyn EventSink>,
    thresholds: RiskThresholds,
}

impl ChurnEngine {
    pub fn new(
        users: Arc<dyn UserStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn DecisionGateway>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            users,
            orders,
            gateway,
            sink,
            thresholds: RiskThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Churn risk score in [0.0, 1.0]. Missing users and storage failures
    /// come back as 0.0: this is a best-effort signal, not a query.
    pub async fn predict_churn_risk(&self, user_id: u64) -> f64 {
        match self.users.user(user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(target: "churn", user_id, "user not found for churn prediction");
                return 0.0;
            }
            Err(e) => {
                error!(target: "churn", user_id, error = %e, "user lookup failed");
                return 0.0;
            }
        }

        let now = Utc::now();
        let orders = match self.orders.orders_since(user_id, now - Duration::days(90)).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(target: "churn", user_id, error = %e, "order history lookup failed");
                return 0.0;
            }
        };

        let metrics = EngagementMetrics::from_orders(user_id, &orders, now);
        let score = self.ai_risk_score(&metrics).await.clamp(0.0, 1.0);
        info!(target: "churn", user_id, score, "churn risk computed");
        score
    }

    async fn ai_risk_score(&self, metrics: &EngagementMetrics) -> f64 {
        let prompt = risk_prompt(metrics);
        match self.gateway.quick_analysis(&prompt).await {
            Ok(text) => match text.trim().parse::<f64>() {
                Ok(score) => score.clamp(0.0, 1.0),
                Err(_) => {
                    warn!(
                        target: "churn",
                        user_id = metrics.user_id,
                        response = %text,
                        "AI returned a non-numeric risk score, using rule-based fallback"
                    );
                    rule_based_risk(metrics)
                }
            },
            Err(e) => {
                error!(
                    target: "churn",
                    user_id = metrics.user_id,
                    error = %e,
                    "AI risk analysis unavailable, using rule-based fallback"
                );
                rule_based_risk(metrics)
            }
        }
    }

    /// Check churn risk and fire the matching retention workflow. Best
    /// effort: nothing in this flow propagates to the caller.
    pub async fn check_and_trigger_retention(&self, user_id: u64) {
        let score = self.predict_churn_risk(user_id).await;
        match self.thresholds.tier(score) {
            RiskTier::High => {
                info!(target: "churn", user_id, score, "high churn risk, triggering retention");
                let event = Event::new(
                    names::CHURN_HIGH_RISK,
                    json!({
                        "user_id": user_id,
                        "risk_score": score,
                        "action": "apply_15_percent_discount",
                        "urgency": "high",
                    }),
                );
                self.sink.publish(&event).await;
            }
            RiskTier::Medium => {
                info!(target: "churn", user_id, score, "medium churn risk, triggering retention");
                let event = Event::new(
                    names::CHURN_MEDIUM_RISK,
                    json!({
                        "user_id": user_id,
                        "risk_score": score,
                        "action": "send_engagement_email",
                        "urgency": "medium",
                    }),
                );
                self.sink.publish(&event).await;
            }
            RiskTier::Low | RiskTier::None => {
                debug!(target: "churn", user_id, score, "churn risk below retention thresholds");
            }
        }
    }

    /// Publish a retention discount for a user.
    pub async fn apply_discount(&self, user_id: u64, discount: &str) {
        info!(target: "churn", user_id, discount, "applying retention discount");
        let event = Event::new(
            names::DISCOUNT_APPLIED,
            json!({
                "user_id": user_id,
                "discount": discount,
                "reason": "churn_prevention",
            }),
        );
        self.sink.publish(&event).await;
    }

    /// Low-engagement follow-up: re-check risk once the delayed trigger
    /// fires, and discount only when still above the high threshold.
    pub async fn retention_offer(&self, user_id: u64) {
        let score = self.predict_churn_risk(user_id).await;
        if score > self.thresholds.high {
            info!(target: "churn", user_id, score, "high churn risk, applying discount");
            self.apply_discount(user_id, "15% off").await;
        } else {
            info!(target: "churn", user_id, score, "churn risk acceptable, no action needed");
        }
    }
}
