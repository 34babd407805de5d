// Collaborator interfaces over external storage and delivery systems.
//
// The automation core reads through these traits and never owns the schema:
// checkout, auth and the relational layer live elsewhere and hand the
// engines read-only views at processing time.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: u64,
    pub email: String,
    pub name: Option<String>,
}

impl UserRecord {
    /// Display name, falling back to the local part of the email address.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or(&self.email)
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: u64,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Abandoned,
    Completed,
}

#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

/// Read-only view of a cart assembled from storage at processing time. The
/// engines never mutate cart state; that belongs to the checkout flow.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    pub cart_id: u64,
    pub user_id: u64,
    pub status: CartStatus,
    pub items: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn total_value(&self) -> f64 {
        self.items
            .iter()
            .map(|line| f64::from(line.quantity) * line.unit_price)
            .sum()
    }

    pub fn item_names(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|line| line.product_name.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ProductPricing {
    pub product_id: String,
    pub current_price: f64,
    pub min_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandLevel {
    Low,
    Medium,
    High,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user(&self, id: u64) -> Result<Option<UserRecord>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Orders for a user created at or after `since`, any status.
    async fn orders_since(&self, user_id: u64, since: DateTime<Utc>) -> Result<Vec<OrderRecord>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn cart(&self, id: u64) -> Result<Option<CartSnapshot>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn pricing(&self, product_id: &str) -> Result<Option<ProductPricing>>;

    async fn update_price(&self, product_id: &str, price: f64) -> Result<()>;

    /// Names of the user's most recently viewed products, newest first.
    async fn recently_viewed(&self, user_id: u64, limit: usize) -> Result<Vec<String>>;
}

/// Market-data capability: per-product demand snapshot.
#[async_trait]
pub trait DemandFeed: Send + Sync {
    async fn sales_trend(&self) -> Result<BTreeMap<String, DemandLevel>>;
}

/// Delivery credentials for a real mailer implementation, loaded from
/// environment variables. The core only carries the configuration surface;
/// the transport itself lives with the host.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub from_email: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("EMAIL_API_KEY").ok().filter(|s| !s.is_empty()),
            from_email: std::env::var("EMAIL_FROM")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "no-reply@example.com".to_string()),
        }
    }
}

/// Outbound email capability: send(to, subject, body).
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Mailer that records sends in the log instead of delivering. Default for
/// development deployments without delivery credentials.
pub struct LogMailer;

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let preview: String = body.chars().take(100).collect();
        info!(target: "email", to, subject, body = %preview, "email logged (no delivery backend)");
        Ok(())
    }
}
