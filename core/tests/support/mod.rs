// Shared test doubles for the automation engines.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use verve_core::ai::{ChatMessage, DecisionGateway, GatewayError};
use verve_core::events::{Event, EventHandler};
use verve_core::store::{
    CartSnapshot, CartStatus, CartStore, DemandFeed, DemandLevel, EmailSender, OrderRecord,
    OrderStore, ProductPricing, ProductStore, UserRecord, UserStore,
};
use verve_core::workflow::EventSink;
use verve_core::{Result, VerveError};

/// Gateway double returning one fixed reply, recording every request.
pub struct FixedGateway {
    reply: std::result::Result<String, GatewayError>,
    pub prompts: Mutex<Vec<String>>,
    pub conversations: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FixedGateway {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
            conversations: Mutex::new(Vec::new()),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(GatewayError::Unreachable("connection refused".to_string())),
            prompts: Mutex::new(Vec::new()),
            conversations: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DecisionGateway for FixedGateway {
    async fn quick_analysis(&self, prompt: &str) -> std::result::Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }

    async fn converse(
        &self,
        messages: &[ChatMessage],
    ) -> std::result::Result<String, GatewayError> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        self.reply.clone()
    }
}

/// Sink that records instead of delivering.
#[derive(Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<Event>>,
    pub scheduled: Mutex<Vec<(Event, String)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published_named(&self, name: &str) -> usize {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.name == name)
            .count()
    }

    pub fn last_published(&self) -> Option<Event> {
        self.published.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &Event) -> bool {
        self.published.lock().unwrap().push(event.clone());
        true
    }

    async fn schedule_delayed(&self, event: &Event, delay: &str) -> bool {
        self.scheduled
            .lock()
            .unwrap()
            .push((event.clone(), delay.to_string()));
        true
    }
}

pub fn user(id: u64, email: &str, name: Option<&str>) -> UserRecord {
    UserRecord {
        id,
        email: email.to_string(),
        name: name.map(str::to_string),
    }
}

pub struct FakeUsers {
    users: HashMap<u64, UserRecord>,
}

impl FakeUsers {
    pub fn with(users: Vec<UserRecord>) -> Arc<Self> {
        Arc::new(Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with(Vec::new())
    }
}

#[async_trait]
impl UserStore for FakeUsers {
    async fn user(&self, id: u64) -> Result<Option<UserRecord>> {
        Ok(self.users.get(&id).cloned())
    }
}

pub struct FakeOrders {
    orders: Vec<OrderRecord>,
}

impl FakeOrders {
    pub fn with(orders: Vec<OrderRecord>) -> Arc<Self> {
        Arc::new(Self { orders })
    }

    pub fn empty() -> Arc<Self> {
        Self::with(Vec::new())
    }
}

#[async_trait]
impl OrderStore for FakeOrders {
    async fn orders_since(&self, _user_id: u64, since: DateTime<Utc>) -> Result<Vec<OrderRecord>> {
        Ok(self
            .orders
            .iter()
            .filter(|o| o.created_at >= since)
            .cloned()
            .collect())
    }
}

pub struct FakeCarts {
    carts: Mutex<HashMap<u64, CartSnapshot>>,
}

impl FakeCarts {
    pub fn with(cart: CartSnapshot) -> Arc<Self> {
        let mut carts = HashMap::new();
        carts.insert(cart.cart_id, cart);
        Arc::new(Self {
            carts: Mutex::new(carts),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            carts: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_status(&self, cart_id: u64, status: CartStatus) {
        if let Some(cart) = self.carts.lock().unwrap().get_mut(&cart_id) {
            cart.status = status;
        }
    }
}

#[async_trait]
impl CartStore for FakeCarts {
    async fn cart(&self, id: u64) -> Result<Option<CartSnapshot>> {
        Ok(self.carts.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct FakeProducts {
    pricing: HashMap<String, ProductPricing>,
    viewed: Vec<String>,
    pub committed: Mutex<Vec<(String, f64)>>,
}

impl FakeProducts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pricing(mut self, product_id: &str, current_price: f64, min_price: f64) -> Self {
        self.pricing.insert(
            product_id.to_string(),
            ProductPricing {
                product_id: product_id.to_string(),
                current_price,
                min_price,
            },
        );
        self
    }

    pub fn with_viewed(mut self, names: &[&str]) -> Self {
        self.viewed = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProductStore for FakeProducts {
    async fn pricing(&self, product_id: &str) -> Result<Option<ProductPricing>> {
        Ok(self.pricing.get(product_id).cloned())
    }

    async fn update_price(&self, product_id: &str, price: f64) -> Result<()> {
        self.committed
            .lock()
            .unwrap()
            .push((product_id.to_string(), price));
        Ok(())
    }

    async fn recently_viewed(&self, _user_id: u64, limit: usize) -> Result<Vec<String>> {
        Ok(self.viewed.iter().take(limit).cloned().collect())
    }
}

pub struct FakeDemand {
    trend: BTreeMap<String, DemandLevel>,
    failing: bool,
}

impl FakeDemand {
    pub fn with(entries: &[(&str, DemandLevel)]) -> Arc<Self> {
        Arc::new(Self {
            trend: entries
                .iter()
                .map(|(id, level)| (id.to_string(), *level))
                .collect(),
            failing: false,
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with(&[])
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            trend: BTreeMap::new(),
            failing: true,
        })
    }
}

#[async_trait]
impl DemandFeed for FakeDemand {
    async fn sales_trend(&self) -> Result<BTreeMap<String, DemandLevel>> {
        if self.failing {
            return Err(VerveError::StorageError("market data offline".to_string()));
        }
        Ok(self.trend.clone())
    }
}

pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
    failing: bool,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failing: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        })
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing {
            return Err(VerveError::EmailError("smtp down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Handler that records the events it receives.
#[derive(Default)]
pub struct CountingHandler {
    pub hits: Mutex<Vec<Event>>,
}

impl CountingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl EventHandler for CountingHandler {
    async fn handle(&self, event: Event) -> Result<()> {
        self.hits.lock().unwrap().push(event);
        Ok(())
    }
}
