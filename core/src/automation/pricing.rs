// Demand-driven price adjustment with a hard underpricing floor
use crate::ai::DecisionGateway;
use crate::store::{DemandFeed, DemandLevel, ProductStore};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Proposed prices never commit below min_price * floor_ratio.
    pub floor_ratio: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            floor_ratio: std::env::var("PRICE_FLOOR_RATIO")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.5),
        }
    }
}

fn pricing_prompt(trend: &BTreeMap<String, DemandLevel>) -> String {
    let trend_json = serde_json::to_string(trend).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Current demand trend: {trend_json}. For each product, return ONLY a JSON object \
         with product_id as key and optimal_price as value. \
         Example: {{\"product_abc\": 120.0, \"product_xyz\": 180.0}}"
    )
}

/// Safety net when the model output is unusable. Not a pricing strategy; it
/// keeps the batch loop exercised with a harmless entry.
fn default_price_map() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("default_product".to_string(), Value::from("150.0"));
    map
}

fn coerce_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Sets prices from a demand snapshot, one product at a time. A bad entry
/// never aborts the rest of the batch.
pub struct DynamicPricingEngine {
    demand: Arc<dyn DemandFeed>,
    products: Arc<dyn ProductStore>,
    gateway: Arc<dyn DecisionGateway>,
    floor_ratio: f64,
}

impl DynamicPricingEngine {
    pub fn new(
        demand: Arc<dyn DemandFeed>,
        products: Arc<dyn ProductStore>,
        gateway: Arc<dyn DecisionGateway>,
    ) -> Self {
        Self {
            demand,
            products,
            gateway,
            floor_ratio: PricingConfig::default().floor_ratio,
        }
    }

    pub fn with_config(mut self, config: PricingConfig) -> Self {
        self.floor_ratio = config.floor_ratio;
        self
    }

    /// Request optimal prices for the current demand snapshot and commit the
    /// accepted ones.
    pub async fn adjust_prices_for_demand(&self) -> crate::Result<()> {
        let trend = self.demand.sales_trend().await?;
        if trend.is_empty() {
            info!(target: "pricing", "no demand data, nothing to adjust");
            return Ok(());
        }

        let price_map = self.propose_prices(&trend).await;
        for (product_id, proposed) in price_map {
            let proposed_price = match coerce_price(&proposed) {
                Some(price) => price,
                None => {
                    warn!(
                        target: "pricing",
                        product_id = %product_id,
                        value = %proposed,
                        "could not convert proposed price, skipping"
                    );
                    continue;
                }
            };

            let pricing = match self.products.pricing(&product_id).await {
                Ok(Some(pricing)) => pricing,
                Ok(None) => {
                    warn!(
                        target: "pricing",
                        product_id = %product_id,
                        "product not found, skipping price adjustment"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        target: "pricing",
                        product_id = %product_id,
                        error = %e,
                        "pricing lookup failed, skipping"
                    );
                    continue;
                }
            };

            // Never drop below the floor, whatever the model hallucinated.
            let floor = pricing.min_price * self.floor_ratio;
            let effective_price = if proposed_price < floor {
                info!(
                    target: "pricing",
                    product_id = %product_id,
                    proposed = proposed_price,
                    floor,
                    "proposed price below floor, clamping"
                );
                floor
            } else {
                proposed_price
            };

            if let Err(e) = self.products.update_price(&product_id, effective_price).await {
                warn!(
                    target: "pricing",
                    product_id = %product_id,
                    error = %e,
                    "price update failed, continuing with remaining products"
                );
                continue;
            }
            debug!(target: "pricing", product_id = %product_id, price = effective_price, "price committed");
        }
        Ok(())
    }

    async fn propose_prices(&self, trend: &BTreeMap<String, DemandLevel>) -> Map<String, Value> {
        let prompt = pricing_prompt(trend);
        let text = match self.gateway.quick_analysis(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!(
                    target: "pricing",
                    error = %e,
                    "AI pricing unavailable, using default price map"
                );
                return default_price_map();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(
                    target: "pricing",
                    "AI returned invalid price JSON, using default price map"
                );
                default_price_map()
            }
        }
    }
}
