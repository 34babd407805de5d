mod support;

use chrono::{Duration, Utc};
use std::sync::Arc;
use support::{user, FakeOrders, FakeUsers, FixedGateway, RecordingSink};
use verve_core::automation::ChurnEngine;
use verve_core::events::names;
use verve_core::store::{OrderRecord, OrderStatus};

fn build_engine(
    gateway: Arc<FixedGateway>,
    sink: Arc<RecordingSink>,
    users: Arc<FakeUsers>,
    orders: Arc<FakeOrders>,
) -> ChurnEngine {
    ChurnEngine::new(users, orders, gateway, sink)
}

fn known_user() -> Arc<FakeUsers> {
    FakeUsers::with(vec![user(1, "dana@example.com", Some("Dana"))])
}

/// Orders producing a deterministic rule-based score of 0.8:
/// 0.4 (70 days stale) + 0.3 (no recent orders) + 0.1 (cancelled order).
fn stale_cancelled_orders() -> Arc<FakeOrders> {
    let now = Utc::now();
    FakeOrders::with(vec![OrderRecord {
        id: 1,
        total_amount: 40.0,
        status: OrderStatus::Cancelled,
        created_at: now - Duration::days(70),
    }])
}

#[tokio::test]
async fn high_score_publishes_exactly_one_high_risk_event() {
    let sink = RecordingSink::new();
    let engine = build_engine(
        FixedGateway::ok("0.75"),
        sink.clone(),
        known_user(),
        FakeOrders::empty(),
    );

    engine.check_and_trigger_retention(1).await;

    assert_eq!(sink.published_named(names::CHURN_HIGH_RISK), 1);
    assert_eq!(sink.published_named(names::CHURN_MEDIUM_RISK), 0);

    let event = sink.last_published().unwrap();
    assert_eq!(
        event.payload.get("action").and_then(|v| v.as_str()),
        Some("apply_15_percent_discount")
    );
    assert_eq!(
        event.payload.get("urgency").and_then(|v| v.as_str()),
        Some("high")
    );
    assert_eq!(event.u64_field("user_id"), Some(1));
}

#[tokio::test]
async fn medium_score_publishes_exactly_one_medium_risk_event() {
    let sink = RecordingSink::new();
    let engine = build_engine(
        FixedGateway::ok("0.5"),
        sink.clone(),
        known_user(),
        FakeOrders::empty(),
    );

    engine.check_and_trigger_retention(1).await;

    assert_eq!(sink.published_named(names::CHURN_HIGH_RISK), 0);
    assert_eq!(sink.published_named(names::CHURN_MEDIUM_RISK), 1);
    let event = sink.last_published().unwrap();
    assert_eq!(
        event.payload.get("action").and_then(|v| v.as_str()),
        Some("send_engagement_email")
    );
}

#[tokio::test]
async fn low_score_publishes_nothing() {
    let sink = RecordingSink::new();
    let engine = build_engine(
        FixedGateway::ok("0.1"),
        sink.clone(),
        known_user(),
        FakeOrders::empty(),
    );

    engine.check_and_trigger_retention(1).await;

    assert!(sink.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_user_scores_zero_and_stays_quiet() {
    let sink = RecordingSink::new();
    let engine = build_engine(
        FixedGateway::ok("0.99"),
        sink.clone(),
        FakeUsers::empty(),
        FakeOrders::empty(),
    );

    assert_eq!(engine.predict_churn_risk(42).await, 0.0);
    engine.check_and_trigger_retention(42).await;
    assert!(sink.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_numeric_ai_reply_falls_back_to_rule_based_score() {
    let engine = build_engine(
        FixedGateway::ok("definitely quite high"),
        RecordingSink::new(),
        known_user(),
        stale_cancelled_orders(),
    );

    let score = engine.predict_churn_risk(1).await;
    assert!((score - 0.8).abs() < 1e-9, "expected rule-based 0.8, got {score}");
}

#[tokio::test]
async fn unreachable_backend_falls_back_to_rule_based_score() {
    let engine = build_engine(
        FixedGateway::unreachable(),
        RecordingSink::new(),
        known_user(),
        stale_cancelled_orders(),
    );

    let score = engine.predict_churn_risk(1).await;
    assert!((score - 0.8).abs() < 1e-9, "expected rule-based 0.8, got {score}");
}

#[tokio::test]
async fn ai_scores_are_clamped_into_unit_interval() {
    let engine = build_engine(
        FixedGateway::ok("7.5"),
        RecordingSink::new(),
        known_user(),
        FakeOrders::empty(),
    );
    assert_eq!(engine.predict_churn_risk(1).await, 1.0);

    let engine = build_engine(
        FixedGateway::ok("-3.0"),
        RecordingSink::new(),
        known_user(),
        FakeOrders::empty(),
    );
    assert_eq!(engine.predict_churn_risk(1).await, 0.0);
}

#[tokio::test]
async fn analysis_prompt_embeds_the_metrics() {
    let gateway = FixedGateway::ok("0.2");
    let engine = build_engine(
        gateway.clone(),
        RecordingSink::new(),
        known_user(),
        stale_cancelled_orders(),
    );

    engine.predict_churn_risk(1).await;

    let prompts = gateway.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Days since last order: 70"));
    assert!(prompts[0].contains("Has cancelled orders: true"));
}

#[tokio::test]
async fn apply_discount_publishes_discount_event() {
    let sink = RecordingSink::new();
    let engine = build_engine(
        FixedGateway::ok("0.0"),
        sink.clone(),
        known_user(),
        FakeOrders::empty(),
    );

    engine.apply_discount(1, "15% off").await;

    assert_eq!(sink.published_named(names::DISCOUNT_APPLIED), 1);
    let event = sink.last_published().unwrap();
    assert_eq!(
        event.payload.get("discount").and_then(|v| v.as_str()),
        Some("15% off")
    );
    assert_eq!(
        event.payload.get("reason").and_then(|v| v.as_str()),
        Some("churn_prevention")
    );
}

#[tokio::test]
async fn retention_offer_discounts_only_above_high_threshold() {
    let sink = RecordingSink::new();
    let engine = build_engine(
        FixedGateway::ok("0.9"),
        sink.clone(),
        known_user(),
        FakeOrders::empty(),
    );
    engine.retention_offer(1).await;
    assert_eq!(sink.published_named(names::DISCOUNT_APPLIED), 1);

    let sink = RecordingSink::new();
    let engine = build_engine(
        FixedGateway::ok("0.3"),
        sink.clone(),
        known_user(),
        FakeOrders::empty(),
    );
    engine.retention_offer(1).await;
    assert_eq!(sink.published_named(names::DISCOUNT_APPLIED), 0);
}
