use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::workflows::insights::clock::{Clock, ManualClock};
use crate::workflows::insights::domain::{
    ComparisonPeriod, InsightMetric, InsightSeverity, MetricSnapshot, MetricType, PropertyId,
};
use crate::workflows::insights::engine::InsightEngine;
use crate::workflows::insights::evaluation::{Baseline, ThresholdConfig, TriggerDecision};
use crate::workflows::insights::store::InsightStore;

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn snapshot(
    property: &str,
    metric_type: MetricType,
    property_value: f64,
    portfolio_average: f64,
) -> MetricSnapshot {
    MetricSnapshot {
        property_id: PropertyId::new(property),
        property_name: format!("{property} listing"),
        metric_type,
        property_value,
        portfolio_average,
        peer_group_average: None,
        comparison_period: ComparisonPeriod::ThirtyDays,
    }
}

pub(super) fn decision(
    metric_type: MetricType,
    severity: InsightSeverity,
    property_value: f64,
    portfolio_average: f64,
) -> TriggerDecision {
    let difference = property_value - portfolio_average;
    TriggerDecision {
        metric_type,
        severity,
        comparison_period: ComparisonPeriod::ThirtyDays,
        metric: InsightMetric {
            property_value,
            portfolio_average,
            peer_group_average: None,
            difference,
            difference_percent: difference * 100.0 / portfolio_average,
        },
        baseline: Baseline::Portfolio,
    }
}

pub(super) struct Harness {
    pub(super) clock: Arc<ManualClock>,
    pub(super) store: Arc<InsightStore>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = Arc::new(InsightStore::with_clock(clock.clone()));
        Self { clock, store }
    }

    pub(super) fn tick(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    pub(super) fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(super) fn engine(&self) -> InsightEngine {
        InsightEngine::new(self.store.clone(), ThresholdConfig::default())
            .expect("default thresholds are valid")
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
