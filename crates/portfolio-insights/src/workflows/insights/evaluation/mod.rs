//! Threshold evaluation: pure functions deciding whether a snapshot warrants an insight.

mod config;
mod policy;
mod rules;

pub use config::{ThresholdConfig, ThresholdConfigError};

pub(crate) use policy::{classify_deviation, usable_baseline};

use super::domain::{
    ComparisonPeriod, DedupKey, InsightMetric, InsightSeverity, MetricSnapshot, MetricType,
    PropertyId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which average a decision was measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    Portfolio,
    PeerGroup,
}

impl Baseline {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Portfolio => "portfolio average",
            Self::PeerGroup => "peer group average",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Below,
    Above,
}

/// Evaluator output for a snapshot that crossed its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub metric_type: MetricType,
    pub severity: InsightSeverity,
    pub comparison_period: ComparisonPeriod,
    pub metric: InsightMetric,
    pub baseline: Baseline,
}

impl TriggerDecision {
    pub(crate) fn new(
        snapshot: &MetricSnapshot,
        severity: InsightSeverity,
        metric: InsightMetric,
        baseline: Baseline,
    ) -> Self {
        Self {
            metric_type: snapshot.metric_type,
            severity,
            comparison_period: snapshot.comparison_period,
            metric,
            baseline,
        }
    }
}

/// Why a snapshot could not be compared against its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonEvaluableReason {
    ZeroBaseline,
    NonFiniteBaseline,
    NonFiniteValue,
}

impl NonEvaluableReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ZeroBaseline => "portfolio average is zero",
            Self::NonFiniteBaseline => "portfolio average is not a finite number",
            Self::NonFiniteValue => "property value is not a finite number",
        }
    }
}

/// Full evaluator verdict, distinguishing "no deviation" from "could not evaluate".
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Triggered(TriggerDecision),
    WithinThreshold,
    NonEvaluable(NonEvaluableReason),
}

impl Assessment {
    pub fn into_decision(self) -> Option<TriggerDecision> {
        match self {
            Assessment::Triggered(decision) => Some(decision),
            Assessment::WithinThreshold | Assessment::NonEvaluable(_) => None,
        }
    }
}

/// Decide whether `snapshot` deviates enough from its baseline to raise an insight.
pub fn evaluate(snapshot: &MetricSnapshot, config: &ThresholdConfig) -> Option<TriggerDecision> {
    assess(snapshot, config).into_decision()
}

/// Same decision as [`evaluate`], keeping the reason when nothing triggers.
pub fn assess(snapshot: &MetricSnapshot, config: &ThresholdConfig) -> Assessment {
    if let Some(reason) = non_evaluable_reason(snapshot) {
        debug!(
            key = %snapshot.dedup_key(),
            reason = reason.label(),
            "skipping non-evaluable snapshot"
        );
        return Assessment::NonEvaluable(reason);
    }

    match rules::evaluate_rule(snapshot, config) {
        Some(decision) => Assessment::Triggered(decision),
        None => Assessment::WithinThreshold,
    }
}

fn non_evaluable_reason(snapshot: &MetricSnapshot) -> Option<NonEvaluableReason> {
    if !snapshot.property_value.is_finite() {
        return Some(NonEvaluableReason::NonFiniteValue);
    }
    if !snapshot.portfolio_average.is_finite() {
        return Some(NonEvaluableReason::NonFiniteBaseline);
    }
    if !usable_baseline(snapshot.portfolio_average) {
        return Some(NonEvaluableReason::ZeroBaseline);
    }
    None
}

/// Key of the condition a decision belongs to.
pub fn decision_key(property_id: &PropertyId, decision: &TriggerDecision) -> DedupKey {
    DedupKey {
        property_id: property_id.clone(),
        metric_type: decision.metric_type,
        comparison_period: decision.comparison_period,
    }
}
