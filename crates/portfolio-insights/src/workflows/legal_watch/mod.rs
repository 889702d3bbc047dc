//! Regulatory risk watch: flags properties whose legal risk score runs ahead of the portfolio.
//!
//! Reuses the insight evaluator's severity ladder and baseline guard, but keeps its own
//! snapshot, configuration and decision types.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::insights::domain::{InsightSeverity, PropertyId};
use super::insights::evaluation::{classify_deviation, usable_baseline};

/// Risk reading for one property in one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalRiskSnapshot {
    pub property_id: PropertyId,
    #[serde(default)]
    pub property_name: String,
    pub jurisdiction: String,
    pub risk_score: f64,
    pub portfolio_average_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalWatchConfig {
    pub risk_difference_percent: f64,
}

impl Default for LegalWatchConfig {
    fn default() -> Self {
        Self {
            risk_difference_percent: 25.0,
        }
    }
}

impl LegalWatchConfig {
    pub fn validate(&self) -> Result<(), LegalWatchConfigError> {
        let value = self.risk_difference_percent;
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(LegalWatchConfigError::NonPositivePercent(value))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LegalWatchConfigError {
    #[error("risk_difference_percent must be a finite value greater than zero (got {0})")]
    NonPositivePercent(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalRiskMetric {
    pub risk_score: f64,
    pub portfolio_average_risk: f64,
    pub difference: f64,
    pub difference_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalRiskDecision {
    pub property_id: PropertyId,
    pub jurisdiction: String,
    pub severity: InsightSeverity,
    pub metric: LegalRiskMetric,
}

/// Flag a property whose risk score exceeds the portfolio average by the configured percent.
///
/// Lower-than-average risk never triggers. A zero or non-finite average is skipped.
pub fn evaluate_legal_risk(
    snapshot: &LegalRiskSnapshot,
    config: &LegalWatchConfig,
) -> Option<LegalRiskDecision> {
    let baseline = snapshot.portfolio_average_risk;
    if !usable_baseline(baseline) || !snapshot.risk_score.is_finite() {
        debug!(
            property = %snapshot.property_id,
            jurisdiction = %snapshot.jurisdiction,
            "legal risk snapshot skipped: unusable baseline or score"
        );
        return None;
    }

    let difference = snapshot.risk_score - baseline;
    let difference_percent = difference * 100.0 / baseline;
    if difference_percent <= 0.0 {
        return None;
    }

    let severity = classify_deviation(difference_percent, config.risk_difference_percent)?;
    Some(LegalRiskDecision {
        property_id: snapshot.property_id.clone(),
        jurisdiction: snapshot.jurisdiction.clone(),
        severity,
        metric: LegalRiskMetric {
            risk_score: snapshot.risk_score,
            portfolio_average_risk: baseline,
            difference,
            difference_percent,
        },
    })
}

/// Evaluate a batch and return the flagged properties, most severe and largest gap first.
pub fn rank_legal_risks(
    snapshots: &[LegalRiskSnapshot],
    config: &LegalWatchConfig,
) -> Vec<LegalRiskDecision> {
    let mut decisions: Vec<LegalRiskDecision> = snapshots
        .iter()
        .filter_map(|snapshot| evaluate_legal_risk(snapshot, config))
        .collect();

    decisions.sort_by(|left, right| {
        right.severity.cmp(&left.severity).then_with(|| {
            right
                .metric
                .difference_percent
                .total_cmp(&left.metric.difference_percent)
        })
    });
    decisions
}
