//! Assembles user-facing insights from evaluator decisions.
//!
//! Text and actions come from fixed lookups keyed by metric type and severity, so the same
//! decision always renders the same insight.

mod templates;

use super::domain::{InsightAction, InsightId, InsightStatus, PropertyId, PropertyInsight};
use super::evaluation::TriggerDecision;
use chrono::{DateTime, Utc};

/// Rendered copy for a decision, shared by fresh builds and in-place refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightCopy {
    pub title: String,
    pub message: String,
    pub suggestion: String,
}

pub fn render_copy(
    decision: &TriggerDecision,
    property_id: &PropertyId,
    property_name: &str,
) -> InsightCopy {
    let display_name = display_name(property_id, property_name);
    InsightCopy {
        title: templates::title(decision.metric_type, decision.severity).to_string(),
        message: templates::message(display_name, decision),
        suggestion: templates::suggestion(decision.metric_type, decision.severity).to_string(),
    }
}

pub fn build_actions(id: &InsightId, decision: &TriggerDecision) -> Vec<InsightAction> {
    templates::actions_for(decision.metric_type)
        .iter()
        .map(|kind| InsightAction {
            id: format!("{}:{}", id, kind.code()),
            label: kind.label().to_string(),
            kind: *kind,
        })
        .collect()
}

/// Build a new unread insight for `decision`.
pub fn build(
    id: InsightId,
    decision: &TriggerDecision,
    property_id: &PropertyId,
    property_name: &str,
    now: DateTime<Utc>,
) -> PropertyInsight {
    let InsightCopy {
        title,
        message,
        suggestion,
    } = render_copy(decision, property_id, property_name);
    let actions = build_actions(&id, decision);

    PropertyInsight {
        id,
        property_id: property_id.clone(),
        property_name: display_name(property_id, property_name).to_string(),
        insight_type: decision.metric_type,
        severity: decision.severity,
        status: InsightStatus::Unread,
        comparison_period: decision.comparison_period,
        title,
        message,
        suggestion,
        metric: decision.metric.clone(),
        actions,
        created_at: now,
        updated_at: now,
        read_at: None,
        archived_at: None,
    }
}

/// Falls back to the property id when no display name was supplied.
pub fn display_name<'a>(property_id: &'a PropertyId, property_name: &'a str) -> &'a str {
    let trimmed = property_name.trim();
    if trimmed.is_empty() {
        property_id.as_str()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::insights::domain::{
        ActionKind, ComparisonPeriod, InsightMetric, InsightSeverity, MetricType,
    };
    use crate::workflows::insights::evaluation::Baseline;
    use chrono::TimeZone;

    fn decision(metric_type: MetricType, severity: InsightSeverity) -> TriggerDecision {
        TriggerDecision {
            metric_type,
            severity,
            comparison_period: ComparisonPeriod::ThirtyDays,
            metric: InsightMetric {
                property_value: 115.0,
                portfolio_average: 100.0,
                peer_group_average: None,
                difference: 15.0,
                difference_percent: 15.0,
            },
            baseline: Baseline::Portfolio,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn pricing_insight_renders_golden_copy() {
        let insight = build(
            InsightId("ins-000001".to_string()),
            &decision(MetricType::Pricing, InsightSeverity::Warning),
            &PropertyId::new("prop-b"),
            "Harbor Loft",
            now(),
        );

        assert_eq!(insight.title, "Pricing above portfolio");
        assert_eq!(
            insight.message,
            "Harbor Loft averages 115.00 per night over the last 30 days, 15.0% above the portfolio average (100.00)."
        );
        assert!(insight.suggestion.contains("premium"));
        assert_eq!(insight.status, InsightStatus::Unread);
        assert_eq!(insight.created_at, insight.updated_at);
    }

    #[test]
    fn pricing_actions_are_fixed_and_ordered() {
        let insight = build(
            InsightId("ins-000002".to_string()),
            &decision(MetricType::Pricing, InsightSeverity::Critical),
            &PropertyId::new("prop-b"),
            "Harbor Loft",
            now(),
        );

        let kinds: Vec<ActionKind> = insight.actions.iter().map(|action| action.kind).collect();
        assert_eq!(kinds, vec![ActionKind::OpenPricing, ActionKind::OpenProperty]);
        assert_eq!(insight.actions[0].id, "ins-000002:open_pricing");
        assert_eq!(insight.actions[0].label, "Review pricing");
    }

    #[test]
    fn onboarding_offers_onboarding_action_first() {
        let insight = build(
            InsightId("ins-000003".to_string()),
            &decision(MetricType::Onboarding, InsightSeverity::Warning),
            &PropertyId::new("prop-c"),
            "Cedar Cabin",
            now(),
        );
        assert_eq!(insight.actions[0].kind, ActionKind::OpenOnboarding);
    }

    #[test]
    fn blank_property_name_falls_back_to_id() {
        let insight = build(
            InsightId("ins-000004".to_string()),
            &decision(MetricType::Pricing, InsightSeverity::Warning),
            &PropertyId::new("prop-z"),
            "   ",
            now(),
        );

        assert_eq!(insight.property_name, "prop-z");
        assert!(insight.message.starts_with("prop-z averages"));
    }

    #[test]
    fn same_decision_renders_identical_copy() {
        let property = PropertyId::new("prop-a");
        let first = render_copy(
            &decision(MetricType::Occupancy, InsightSeverity::Critical),
            &property,
            "Dune House",
        );
        let second = render_copy(
            &decision(MetricType::Occupancy, InsightSeverity::Critical),
            &property,
            "Dune House",
        );
        assert_eq!(first, second);
    }
}
