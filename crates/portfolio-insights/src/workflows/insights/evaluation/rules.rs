use super::super::domain::{InsightMetric, InsightSeverity, MetricSnapshot, MetricType};
use super::config::ThresholdConfig;
use super::policy::{classify_deviation, usable_baseline};
use super::{Baseline, Direction, TriggerDecision};

pub(crate) fn evaluate_rule(
    snapshot: &MetricSnapshot,
    config: &ThresholdConfig,
) -> Option<TriggerDecision> {
    match snapshot.metric_type {
        MetricType::Occupancy => relative_rule(
            snapshot,
            config.occupancy_difference_percent,
            Direction::Below,
        ),
        MetricType::Pricing => relative_rule(
            snapshot,
            config.pricing_difference_percent,
            Direction::Above,
        ),
        MetricType::Availability => closed_days_rule(snapshot, config.closed_days_threshold),
        MetricType::Restriction => min_stay_rule(snapshot, config.min_stay_comparison_enabled),
        MetricType::Onboarding => onboarding_rule(snapshot, config.occupancy_difference_percent),
    }
}

/// Builds the metric block against the chosen baseline.
pub(crate) fn measure(snapshot: &MetricSnapshot, baseline: f64) -> InsightMetric {
    let difference = snapshot.property_value - baseline;
    InsightMetric {
        property_value: snapshot.property_value,
        portfolio_average: snapshot.portfolio_average,
        peer_group_average: peer_average(snapshot),
        difference,
        difference_percent: difference * 100.0 / baseline,
    }
}

fn peer_average(snapshot: &MetricSnapshot) -> Option<f64> {
    snapshot
        .peer_group_average
        .filter(|value| usable_baseline(*value))
}

fn directional_severity(
    metric: &InsightMetric,
    threshold: f64,
    direction: Direction,
) -> Option<InsightSeverity> {
    let signed = metric.difference_percent;
    let in_direction = match direction {
        Direction::Below => signed < 0.0,
        Direction::Above => signed > 0.0,
    };
    if !in_direction {
        return None;
    }
    classify_deviation(signed.abs(), threshold)
}

/// Occupancy and pricing: portfolio comparison first, peer-group comparison as info fallback.
fn relative_rule(
    snapshot: &MetricSnapshot,
    threshold: f64,
    direction: Direction,
) -> Option<TriggerDecision> {
    let metric = measure(snapshot, snapshot.portfolio_average);
    if let Some(severity) = directional_severity(&metric, threshold, direction) {
        return Some(TriggerDecision::new(
            snapshot,
            severity,
            metric,
            Baseline::Portfolio,
        ));
    }

    let peer = peer_average(snapshot)?;
    let peer_metric = measure(snapshot, peer);
    directional_severity(&peer_metric, threshold, direction).map(|_| {
        TriggerDecision::new(
            snapshot,
            InsightSeverity::Info,
            peer_metric,
            Baseline::PeerGroup,
        )
    })
}

fn closed_days_rule(snapshot: &MetricSnapshot, threshold: u32) -> Option<TriggerDecision> {
    if threshold == 0 || snapshot.property_value < 0.0 {
        return None;
    }

    let closed_days = snapshot.property_value.floor();
    let threshold = f64::from(threshold);
    let severity = if closed_days >= threshold * 2.0 {
        InsightSeverity::Critical
    } else if closed_days >= threshold {
        InsightSeverity::Warning
    } else {
        return None;
    };

    let metric = measure(snapshot, snapshot.portfolio_average);
    Some(TriggerDecision::new(
        snapshot,
        severity,
        metric,
        Baseline::Portfolio,
    ))
}

fn min_stay_rule(snapshot: &MetricSnapshot, enabled: bool) -> Option<TriggerDecision> {
    if !enabled {
        return None;
    }

    let property_nights = snapshot.property_value.round();
    let portfolio_nights = snapshot.portfolio_average.round();
    if property_nights == portfolio_nights {
        return None;
    }

    let metric = measure(snapshot, snapshot.portfolio_average);
    Some(TriggerDecision::new(
        snapshot,
        InsightSeverity::Warning,
        metric,
        Baseline::Portfolio,
    ))
}

fn onboarding_rule(snapshot: &MetricSnapshot, threshold: f64) -> Option<TriggerDecision> {
    let (baseline_value, baseline) = match peer_average(snapshot) {
        Some(peer) => (peer, Baseline::PeerGroup),
        None => (snapshot.portfolio_average, Baseline::Portfolio),
    };

    let metric = measure(snapshot, baseline_value);
    directional_severity(&metric, threshold, Direction::Below)
        .map(|severity| TriggerDecision::new(snapshot, severity, metric, baseline))
}
