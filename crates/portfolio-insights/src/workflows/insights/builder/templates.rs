use super::super::domain::{ActionKind, InsightSeverity, MetricType};
use super::super::evaluation::TriggerDecision;

pub(crate) const fn title(metric_type: MetricType, severity: InsightSeverity) -> &'static str {
    use InsightSeverity::{Critical, Info, Warning};
    use MetricType::*;

    match (metric_type, severity) {
        (Occupancy, Critical) => "Occupancy far below portfolio",
        (Occupancy, Warning) => "Occupancy below portfolio",
        (Occupancy, Info) => "Occupancy trailing peer group",
        (Pricing, Critical) => "Pricing well above portfolio",
        (Pricing, Warning) => "Pricing above portfolio",
        (Pricing, Info) => "Pricing above peer group",
        (Availability, Critical) => "Calendar heavily blocked",
        (Availability, Warning) => "Blocked days building up",
        (Availability, Info) => "Blocked days noted",
        (Restriction, Critical) => "Minimum stay far from portfolio norm",
        (Restriction, Warning) => "Minimum stay differs from portfolio",
        (Restriction, Info) => "Minimum stay differs from peer group",
        (Onboarding, Critical) => "Onboarding stalled",
        (Onboarding, Warning) => "Onboarding behind schedule",
        (Onboarding, Info) => "Onboarding trailing peer group",
    }
}

pub(crate) const fn suggestion(
    metric_type: MetricType,
    severity: InsightSeverity,
) -> &'static str {
    use InsightSeverity::{Critical, Info, Warning};
    use MetricType::*;

    match (metric_type, severity) {
        (Occupancy, Critical) => {
            "Lower nightly rates for the next two weeks and relax minimum stay to recover bookings."
        }
        (Occupancy, Warning) => {
            "Review rates against nearby listings and refresh the listing photos and description."
        }
        (Occupancy, Info) => "Compare this listing with its peer group before the next pricing run.",
        (Pricing, Critical) => {
            "Bring the base rate closer to the portfolio average to avoid losing bookings."
        }
        (Pricing, Warning) => {
            "Check whether the premium is justified by amenities or season, otherwise adjust the rate."
        }
        (Pricing, Info) => "Keep an eye on conversion; the rate sits above comparable properties.",
        (Availability, Critical) => {
            "Release owner blocks or maintenance holds that are no longer needed."
        }
        (Availability, Warning) => "Confirm every blocked day on the calendar is still required.",
        (Availability, Info) => "Blocked days are increasing; verify upcoming holds.",
        (Restriction, Critical) | (Restriction, Warning) | (Restriction, Info) => {
            "Align the minimum stay with the portfolio rules unless the property needs a custom policy."
        }
        (Onboarding, Critical) => {
            "Escalate the open onboarding steps with the owner; the property cannot go live yet."
        }
        (Onboarding, Warning) => "Follow up on the pending onboarding checklist items.",
        (Onboarding, Info) => "Onboarding is progressing slower than similar properties.",
    }
}

pub(crate) fn message(display_name: &str, decision: &TriggerDecision) -> String {
    let metric = &decision.metric;
    let baseline_value = metric.property_value - metric.difference;
    let percent = metric.difference_percent.abs();
    let days = decision.comparison_period.days();
    let baseline = decision.baseline.label();

    match decision.metric_type {
        MetricType::Occupancy => format!(
            "{display_name} occupancy is {:.1}% over the last {days} days, {percent:.1}% below the {baseline} ({baseline_value:.1}%).",
            metric.property_value
        ),
        MetricType::Pricing => format!(
            "{display_name} averages {:.2} per night over the last {days} days, {percent:.1}% above the {baseline} ({baseline_value:.2}).",
            metric.property_value
        ),
        MetricType::Availability => format!(
            "{display_name} has {:.0} closed or blocked days in the last {days} days (portfolio average {:.1}).",
            metric.property_value.floor(),
            metric.portfolio_average
        ),
        MetricType::Restriction => format!(
            "{display_name} requires a {:.0}-night minimum stay while the portfolio norm is {:.0} nights.",
            metric.property_value.round(),
            metric.portfolio_average.round()
        ),
        MetricType::Onboarding => format!(
            "{display_name} onboarding is {:.0}% complete, {percent:.1}% behind the {baseline} ({baseline_value:.0}%).",
            metric.property_value
        ),
    }
}

/// Actions offered for every insight of a type, in display order.
pub(crate) const fn actions_for(metric_type: MetricType) -> &'static [ActionKind] {
    match metric_type {
        MetricType::Occupancy => &[ActionKind::OpenPricing, ActionKind::OpenCalendar],
        MetricType::Pricing => &[ActionKind::OpenPricing, ActionKind::OpenProperty],
        MetricType::Availability => &[ActionKind::OpenCalendar, ActionKind::OpenProperty],
        MetricType::Restriction => &[ActionKind::OpenRules, ActionKind::OpenProperty],
        MetricType::Onboarding => &[ActionKind::OpenOnboarding, ActionKind::OpenProperty],
    }
}
