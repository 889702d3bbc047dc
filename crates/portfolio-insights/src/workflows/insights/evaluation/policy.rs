use super::super::domain::InsightSeverity;

/// Absorbs float noise so a deviation that lands exactly on a threshold still triggers.
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Maps a deviation magnitude onto the 1x/2x severity ladder.
///
/// Both bounds are inclusive. Non-positive or non-finite thresholds never trigger.
pub(crate) fn classify_deviation(magnitude: f64, threshold: f64) -> Option<InsightSeverity> {
    if !magnitude.is_finite() || !threshold.is_finite() || threshold <= 0.0 {
        return None;
    }

    if magnitude + BOUNDARY_TOLERANCE >= threshold * 2.0 {
        Some(InsightSeverity::Critical)
    } else if magnitude + BOUNDARY_TOLERANCE >= threshold {
        Some(InsightSeverity::Warning)
    } else {
        None
    }
}

/// Returns `true` when a baseline can serve as a divisor.
pub(crate) fn usable_baseline(value: f64) -> bool {
    value.is_finite() && value != 0.0
}
