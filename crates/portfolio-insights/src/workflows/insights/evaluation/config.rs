use serde::{Deserialize, Serialize};

/// Tunable thresholds applied by every evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub occupancy_difference_percent: f64,
    pub pricing_difference_percent: f64,
    pub min_stay_comparison_enabled: bool,
    pub closed_days_threshold: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            occupancy_difference_percent: 10.0,
            pricing_difference_percent: 15.0,
            min_stay_comparison_enabled: true,
            closed_days_threshold: 7,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ThresholdConfigError> {
        check_percent(
            "occupancy_difference_percent",
            self.occupancy_difference_percent,
        )?;
        check_percent("pricing_difference_percent", self.pricing_difference_percent)?;
        Ok(())
    }
}

fn check_percent(field: &'static str, value: f64) -> Result<(), ThresholdConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ThresholdConfigError::NonPositivePercent { field, value })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThresholdConfigError {
    #[error("{field} must be a finite value greater than zero (got {value})")]
    NonPositivePercent { field: &'static str, value: f64 },
}
