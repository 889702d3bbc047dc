use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for managed properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for insights, stable while the underlying condition stays open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsightId(pub String);

impl InsightId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InsightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Occupancy,
    Pricing,
    Availability,
    Restriction,
    Onboarding,
}

impl MetricType {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Occupancy,
            Self::Pricing,
            Self::Availability,
            Self::Restriction,
            Self::Onboarding,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Occupancy => "Occupancy",
            Self::Pricing => "Pricing",
            Self::Availability => "Availability",
            Self::Restriction => "Restrictions",
            Self::Onboarding => "Onboarding",
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Occupancy => "occupancy",
            Self::Pricing => "pricing",
            Self::Availability => "availability",
            Self::Restriction => "restriction",
            Self::Onboarding => "onboarding",
        }
    }

    /// Parses the wire code, returning `None` for values this build does not know about.
    pub fn from_code(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "occupancy" => Some(Self::Occupancy),
            "pricing" => Some(Self::Pricing),
            "availability" => Some(Self::Availability),
            "restriction" | "restrictions" => Some(Self::Restriction),
            "onboarding" => Some(Self::Onboarding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComparisonPeriod {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "14d")]
    FourteenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl ComparisonPeriod {
    pub const fn code(self) -> &'static str {
        match self {
            Self::SevenDays => "7d",
            Self::FourteenDays => "14d",
            Self::ThirtyDays => "30d",
        }
    }

    pub const fn days(self) -> u32 {
        match self {
            Self::SevenDays => 7,
            Self::FourteenDays => 14,
            Self::ThirtyDays => 30,
        }
    }

    pub fn from_code(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "7d" | "7" => Some(Self::SevenDays),
            "14d" | "14" => Some(Self::FourteenDays),
            "30d" | "30" => Some(Self::ThirtyDays),
            _ => None,
        }
    }
}

/// Insight severity. Variant order doubles as display priority (`Critical` sorts highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSeverity {
    Info,
    Warning,
    Critical,
}

impl InsightSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Unread,
    Read,
    Archived,
}

impl InsightStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unread => "Unread",
            Self::Read => "Read",
            Self::Archived => "Archived",
        }
    }

    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Archived)
    }
}

/// Navigation targets understood by the dashboard's action router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    OpenPricing,
    OpenRules,
    OpenProperty,
    OpenCalendar,
    OpenOnboarding,
}

impl ActionKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::OpenPricing => "open_pricing",
            Self::OpenRules => "open_rules",
            Self::OpenProperty => "open_property",
            Self::OpenCalendar => "open_calendar",
            Self::OpenOnboarding => "open_onboarding",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenPricing => "Review pricing",
            Self::OpenRules => "Edit stay rules",
            Self::OpenProperty => "Open property",
            Self::OpenCalendar => "Open calendar",
            Self::OpenOnboarding => "Continue onboarding",
        }
    }
}

/// Validated metric reading for one property, metric type and comparison window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub property_id: PropertyId,
    #[serde(default)]
    pub property_name: String,
    pub metric_type: MetricType,
    pub property_value: f64,
    pub portfolio_average: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_group_average: Option<f64>,
    pub comparison_period: ComparisonPeriod,
}

impl MetricSnapshot {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            property_id: self.property_id.clone(),
            metric_type: self.metric_type,
            comparison_period: self.comparison_period,
        }
    }
}

/// The `(property, metric type, comparison period)` tuple owning at most one open insight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub property_id: PropertyId,
    pub metric_type: MetricType,
    pub comparison_period: ComparisonPeriod,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.property_id,
            self.metric_type.code(),
            self.comparison_period.code()
        )
    }
}

/// Measured deviation carried on every insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightMetric {
    pub property_value: f64,
    pub portfolio_average: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_group_average: Option<f64>,
    pub difference: f64,
    pub difference_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightAction {
    pub id: String,
    pub label: String,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInsight {
    pub id: InsightId,
    pub property_id: PropertyId,
    pub property_name: String,
    #[serde(rename = "type")]
    pub insight_type: MetricType,
    pub severity: InsightSeverity,
    pub status: InsightStatus,
    pub comparison_period: ComparisonPeriod,
    pub title: String,
    pub message: String,
    pub suggestion: String,
    pub metric: InsightMetric,
    pub actions: Vec<InsightAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl PropertyInsight {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            property_id: self.property_id.clone(),
            metric_type: self.insight_type,
            comparison_period: self.comparison_period,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}
