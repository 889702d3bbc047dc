//! Comparative insight generation for managed short-term-rental properties.
//!
//! Snapshots flow through the threshold evaluator, triggered decisions are rendered by the
//! builder, and the lifecycle store keeps at most one open insight per property, metric type
//! and comparison period.

pub mod builder;
pub mod clock;
pub mod domain;
pub mod engine;
pub mod evaluation;
pub mod import;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    ActionKind, ComparisonPeriod, DedupKey, InsightAction, InsightId, InsightMetric,
    InsightSeverity, InsightStatus, MetricSnapshot, MetricType, PropertyId, PropertyInsight,
};
pub use engine::{validate_snapshots, EngineError, InsightEngine, PassSummary, ThresholdHandle};
pub use evaluation::{
    assess, evaluate, Assessment, Baseline, NonEvaluableReason, ThresholdConfig,
    ThresholdConfigError, TriggerDecision,
};
pub use import::{
    FileSnapshotProvider, MalformedSnapshot, RawMetricSnapshot, SnapshotBatch, SnapshotFormat,
    SnapshotImportError, SnapshotImporter, SnapshotProvider, SnapshotRejection,
};
pub use router::insight_router;
pub use store::{InsightFilter, InsightStore, StoreError, UpsertOutcome, UpsertReceipt};
