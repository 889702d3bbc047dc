//! Recurring evaluation pass tying the evaluator, builder and lifecycle store together.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::domain::{MetricSnapshot, PropertyId};
use super::evaluation::{assess, Assessment, ThresholdConfig, ThresholdConfigError};
use super::import::{RawMetricSnapshot, SnapshotBatch, SnapshotRejection};
use super::store::{InsightStore, StoreError, UpsertOutcome};

/// Current thresholds, swapped atomically on reload.
///
/// A pass clones the `Arc` once when it starts, so it never sees a mix of old and new values.
#[derive(Debug)]
pub struct ThresholdHandle {
    current: RwLock<Arc<ThresholdConfig>>,
}

impl ThresholdHandle {
    pub fn new(config: ThresholdConfig) -> Result<Self, ThresholdConfigError> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(config)),
        })
    }

    pub fn current(&self) -> Arc<ThresholdConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn reload(&self, config: ThresholdConfig) -> Result<(), ThresholdConfigError> {
        config.validate()?;
        let next = Arc::new(config);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        Ok(())
    }
}

/// Counters describing one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub properties: usize,
    pub evaluated: usize,
    pub triggered: usize,
    pub created: usize,
    pub refreshed: usize,
    pub severity_changes: usize,
    pub suppressed: usize,
    pub resolved: usize,
    pub non_evaluable: usize,
    pub rejected: usize,
    pub purged: usize,
    pub failed_properties: Vec<String>,
}

impl PassSummary {
    fn absorb(&mut self, other: PropertyOutcome) {
        self.evaluated += other.evaluated;
        self.triggered += other.triggered;
        self.created += other.created;
        self.refreshed += other.refreshed;
        self.severity_changes += other.severity_changes;
        self.suppressed += other.suppressed;
        self.resolved += other.resolved;
        self.non_evaluable += other.non_evaluable;
    }
}

#[derive(Debug, Default)]
struct PropertyOutcome {
    evaluated: usize,
    triggered: usize,
    created: usize,
    refreshed: usize,
    severity_changes: usize,
    suppressed: usize,
    resolved: usize,
    non_evaluable: usize,
}

#[derive(Debug, thiserror::Error)]
enum PropertyFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("evaluation panicked: {0}")]
    Panicked(String),
}

type WorkerReport = (PropertyId, Result<PropertyOutcome, PropertyFailure>);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Thresholds(#[from] ThresholdConfigError),
}

/// Owner of the store and thresholds; one instance per evaluation process.
pub struct InsightEngine {
    store: Arc<InsightStore>,
    thresholds: ThresholdHandle,
    archive_retention: Option<Duration>,
}

impl InsightEngine {
    pub fn new(store: Arc<InsightStore>, config: ThresholdConfig) -> Result<Self, EngineError> {
        Ok(Self {
            store,
            thresholds: ThresholdHandle::new(config)?,
            archive_retention: None,
        })
    }

    /// Purge archived insights older than `retention` at the end of every pass.
    pub fn with_archive_retention(mut self, retention: Duration) -> Self {
        self.archive_retention = Some(retention);
        self
    }

    pub fn store(&self) -> &Arc<InsightStore> {
        &self.store
    }

    pub fn thresholds(&self) -> Arc<ThresholdConfig> {
        self.thresholds.current()
    }

    /// Validate and install new thresholds for subsequent passes.
    pub fn reload_thresholds(&self, config: ThresholdConfig) -> Result<(), EngineError> {
        self.thresholds.reload(config.clone())?;
        info!(
            occupancy = config.occupancy_difference_percent,
            pricing = config.pricing_difference_percent,
            min_stay = config.min_stay_comparison_enabled,
            closed_days = config.closed_days_threshold,
            "threshold configuration reloaded"
        );
        Ok(())
    }

    /// Convert raw snapshots, dropping unrecognized ones, then run a pass.
    pub async fn run_raw_pass(&self, raw: Vec<RawMetricSnapshot>) -> PassSummary {
        let (snapshots, rejections) = validate_snapshots(raw);
        let mut summary = self.run_pass(snapshots).await;
        summary.rejected = rejections.len();
        summary
    }

    /// Run a pass over an imported batch; malformed records count as rejected.
    pub async fn run_batch(&self, batch: SnapshotBatch) -> PassSummary {
        for bad in &batch.malformed {
            warn!(record = bad.record, reason = %bad.reason, "malformed metric snapshot");
        }
        let mut summary = self.run_raw_pass(batch.snapshots).await;
        summary.rejected += batch.malformed.len();
        summary
    }

    /// Evaluate every snapshot, upserting triggered conditions and resolving cleared ones.
    ///
    /// Properties are processed concurrently; snapshots of one property stay on one worker, in
    /// input order. A failing property is reported in the summary and does not affect others.
    pub async fn run_pass(&self, snapshots: Vec<MetricSnapshot>) -> PassSummary {
        let config = self.thresholds.current();
        let mut summary = PassSummary {
            started_at: Some(self.store.now()),
            ..PassSummary::default()
        };

        let mut by_property: BTreeMap<PropertyId, Vec<MetricSnapshot>> = BTreeMap::new();
        for snapshot in snapshots {
            by_property
                .entry(snapshot.property_id.clone())
                .or_default()
                .push(snapshot);
        }
        summary.properties = by_property.len();

        let pending: BTreeSet<PropertyId> = by_property.keys().cloned().collect();
        let mut workers = JoinSet::new();
        for (property_id, batch) in by_property {
            let store = Arc::clone(&self.store);
            let config = Arc::clone(&config);
            workers.spawn_blocking(move || {
                isolate(property_id, || process_property(&store, &config, batch))
            });
        }
        drain_workers(workers, pending, &mut summary).await;

        if let Some(retention) = self.archive_retention {
            match self.store.purge_archived_before(self.store.now() - retention) {
                Ok(purged) => summary.purged = purged,
                Err(err) => warn!(error = %err, "archived insight purge failed"),
            }
        }

        info!(
            properties = summary.properties,
            evaluated = summary.evaluated,
            created = summary.created,
            refreshed = summary.refreshed,
            resolved = summary.resolved,
            non_evaluable = summary.non_evaluable,
            purged = summary.purged,
            failed = summary.failed_properties.len(),
            "insight evaluation pass complete"
        );

        summary
    }
}

/// Split raw snapshots into valid ones and rejections, logging each rejection.
pub fn validate_snapshots(
    raw: Vec<RawMetricSnapshot>,
) -> (Vec<MetricSnapshot>, Vec<(String, SnapshotRejection)>) {
    let mut snapshots = Vec::with_capacity(raw.len());
    let mut rejections = Vec::new();

    for record in raw {
        let property_id = record.property_id.clone();
        match MetricSnapshot::try_from(record) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(rejection) => {
                warn!(property = %property_id, reason = %rejection, "rejected metric snapshot");
                rejections.push((property_id, rejection));
            }
        }
    }

    (snapshots, rejections)
}

/// Run one property's work, turning a panic into a failure attributed to that property.
fn isolate<F>(property_id: PropertyId, work: F) -> WorkerReport
where
    F: FnOnce() -> Result<PropertyOutcome, StoreError>,
{
    let result = match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(outcome) => outcome.map_err(PropertyFailure::from),
        Err(payload) => Err(PropertyFailure::Panicked(panic_message(payload.as_ref()))),
    };
    (property_id, result)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Fold worker reports into the summary. Properties whose worker never reported are failed.
async fn drain_workers(
    mut workers: JoinSet<WorkerReport>,
    mut pending: BTreeSet<PropertyId>,
    summary: &mut PassSummary,
) {
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((property_id, result)) => {
                pending.remove(&property_id);
                match result {
                    Ok(outcome) => summary.absorb(outcome),
                    Err(err) => {
                        warn!(property = %property_id, error = %err, "property evaluation failed");
                        summary.failed_properties.push(property_id.0);
                    }
                }
            }
            Err(err) => warn!(error = %err, "property evaluation worker aborted"),
        }
    }

    for property_id in pending {
        warn!(property = %property_id, "property evaluation did not report");
        summary.failed_properties.push(property_id.0);
    }
    summary.failed_properties.sort();
}

fn process_property(
    store: &InsightStore,
    config: &ThresholdConfig,
    batch: Vec<MetricSnapshot>,
) -> Result<PropertyOutcome, StoreError> {
    let mut outcome = PropertyOutcome::default();

    for snapshot in batch {
        outcome.evaluated += 1;
        match assess(&snapshot, config) {
            Assessment::Triggered(decision) => {
                outcome.triggered += 1;
                let receipt =
                    store.upsert(&decision, &snapshot.property_id, &snapshot.property_name)?;
                match receipt.outcome {
                    UpsertOutcome::Created => outcome.created += 1,
                    UpsertOutcome::Refreshed { severity_changed } => {
                        outcome.refreshed += 1;
                        if severity_changed {
                            outcome.severity_changes += 1;
                        }
                    }
                    UpsertOutcome::Suppressed => outcome.suppressed += 1,
                }
            }
            Assessment::WithinThreshold => {
                let resolved = store.resolve(
                    &snapshot.property_id,
                    snapshot.metric_type,
                    snapshot.comparison_period,
                )?;
                if resolved.is_some() {
                    outcome.resolved += 1;
                }
            }
            Assessment::NonEvaluable(_) => outcome.non_evaluable += 1,
        }
    }

    Ok(outcome)
}
