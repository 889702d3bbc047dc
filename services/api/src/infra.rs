use metrics_exporter_prometheus::PrometheusHandle;
use portfolio_insights::config::{load_threshold_file, ConfigError};
use portfolio_insights::workflows::insights::{
    RawMetricSnapshot, SnapshotBatch, SnapshotImportError, SnapshotProvider, ThresholdConfig,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Tracks a threshold file and hands back its contents only when the file changed.
#[derive(Debug)]
pub(crate) struct ThresholdWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ThresholdWatcher {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file is unchanged since the last successful poll.
    pub(crate) fn poll(&mut self) -> Result<Option<ThresholdConfig>, ConfigError> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|source| ConfigError::ThresholdFileIo {
                path: self.path.clone(),
                source,
            })?;

        if self.last_modified == Some(modified) {
            return Ok(None);
        }

        let thresholds = load_threshold_file(&self.path)?;
        self.last_modified = Some(modified);
        Ok(Some(thresholds))
    }
}

/// Snapshot source fed by hand; used by the demo and scheduler tests.
#[derive(Default, Clone)]
pub(crate) struct InMemorySnapshotProvider {
    snapshots: Arc<Mutex<Vec<RawMetricSnapshot>>>,
}

impl InMemorySnapshotProvider {
    pub(crate) fn replace(&self, snapshots: Vec<RawMetricSnapshot>) {
        match self.snapshots.lock() {
            Ok(mut guard) => *guard = snapshots,
            Err(poisoned) => *poisoned.into_inner() = snapshots,
        }
    }
}

impl SnapshotProvider for InMemorySnapshotProvider {
    fn fetch(&self) -> Result<SnapshotBatch, SnapshotImportError> {
        let snapshots = match self.snapshots.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Ok(snapshots.into())
    }
}

pub(crate) fn raw_snapshot(
    property_id: &str,
    property_name: &str,
    metric_type: &str,
    property_value: f64,
    portfolio_average: f64,
    peer_group_average: Option<f64>,
) -> RawMetricSnapshot {
    RawMetricSnapshot {
        property_id: property_id.to_string(),
        property_name: Some(property_name.to_string()).filter(|name| !name.is_empty()),
        metric_type: metric_type.to_string(),
        property_value,
        portfolio_average,
        peer_group_average,
        comparison_period: "30d".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_reports_each_change_once() {
        let path = std::env::temp_dir().join(format!(
            "insight-thresholds-watch-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "pricing_difference_percent": 18 }"#).expect("write file");

        let mut watcher = ThresholdWatcher::new(&path);
        let first = watcher.poll().expect("poll succeeds");
        assert_eq!(
            first.map(|config| config.pricing_difference_percent),
            Some(18.0)
        );
        assert!(watcher.poll().expect("poll succeeds").is_none());

        let _ = std::fs::remove_file(&path);
        assert!(watcher.poll().is_err());
    }
}
