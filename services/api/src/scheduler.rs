use crate::infra::ThresholdWatcher;
use portfolio_insights::workflows::insights::{InsightEngine, PassSummary, SnapshotProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Run an evaluation pass every `period` until the process exits.
pub(crate) fn spawn(
    engine: Arc<InsightEngine>,
    provider: Arc<dyn SnapshotProvider>,
    mut watcher: Option<ThresholdWatcher>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = period.as_secs(), "insight scheduler started");

        loop {
            ticker.tick().await;
            run_scheduled_pass(&engine, &provider, watcher.as_mut()).await;
        }
    })
}

/// One scheduled pass: pick up changed thresholds, fetch snapshots, evaluate.
///
/// An unreadable export skips the pass and the next tick tries again. Malformed records
/// inside a readable export are only counted as rejected.
pub(crate) async fn run_scheduled_pass(
    engine: &InsightEngine,
    provider: &Arc<dyn SnapshotProvider>,
    watcher: Option<&mut ThresholdWatcher>,
) -> Option<PassSummary> {
    if let Some(watcher) = watcher {
        match watcher.poll() {
            Ok(Some(thresholds)) => {
                if let Err(err) = engine.reload_thresholds(thresholds) {
                    warn!(error = %err, "threshold file rejected; keeping current thresholds");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(path = %watcher.path().display(), error = %err, "threshold file unavailable")
            }
        }
    }

    let provider = Arc::clone(provider);
    let fetched = match tokio::task::spawn_blocking(move || provider.fetch()).await {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "snapshot fetch task aborted");
            return None;
        }
    };

    match fetched {
        Ok(batch) => Some(engine.run_batch(batch).await),
        Err(err) => {
            warn!(error = %err, "snapshot fetch failed; skipping pass");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{raw_snapshot, InMemorySnapshotProvider};
    use portfolio_insights::workflows::insights::{
        FileSnapshotProvider, InsightFilter, InsightStore, SnapshotBatch, SnapshotImportError,
        ThresholdConfig,
    };

    struct BrokenProvider;

    impl SnapshotProvider for BrokenProvider {
        fn fetch(&self) -> Result<SnapshotBatch, SnapshotImportError> {
            Err(SnapshotImportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "export missing",
            )))
        }
    }

    fn engine() -> Arc<InsightEngine> {
        Arc::new(
            InsightEngine::new(Arc::new(InsightStore::new()), ThresholdConfig::default())
                .expect("default thresholds"),
        )
    }

    #[tokio::test]
    async fn scheduled_pass_evaluates_provider_snapshots() {
        let engine = engine();
        let memory = InMemorySnapshotProvider::default();
        memory.replace(vec![raw_snapshot(
            "prop-a", "Dune House", "occupancy", 40.0, 60.0, None,
        )]);
        let provider: Arc<dyn SnapshotProvider> = Arc::new(memory.clone());

        let summary = run_scheduled_pass(&engine, &provider, None)
            .await
            .expect("pass runs");
        assert_eq!(summary.created, 1);

        memory.replace(vec![raw_snapshot(
            "prop-a", "Dune House", "occupancy", 58.0, 60.0, None,
        )]);
        let summary = run_scheduled_pass(&engine, &provider, None)
            .await
            .expect("pass runs");
        assert_eq!(summary.resolved, 1);
        assert!(engine
            .store()
            .list_active(&InsightFilter::default())
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_skips_the_pass() {
        let engine = engine();
        let provider: Arc<dyn SnapshotProvider> = Arc::new(BrokenProvider);

        assert!(run_scheduled_pass(&engine, &provider, None).await.is_none());
    }

    #[tokio::test]
    async fn malformed_export_rows_do_not_skip_the_pass() {
        let engine = engine();
        let path = std::env::temp_dir().join(format!(
            "insight-snapshots-scheduler-{}.csv",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "property_id,property_name,metric_type,property_value,portfolio_average,peer_group_average,comparison_period\n\
prop-a,Dune House,occupancy,40,60,,30d\n\
prop-b,Harbor Loft,onboarding,50,52,n/a,30d\n\
prop-c,Cedar Cabin,pricing,130,100,,30d\n",
        )
        .expect("write export");
        let provider: Arc<dyn SnapshotProvider> = Arc::new(FileSnapshotProvider::new(&path));

        let summary = run_scheduled_pass(&engine, &provider, None)
            .await
            .expect("pass runs");
        assert_eq!(summary.created, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(engine.store().open_count().expect("count"), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn changed_threshold_file_is_applied_before_the_pass() {
        let engine = engine();
        let path = std::env::temp_dir().join(format!(
            "insight-thresholds-scheduler-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "pricing_difference_percent": 10 }"#).expect("write file");
        let mut watcher = ThresholdWatcher::new(&path);

        let memory = InMemorySnapshotProvider::default();
        memory.replace(vec![raw_snapshot(
            "prop-b", "Harbor Loft", "pricing", 112.0, 100.0, None,
        )]);
        let provider: Arc<dyn SnapshotProvider> = Arc::new(memory);

        let summary = run_scheduled_pass(&engine, &provider, Some(&mut watcher))
            .await
            .expect("pass runs");
        assert_eq!(engine.thresholds().pricing_difference_percent, 10.0);
        assert_eq!(summary.created, 1);

        let _ = std::fs::remove_file(&path);
    }
}
