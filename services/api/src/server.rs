use crate::cli::ServeArgs;
use crate::infra::{AppState, ThresholdWatcher};
use crate::routes::with_insight_routes;
use crate::scheduler;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use portfolio_insights::config::AppConfig;
use portfolio_insights::error::AppError;
use portfolio_insights::telemetry;
use portfolio_insights::workflows::insights::{
    FileSnapshotProvider, InsightEngine, InsightStore, SnapshotProvider,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InsightStore::new());
    let mut engine = InsightEngine::new(store, config.insights.thresholds.clone())?;
    if let Some(retention) = config.insights.archive_retention() {
        engine = engine.with_archive_retention(retention);
    }
    let engine = Arc::new(engine);

    match (&config.insights.snapshot_path, config.insights.scheduler_enabled()) {
        (Some(path), true) => {
            let provider: Arc<dyn SnapshotProvider> = Arc::new(FileSnapshotProvider::new(path));
            let watcher = config.insights.thresholds_path.as_ref().map(ThresholdWatcher::new);
            scheduler::spawn(
                engine.clone(),
                provider,
                watcher,
                config.insights.pass_interval,
            );
        }
        (Some(_), false) => info!("scheduled insight passes disabled"),
        (None, _) => warn!("INSIGHTS_SNAPSHOT_PATH not set; passes run only on demand"),
    }

    let app = with_insight_routes(engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "portfolio insight service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
