use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{InsightId, PropertyInsight};
use super::engine::{EngineError, InsightEngine, PassSummary};
use super::evaluation::ThresholdConfig;
use super::import::SnapshotBatch;
use super::store::{InsightFilter, StoreError};

/// Request body for an on-demand evaluation pass.
///
/// Snapshots stay untyped here so a malformed record is counted as rejected instead of
/// failing the whole request.
#[derive(Debug, Deserialize)]
pub struct PassRequest {
    pub snapshots: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct InsightListResponse {
    pub total: usize,
    pub insights: Vec<PropertyInsight>,
}

/// Router exposing the insight read side, lifecycle actions and on-demand passes.
pub fn insight_router(engine: Arc<InsightEngine>) -> Router {
    Router::new()
        .route("/api/v1/insights", get(list_active_handler))
        .route("/api/v1/insights/archived", get(list_archived_handler))
        .route("/api/v1/insights/unread-count", get(unread_count_handler))
        .route("/api/v1/insights/passes", post(run_pass_handler))
        .route(
            "/api/v1/insights/thresholds",
            get(get_thresholds_handler).put(put_thresholds_handler),
        )
        .route("/api/v1/insights/:insight_id", get(get_handler))
        .route("/api/v1/insights/:insight_id/read", post(mark_read_handler))
        .route(
            "/api/v1/insights/:insight_id/archive",
            post(archive_handler),
        )
        .with_state(engine)
}

pub(crate) async fn list_active_handler(
    State(engine): State<Arc<InsightEngine>>,
    Query(filter): Query<InsightFilter>,
) -> Response {
    list_response(engine.store().list_active(&filter))
}

pub(crate) async fn list_archived_handler(
    State(engine): State<Arc<InsightEngine>>,
    Query(filter): Query<InsightFilter>,
) -> Response {
    list_response(engine.store().list_archived(&filter))
}

pub(crate) async fn unread_count_handler(State(engine): State<Arc<InsightEngine>>) -> Response {
    match engine.store().unread_count() {
        Ok(unread) => (StatusCode::OK, Json(json!({ "unread": unread }))).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn run_pass_handler(
    State(engine): State<Arc<InsightEngine>>,
    Json(request): Json<PassRequest>,
) -> Json<PassSummary> {
    let batch = SnapshotBatch::from_json_values(request.snapshots);
    Json(engine.run_batch(batch).await)
}

pub(crate) async fn get_thresholds_handler(
    State(engine): State<Arc<InsightEngine>>,
) -> Json<ThresholdConfig> {
    Json(engine.thresholds().as_ref().clone())
}

pub(crate) async fn put_thresholds_handler(
    State(engine): State<Arc<InsightEngine>>,
    Json(config): Json<ThresholdConfig>,
) -> Response {
    match engine.reload_thresholds(config) {
        Ok(()) => (
            StatusCode::OK,
            Json(engine.thresholds().as_ref().clone()),
        )
            .into_response(),
        Err(EngineError::Thresholds(err)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(EngineError::Store(err)) => store_error_response(err),
    }
}

pub(crate) async fn get_handler(
    State(engine): State<Arc<InsightEngine>>,
    Path(insight_id): Path<String>,
) -> Response {
    insight_response(engine.store().get(&InsightId(insight_id)))
}

pub(crate) async fn mark_read_handler(
    State(engine): State<Arc<InsightEngine>>,
    Path(insight_id): Path<String>,
) -> Response {
    insight_response(engine.store().mark_read(&InsightId(insight_id)))
}

pub(crate) async fn archive_handler(
    State(engine): State<Arc<InsightEngine>>,
    Path(insight_id): Path<String>,
) -> Response {
    insight_response(engine.store().archive(&InsightId(insight_id)))
}

fn list_response(result: Result<Vec<PropertyInsight>, StoreError>) -> Response {
    match result {
        Ok(insights) => {
            let body = InsightListResponse {
                total: insights.len(),
                insights,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => store_error_response(err),
    }
}

fn insight_response(result: Result<PropertyInsight, StoreError>) -> Response {
    match result {
        Ok(insight) => (StatusCode::OK, Json(insight)).into_response(),
        Err(err) => store_error_response(err),
    }
}

fn store_error_response(err: StoreError) -> Response {
    let status = match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
