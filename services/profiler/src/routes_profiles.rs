use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use profile_store::{ingest_batch, GroupStats, IngestOutcome, OverallStats, StoreError, UploadUnit};

use crate::state::SharedState;

type ApiError = (StatusCode, Json<Value>);

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/profiles", get(list_profiles).post(upload_profiles))
        .route(
            "/profiles/:table_name",
            get(get_profile).delete(delete_profile),
        )
        .route("/profiles/:table_name/statistics/overall", get(stats_overall))
        .route("/profiles/:table_name/statistics/core", get(stats_by_core))
        .route("/profiles/:table_name/statistics/task", get(stats_by_task))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "status": "error", "message": message.into() }))
}

/// Boundary between the store's error taxonomy and HTTP. Everything is
/// logged here and converted to a `{status, message}` body; nothing
/// propagates past the handler.
fn map_store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::InvalidName(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(%e, "storage failure");
    } else {
        warn!(%e, "request rejected");
    }
    (status, error_body(e.to_string()))
}

async fn upload_profiles(
    State(state): State<SharedState>,
    Json(units): Json<Vec<UploadUnit>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if units.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("no profile data to upload"),
        ));
    }

    let report = ingest_batch(&state.registry, &units)
        .await
        .map_err(map_store_error)?;

    match report.outcome() {
        IngestOutcome::Success => Ok((
            StatusCode::CREATED,
            Json(json!({
                "status": "success",
                "message": format!("{} profile(s) uploaded", report.created),
            })),
        )),
        IngestOutcome::NoOp => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "info",
                "message": "no new profiles: all units were duplicates, empty or invalid",
            })),
        )),
    }
}

async fn list_profiles(
    State(state): State<SharedState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = state.queries.list_datasets().await.map_err(map_store_error)?;
    Ok(Json(names))
}

async fn get_profile(
    State(state): State<SharedState>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let rows = state
        .queries
        .fetch_rows(&table_name)
        .await
        .map_err(map_store_error)?;
    Ok(Json(json!({ "status": "success", "data": rows })))
}

async fn delete_profile(
    State(state): State<SharedState>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .registry
        .drop(&table_name)
        .await
        .map_err(map_store_error)?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("profile {table_name:?} deleted"),
    })))
}

async fn stats_overall(
    State(state): State<SharedState>,
    Path(table_name): Path<String>,
) -> Result<Json<OverallStats>, ApiError> {
    let stats = state
        .queries
        .overall_stats(&table_name)
        .await
        .map_err(map_store_error)?;
    Ok(Json(stats))
}

async fn stats_by_core(
    State(state): State<SharedState>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let groups = state
        .queries
        .stats_by_core(&table_name)
        .await
        .map_err(map_store_error)?;
    Ok(group_json("core", groups))
}

async fn stats_by_task(
    State(state): State<SharedState>,
    Path(table_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let groups = state
        .queries
        .stats_by_task(&table_name)
        .await
        .map_err(map_store_error)?;
    Ok(group_json("task", groups))
}

/// Group rows go on the wire keyed by the grouping column (`core` or
/// `task`) rather than a generic label field.
fn group_json(key: &str, groups: Vec<GroupStats>) -> Json<Value> {
    let rows: Vec<Value> = groups
        .into_iter()
        .map(|g| {
            json!({
                key: g.label,
                "count": g.count,
                "min": g.min,
                "max": g.max,
                "avg": g.avg,
                "stddev": g.stddev,
            })
        })
        .collect();
    Json(Value::Array(rows))
}

async fn not_found(uri: Uri) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        error_body(format!("{uri} is not a valid route")),
    )
}
