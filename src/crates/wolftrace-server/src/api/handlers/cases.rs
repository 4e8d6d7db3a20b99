//! Case listing, snapshots and metadata.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::api::error::ApiError;
use crate::state::AppState;

/// List all cases.
///
/// GET /api/v1/cases
pub async fn list_cases(State(state): State<AppState>) -> Json<Value> {
    let cases = state.engine.store().all_cases();
    Json(json!({"status": "ok", "data": cases}))
}

/// Full snapshot of one case.
///
/// GET /api/v1/cases/:case_id
pub async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = state.engine.store().case_snapshot(&case_id);
    if snapshot.nodes.is_empty() && state.engine.store().case_report_ids(&case_id).is_empty() {
        return Err(ApiError::not_found(format!("unknown case {case_id}")));
    }
    let metadata = state.engine.store().get_case_metadata(&case_id);
    Ok(Json(json!({
        "status": "ok",
        "data": {
            "snapshot": snapshot,
            "metadata": metadata,
        }
    })))
}

/// Raw payloads of a case's reports, in submission order.
///
/// GET /api/v1/cases/:case_id/reports
pub async fn case_reports(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let report_ids = state.engine.store().case_report_ids(&case_id);
    if report_ids.is_empty() {
        return Err(ApiError::not_found(format!("no reports for case {case_id}")));
    }
    let reports: Vec<Value> = report_ids
        .iter()
        .map(|id| {
            json!({
                "report_id": id,
                "payload": state.engine.store().report_payload(id),
            })
        })
        .collect();
    Ok(Json(json!({"status": "ok", "data": reports})))
}

/// Merge fields into a case's metadata.
///
/// PATCH /api/v1/cases/:case_id/metadata
pub async fn patch_metadata(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Json<Value> {
    state.engine.store().set_case_metadata(&case_id, fields);
    let metadata = state.engine.store().get_case_metadata(&case_id);
    Json(json!({"status": "ok", "data": metadata}))
}
