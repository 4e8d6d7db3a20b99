//! Report intake.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::state::AppState;

/// POST /api/v1/reports body.
#[derive(Debug, Deserialize)]
pub struct SubmitReport {
    /// Case the tip belongs to; a fresh id opens a new case.
    pub case_id: String,
    /// The raw tip payload (text, timestamp, location, media_url, ...).
    pub report: Value,
}

/// Accept an anonymous tip.
///
/// POST /api/v1/reports
pub async fn submit_report(
    State(state): State<AppState>,
    Json(body): Json<SubmitReport>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.case_id.trim().is_empty() {
        return Err(ApiError::bad_request("case_id must not be empty"));
    }
    if !body.report.is_object() {
        return Err(ApiError::bad_request("report must be a JSON object"));
    }

    let node = state.engine.ingest_report(&body.case_id, body.report)?;
    tracing::info!(case_id = %body.case_id, report = %node.id, "report accepted");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "ok",
            "data": node,
        })),
    ))
}
