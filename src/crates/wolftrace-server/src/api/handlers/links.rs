//! Manual graph links created by reviewers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::error::ApiError;
use crate::state::AppState;
use wolftrace_core::EdgeKind;

/// POST /api/v1/links body.
#[derive(Debug, Deserialize)]
pub struct CreateLink {
    /// Edge kind.
    pub kind: EdgeKind,
    /// Source node id.
    pub source_id: String,
    /// Target node id.
    pub target_id: String,
    /// Optional edge payload.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

/// Create a manual edge between two nodes of the same case.
///
/// POST /api/v1/links
pub async fn create_link(
    State(state): State<AppState>,
    Json(body): Json<CreateLink>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let edge = state
        .engine
        .link_nodes(body.kind, &body.source_id, &body.target_id, body.data)?;
    tracing::info!(edge = %edge.id, kind = %edge.kind, "manual link created");
    Ok((
        StatusCode::CREATED,
        Json(json!({"status": "ok", "data": edge})),
    ))
}
