//! Alert publication onto the alert stream.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::state::AppState;

/// POST /api/v1/alerts body.
#[derive(Debug, Deserialize)]
pub struct PublishAlert {
    /// Case the alert concerns.
    pub case_id: String,
    /// Human-readable alert message.
    pub message: String,
    /// Severity label.
    #[serde(default)]
    pub severity: Option<String>,
}

/// Publish an alert to every alert-stream subscriber. Speech synthesis is
/// best-effort; the alert goes out with or without audio.
///
/// POST /api/v1/alerts
pub async fn publish_alert(
    State(state): State<AppState>,
    Json(body): Json<PublishAlert>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let audio_bytes = match state.speech.synthesize(&body.message).await {
        Ok(audio) => audio.map(|bytes| bytes.len()),
        Err(error) => {
            tracing::warn!(%error, "speech synthesis failed, publishing without audio");
            None
        }
    };

    let alert = json!({
        "id": format!("A-{}", Uuid::new_v4()),
        "case_id": body.case_id,
        "message": body.message,
        "severity": body.severity.unwrap_or_else(|| "info".to_string()),
        "has_audio": audio_bytes.is_some(),
        "audio_bytes": audio_bytes,
        "created_at": chrono::Utc::now().to_rfc3339(),
    });
    state.engine.publish_alert(alert.clone());
    tracing::info!(case_id = %alert["case_id"], "alert published");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"status": "ok", "data": alert})),
    ))
}
