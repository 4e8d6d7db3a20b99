//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use wolftrace_core::CoreError;

/// An error surfaced to an API caller.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 404 with a message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// 400 with a message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match &err {
            CoreError::DuplicateNode(_) => StatusCode::CONFLICT,
            CoreError::NodeNotFound(_) | CoreError::EdgeEndpointMissing(_) => {
                StatusCode::NOT_FOUND
            }
            CoreError::CrossCaseEdge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Serialization(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "request failed");
        }
        let body = Json(json!({
            "status": "error",
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_mutation_mapping() {
        let err: ApiError = CoreError::DuplicateNode("R-1".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        let err: ApiError = CoreError::NodeNotFound("R-2".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        let err: ApiError = CoreError::CrossCaseEdge {
            source_id: "a".into(),
            source_case: "C1".into(),
            target: "b".into(),
            target_case: "C2".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_mapping() {
        let err: ApiError = CoreError::Service("down".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
