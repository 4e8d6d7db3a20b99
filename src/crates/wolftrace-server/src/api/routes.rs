//! Route table.

use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{alerts, cases, links, reports};
use crate::api::ws;
use crate::state::AppState;

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Build the full router over `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/reports", post(reports::submit_report))
        .route("/api/v1/cases", get(cases::list_cases))
        .route("/api/v1/cases/:case_id", get(cases::get_case))
        .route("/api/v1/cases/:case_id/reports", get(cases::case_reports))
        .route("/api/v1/cases/:case_id/metadata", patch(cases::patch_metadata))
        .route("/api/v1/links", post(links::create_link))
        .route("/api/v1/alerts", post(alerts::publish_alert))
        .route("/ws/caseboard", get(ws::caseboard_stream))
        .route("/ws/alerts", get(ws::alert_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use wolftrace_core::{Engine, EngineConfig, NoopSpeech, ServiceBundle};

    fn test_state() -> AppState {
        let engine = Arc::new(Engine::new(EngineConfig::default(), ServiceBundle::noop()).unwrap());
        AppState::new(engine, Arc::new(NoopSpeech))
    }

    #[tokio::test]
    async fn test_health() {
        let router = create_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_report_and_fetch_case() {
        let state = test_state();
        state.engine.start();
        let router = create_router(state.clone());

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/reports")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({
                            "case_id": "C1",
                            "report": {"text": "alarm at library"}
                        }))
                        .unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/cases/C1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        state.engine.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_case_is_404() {
        let router = create_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/cases/none")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_alert_message_rejected() {
        let router = create_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/alerts")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({"case_id": "C1", "message": "  "})).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
