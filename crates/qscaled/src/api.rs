//! Status API for the daemon.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness probe |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/api/v1/status` | Tick counters and the last tick record |

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;

use qscale_metrics::{RecorderSnapshot, TickRecorder, render_prometheus};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub recorder: Arc<TickRecorder>,
}

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    data: T,
}

/// Build the status router.
pub fn build_router(recorder: Arc<TickRecorder>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/v1/status", get(status))
        .with_state(ApiState { recorder })
}

/// GET /healthz
async fn healthz() -> &'static str {
    "ok"
}

/// GET /metrics
async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_prometheus(&state.recorder.snapshot()),
    )
}

/// GET /api/v1/status
async fn status(State(state): State<ApiState>) -> Json<ApiResponse<RecorderSnapshot>> {
    Json(ApiResponse {
        success: true,
        data: state.recorder.snapshot(),
    })
}
