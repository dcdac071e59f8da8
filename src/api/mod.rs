// HTTP surface: router, handlers, and error-to-status mapping

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::core::config::Config;
use crate::core::errors::PipelineError;
use crate::core::types::Detection;
use crate::orchestration::pipeline::DetectionPipeline;
use crate::utils::Metrics;

/// Multipart field names accepted for the uploaded image, in priority order:
/// when a request carries more than one, the earliest name wins.
pub const ACCEPTED_FILE_FIELDS: [&str; 2] = ["file", "image"];

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<DetectionPipeline>,
    pub metrics: Metrics,
}

/// An error response carrying `{"error": <message>}` with its status code
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        if e.is_client_error() {
            ApiError::bad_request("Invalid image data")
        } else {
            ApiError::internal(format!("Processing error: {}", e))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_upload = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/detect", post(detect))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(cors)
}

async fn root() -> &'static str {
    "Banknote Detection Voice Backend"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot)
        .map(Json)
        .map_err(|e| ApiError::internal(format!("Failed to serialize metrics: {}", e)))
}

/// Detect banknotes in an uploaded image
///
/// # Request Format:
/// - multipart/form-data
/// - Field "file" (or "image"): the image to analyze
///
/// # Response:
/// - JSON array of {label, türkçe_etiket, confidence, audio} objects
async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<Detection>>, ApiError> {
    let start_time = Instant::now();
    debug!("Received detect request");

    // Drain every field first, then resolve by priority, so a request
    // carrying both accepted names is handled deterministically
    let mut uploads: Vec<Option<Bytes>> = vec![None; ACCEPTED_FILE_FIELDS.len()];

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        state.metrics.record_request(false, start_time.elapsed(), 0);
        ApiError::bad_request(format!("Multipart error: {}", e))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(slot) = ACCEPTED_FILE_FIELDS.iter().position(|f| *f == name) else {
            continue;
        };

        let data = field.bytes().await.map_err(|e| {
            state.metrics.record_request(false, start_time.elapsed(), 0);
            ApiError::bad_request(format!("Read error: {}", e))
        })?;

        if uploads[slot].is_none() {
            uploads[slot] = Some(data);
        }
    }

    let Some(payload) = uploads.into_iter().flatten().next() else {
        state.metrics.record_request(false, start_time.elapsed(), 0);
        return Err(ApiError::bad_request("No file or image provided"));
    };

    debug!("Upload received: {} bytes", payload.len());

    match state.pipeline.process(&payload).await {
        Ok(detections) => {
            state
                .metrics
                .record_request(true, start_time.elapsed(), detections.len());
            info!(
                "Request completed in {:.2}s: {} banknotes detected",
                start_time.elapsed().as_secs_f64(),
                detections.len()
            );
            Ok(Json(detections))
        }
        Err(e) => {
            error!("Detection request failed: {:?}", e);
            state.metrics.record_request(false, start_time.elapsed(), 0);
            Err(ApiError::from(e))
        }
    }
}
