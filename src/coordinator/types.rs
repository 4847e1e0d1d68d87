use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TriggerIndexingForm {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexingDetails {
    pub successful_dispatches: Vec<String>,
    /// `[file name, reason]` pairs.
    pub failed_files: Vec<(String, String)>,
    pub docs_currently_pending: usize,
}

#[derive(Debug, Serialize)]
pub struct IndexingResponse {
    pub message: String,
    pub details: IndexingDetails,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub term: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    /// `[doc_id, frequency]` pairs, frequency descending.
    pub docs: Vec<(String, u64)>,
}

#[derive(Debug, Serialize)]
pub struct IndexStatusDetails {
    pub total_terms_in_index: usize,
    pub documents_pending_results: usize,
}

#[derive(Debug, Serialize)]
pub struct IndexStatusResponse {
    pub message: String,
    pub details: IndexStatusDetails,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerStatusEntry {
    pub worker_id: String,
    pub cpu_percent: f32,
    pub ram_percent: f32,
    pub status_ttl_seconds: Option<i64>,
    pub queue_length: u64,
}

#[derive(Debug, Serialize)]
pub struct WorkersStatusResponse {
    pub workers: Vec<WorkerStatusEntry>,
}

/// Error envelope for every failing endpoint: a status code that separates
/// client faults (4xx) from infrastructure trouble (5xx), and a JSON body
/// `{"detail": …}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}
