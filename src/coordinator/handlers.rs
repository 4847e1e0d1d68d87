use super::dispatcher::{DispatchError, Dispatcher};
use super::index::GlobalIndex;
use super::types::*;
use super::{query, status};
use crate::broker::BrokerClient;
use crate::config::CoordinatorConfig;
use axum::extract::Form;
use axum::http::StatusCode;
use axum::{Extension, Json};
use dashmap::DashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Upper bounds on broker-touching request handling; a hung broker surfaces
// as 503 instead of a stuck request.
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(60);

/// POST /trigger-local-indexing/
///
/// Scans a directory for `.txt` files and dispatches one task per document.
/// The form field `path` is optional; without it the configured uploads
/// directory is scanned.
pub async fn handle_trigger_local_indexing(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    Extension(pending): Extension<Arc<DashSet<String>>>,
    Extension(config): Extension<Arc<CoordinatorConfig>>,
    form: Option<Form<TriggerIndexingForm>>,
) -> Result<(StatusCode, Json<IndexingResponse>), ApiError> {
    let scan_path = form
        .and_then(|Form(body)| body.path)
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| config.uploads_path.clone());
    tracing::info!("Triggering local indexing from {}", scan_path.display());

    let report = tokio::time::timeout(TRIGGER_TIMEOUT, dispatcher.scan_and_dispatch(&scan_path))
        .await
        .map_err(|_| ApiError::service_unavailable("Indexing trigger timed out"))?
        .map_err(|e| match e {
            DispatchError::PathNotDirectory(path) => ApiError::bad_request(format!(
                "Local uploads directory not found: {}",
                path.display()
            )),
            DispatchError::NoWorkersAvailable => {
                ApiError::service_unavailable("No live workers available to index documents")
            }
            DispatchError::Broker(err) => {
                ApiError::service_unavailable(format!("Broker unavailable: {}", err))
            }
        })?;

    let message = if report.files_found == 0 {
        format!(
            "No .txt files found in {}. Nothing to index.",
            scan_path.display()
        )
    } else {
        format!(
            "Found {} .txt files. Dispatched {} for indexing. {} file(s) failed processing locally.",
            report.files_found,
            report.successful_dispatches.len(),
            report.failed_files.len()
        )
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(IndexingResponse {
            message,
            details: IndexingDetails {
                successful_dispatches: report.successful_dispatches,
                failed_files: report.failed_files,
                docs_currently_pending: pending.len(),
            },
        }),
    ))
}

/// POST /search/
pub async fn handle_search(
    Extension(index): Extension<Arc<GlobalIndex>>,
    Extension(config): Extension<Arc<CoordinatorConfig>>,
    Json(body): Json<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    if body.term.trim().is_empty() {
        return Err(ApiError::bad_request("Search term cannot be empty."));
    }
    let docs = query::search(&index, config.language, &body.term);
    Ok(Json(SearchResponse { docs }))
}

/// GET /index-status/
pub async fn handle_index_status(
    Extension(index): Extension<Arc<GlobalIndex>>,
    Extension(pending): Extension<Arc<DashSet<String>>>,
) -> Json<IndexStatusResponse> {
    Json(IndexStatusResponse {
        message: "Current index status.".to_string(),
        details: IndexStatusDetails {
            total_terms_in_index: index.term_count(),
            documents_pending_results: pending.len(),
        },
    })
}

/// POST /index/save/
pub async fn handle_save_index(
    Extension(index): Extension<Arc<GlobalIndex>>,
    Extension(config): Extension<Arc<CoordinatorConfig>>,
) -> Result<Json<MessageResponse>, ApiError> {
    index
        .save(&config.index_path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to save index: {:#}", e)))?;
    Ok(Json(MessageResponse {
        message: format!("Global index saved to {}", config.index_path.display()),
    }))
}

/// POST /index/load/
///
/// Replaces the in-memory index with the snapshot (absent snapshot means an
/// empty index) and clears pending bookkeeping, which a reload invalidates.
pub async fn handle_load_index(
    Extension(index): Extension<Arc<GlobalIndex>>,
    Extension(pending): Extension<Arc<DashSet<String>>>,
    Extension(config): Extension<Arc<CoordinatorConfig>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let term_count = index
        .load(&config.index_path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to load index: {:#}", e)))?;
    pending.clear();
    Ok(Json(MessageResponse {
        message: format!(
            "Global index reloaded from {}. {} terms loaded.",
            config.index_path.display(),
            term_count
        ),
    }))
}

/// GET /healthz
pub async fn handle_healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "Coordinator is running",
    })
}

/// GET /workers/status/
pub async fn handle_workers_status(
    Extension(broker): Extension<BrokerClient>,
) -> Result<Json<WorkersStatusResponse>, ApiError> {
    let workers = tokio::time::timeout(STATUS_TIMEOUT, status::list_workers(&broker))
        .await
        .map_err(|_| ApiError::service_unavailable("Broker timed out"))?
        .map_err(|e| ApiError::service_unavailable(format!("Broker unavailable: {:#}", e)))?;
    Ok(Json(WorkersStatusResponse { workers }))
}
