//! HTTP surface for the session retrieval store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/sessions` | Multipart upload: ingest files into a (new or existing) session |
//! | `POST` | `/sessions/{id}/query` | Top-k similarity search within a session |
//! | `GET` | `/sessions/{id}` | Session summary (read-only) |
//! | `DELETE` | `/sessions/{id}` | Early eviction (idempotent) |
//! | `GET` | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use the envelope:
//!
//! ```json
//! { "error": { "code": "quota_exceeded", "message": "ingestion quota exceeded for user 'u1'" } }
//! ```
//!
//! Codes: `quota_exceeded` (429), `session_not_found` (404),
//! `file_too_large` (413), `unsupported_file_type` (415), `timeout` (408),
//! `embedding_unavailable` (502), `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the store is meant to
//! sit behind the application's own gateway.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::DocsiftError;
use crate::ingest::IngestService;
use crate::models::{SearchHit, SessionStats, SkippedFile, UploadedFile};
use crate::quota::QuotaTracker;
use crate::retrieve::RetrievalService;
use crate::session::SessionStore;
use crate::sweeper;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<SessionStore>,
    ingest: Arc<IngestService>,
    retrieve: Arc<RetrievalService>,
    max_k: usize,
}

/// Wire up services from configuration.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let embedder = create_embedder(&config.embedding)?;
    let store = Arc::new(SessionStore::new(
        config.session.ttl(),
        embedder.dims(),
    ));
    let quota = Arc::new(QuotaTracker::new(
        config.quota.ceiling,
        config.quota.window(),
    ));

    let ingest = Arc::new(IngestService::new(
        Arc::clone(&store),
        quota,
        Arc::clone(&embedder),
        config.chunking.clone(),
        config.upload.clone(),
        config.session.ingest_timeout(),
    ));
    let retrieve = Arc::new(RetrievalService::new(
        Arc::clone(&store),
        embedder,
        config.retrieval.clone(),
        config.session.query_timeout(),
    ));

    Ok(AppState {
        store,
        ingest,
        retrieve,
        max_k: config.retrieval.max_k,
    })
}

/// Build the router for the given state; split out so tests can drive the
/// app without binding a socket.
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sessions", post(handle_upload))
        .route("/sessions/{id}/query", post(handle_query))
        .route("/sessions/{id}", get(handle_stats).delete(handle_evict))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the server and the expiry sweeper. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = build_state(config)?;

    sweeper::spawn(Arc::clone(&state.store), config.session.sweep_interval());

    // Room for every file in a maximal batch plus multipart framing.
    let body_limit =
        config.upload.max_file_bytes * config.upload.max_files_per_request + 1024 * 1024;
    let app = build_router(state, body_limit);

    tracing::info!(bind = %config.server.bind, "listening");
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error envelope.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<DocsiftError> for AppError {
    fn from(err: DocsiftError) -> Self {
        let status = match &err {
            DocsiftError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            DocsiftError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            DocsiftError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DocsiftError::UnsupportedExtension { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DocsiftError::OperationTimedOut(_) => StatusCode::REQUEST_TIMEOUT,
            DocsiftError::EmbeddingUnavailable(_) => StatusCode::BAD_GATEWAY,
            // Extraction failures surface as `skipped` entries in the upload
            // report, not as a request error; reaching here means the
            // pipeline leaked one.
            DocsiftError::DimensionMismatch { .. }
            | DocsiftError::ExtractionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            DocsiftError::TooManyFiles { .. }
            | DocsiftError::EmptyQuery
            | DocsiftError::NoFiles => StatusCode::BAD_REQUEST,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /sessions ============

#[derive(Serialize)]
struct UploadResponse {
    session_id: String,
    files_processed: usize,
    chunks_indexed: usize,
    quota_remaining: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<SkippedFile>,
}

/// Multipart upload: a `user_id` text field, an optional `session_id` text
/// field, and one or more `file` parts with filenames.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut user_id: Option<String> = None;
    let mut session_id: Option<String> = None;
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("user_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(e.to_string()))?;
                user_id = Some(value);
            }
            Some("session_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(e.to_string()))?;
                if !value.is_empty() {
                    session_id = Some(value);
                }
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| bad_request("file part is missing a filename"))?;
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("failed to read '{}': {}", filename, e)))?;
                files.push(UploadedFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| bad_request("user_id field is required"))?;
    if user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }

    let report = state
        .ingest
        .ingest(session_id.as_deref(), &user_id, files)
        .await?;

    Ok(Json(UploadResponse {
        session_id: report.session_id,
        files_processed: report.files_processed,
        chunks_indexed: report.chunks_indexed,
        quota_remaining: report.quota_remaining,
        skipped: report.skipped,
    }))
}

// ============ POST /sessions/{id}/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    results: Vec<SearchHit>,
    processing_time_ms: u64,
}

async fn handle_query(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if let Some(k) = req.k {
        if k == 0 || k > state.max_k {
            return Err(bad_request(format!(
                "k must be between 1 and {}",
                state.max_k
            )));
        }
    }

    let started = Instant::now();
    let results = state.retrieve.retrieve(&id, &req.query, req.k).await?;

    Ok(Json(QueryResponse {
        results,
        processing_time_ms: started.elapsed().as_millis() as u64,
    }))
}

// ============ GET /sessions/{id} ============

async fn handle_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStats>, AppError> {
    let stats = state.store.stats(&id).await?;
    Ok(Json(stats))
}

// ============ DELETE /sessions/{id} ============

/// Idempotent: deleting an already-gone session is not an error.
async fn handle_evict(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.store.evict(&id);
    StatusCode::NO_CONTENT
}
