use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json,
    },
};
use futures_util::{StreamExt, TryStreamExt};
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use tokio::fs;
use tokio_util::io::StreamReader;

use crate::models::{ErrorResponse, HealthResponse, UploadResponse};
use crate::registry::UploadProgress;
use crate::state::AppState;
use crate::utils::{declared_upload_size, sanitize_filename, UPLOAD_SIZE_HEADER};
use crate::worker::UploadWorker;

/// multipart field carrying the uploaded file
pub const FILE_FIELD: &str = "file";

const INDEX_HTML: &str = include_str!("../views/index.html");
const APP_JS: &str = include_str!("../views/app.js");

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

// upload page
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn app_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], APP_JS)
}

// upload a file via multipart form data, tracking its progress in the registry
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    tracing::debug!("Processing file upload request");
    let total_size = declared_upload_size(&headers).ok_or_else(|| {
        tracing::warn!("Upload request without a valid {} header", UPLOAD_SIZE_HEADER);
        api_error(
            StatusCode::LENGTH_REQUIRED,
            format!("The {} header with the file size in bytes is required", UPLOAD_SIZE_HEADER),
        )
    })?;

    // run detached so the entry is always finished, even if the client goes away
    tokio::spawn(ingest(state, total_size, multipart))
        .await
        .map_err(|e| {
            tracing::error!("Upload task failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Upload task failed")
        })?
}

async fn ingest(
    state: Arc<AppState>,
    total_size: u64,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart field: {}", e),
        )
    })? {
        if field.name() != Some(FILE_FIELD) {
            tracing::trace!("Skipping multipart field: {:?}", field.name());
            continue;
        }

        let filename = field.file_name().ok_or_else(|| {
            tracing::warn!("Upload request missing filename");
            api_error(StatusCode::BAD_REQUEST, "No filename provided")
        })?;

        // sanitize filename to prevent directory traversal
        let id = sanitize_filename(filename);
        if id.is_empty() {
            tracing::warn!("Filename {:?} is empty after sanitizing", filename);
            return Err(api_error(StatusCode::BAD_REQUEST, "Invalid filename"));
        }
        tracing::trace!("Sanitized filename: {} -> {}", filename, id);

        // the id is reserved, but nothing is published until the file exists
        let _claim = state.registry.claim(&id).map_err(|e| {
            api_error(StatusCode::CONFLICT, e.to_string())
        })?;

        let file_path = state.files_dir.join(&id);
        tracing::trace!("Target path: {:?}", file_path);
        let file = fs::File::create(&file_path).await.map_err(|e| {
            tracing::error!("Failed to create file {}: {}", id, e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create file: {}", e),
            )
        })?;

        let progress = UploadProgress::new(id.clone(), total_size);
        state.registry.upsert(progress.clone());

        let reader = StreamReader::new(field.map_err(|e| io::Error::other(e.body_text())));
        let finished = UploadWorker::new(state.registry.as_ref(), progress)
            .with_chunk_size(state.chunk_size)
            .run(reader, file)
            .await;

        if finished.failed {
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                finished.status_message,
            ));
        }

        return Ok(Json(UploadResponse {
            success: true,
            filename: finished.id,
            size: finished.bytes_transferred,
        }));
    }

    tracing::warn!("Upload request contained no file field");
    Err(api_error(StatusCode::BAD_REQUEST, "No file provided"))
}

// stream progress of every tracked upload as server-sent events, one event per tick
pub async fn progress_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Progress observer connected");
    let events = state
        .reporter
        .batches()
        // sse data may not carry carriage returns; newlines become separate data lines
        .map(|batch| {
            let data = batch.join("\n").replace('\r', "");
            Ok::<Event, Infallible>(Event::default().data(data))
        });

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
}

// health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "upload-progress".to_string(),
        tracked_uploads: state.registry.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
