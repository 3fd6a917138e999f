//! HTTP JSON API over the record store and the extraction client.
//!
//! This is a presentation layer: handlers translate requests into
//! [`RecordStore`] / [`Extractor`] calls and hold no state of their own.
//! Batch results are returned to the client, which posts back the entries it
//! wants saved.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Status, version, and whether extraction is enabled |
//! | `POST`   | `/extract` | Extract text from the first uploaded file (multipart) |
//! | `POST`   | `/extract/batch` | Extract every uploaded file in order (multipart) |
//! | `POST`   | `/records` | Save `{filename, text}` |
//! | `POST`   | `/records/batch` | Save the successful entries of a batch result |
//! | `GET`    | `/records` | List, or search with `keyword`, `start_date`, `end_date` |
//! | `GET`    | `/records/{id}` | Fetch one record |
//! | `PUT`    | `/records/{id}` | Replace its text with `{text}` |
//! | `DELETE` | `/records/{id}` | Delete it |
//! | `GET`    | `/export/{csv,xlsx}` | Download every record |
//! | `GET`    | `/stats` | Aggregate counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "record not found: 7" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `storage_error` (500),
//! `extraction_failed` (502), `extraction_disabled` (503).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::batch::{self, BatchEntry, BatchSummary, ImageInput, SaveReport};
use crate::config::Config;
use crate::error::{ExportError, ExtractionError, StorageError};
use crate::export::{export_file_name, ExportFormat};
use crate::extraction::{is_supported_mime_type, mime_type_for_path, Extractor};
use crate::models::{Record, RecordFilter};
use crate::progress::NoProgress;
use crate::records::parse_date;
use crate::stats::{self, Summary};
use crate::store::RecordStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    /// `None` when no API key is configured.
    pub extractor: Option<Arc<dyn Extractor>>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, extractor: Option<Arc<dyn Extractor>>) -> Self {
        Self { store, extractor }
    }

    fn extractor(&self) -> Result<&dyn Extractor, ApiError> {
        self.extractor.as_deref().ok_or_else(|| ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "extraction_disabled",
            message: "text extraction is disabled: no API key configured".to_string(),
        })
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/extract", post(handle_extract))
        .route("/extract/batch", post(handle_extract_batch))
        .route("/records", get(handle_list).post(handle_create))
        .route("/records/batch", post(handle_save_batch))
        .route(
            "/records/{id}",
            get(handle_get).put(handle_update).delete(handle_delete),
        )
        .route("/export/{format}", get(handle_export))
        .route("/stats", get(handle_stats))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, state: AppState) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(state.clone(), config.server.max_upload_bytes);

    if state.extractor.is_none() {
        tracing::warn!(
            env = %config.extraction.api_key_env,
            "no API key configured; extraction endpoints will return 503"
        );
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "HTTP server listening");
    println!("snaptext listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
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

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: format!("record not found: {}", id),
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "storage operation failed");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "storage_error",
            message: err.to_string(),
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Input(message) => bad_request(message),
            other => ApiError {
                status: StatusCode::BAD_GATEWAY,
                code: "extraction_failed",
                message: other.to_string(),
            },
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "export_error",
            message: err.to_string(),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError {
            status: err.status(),
            code: "bad_request",
            message: err.body_text(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    extraction_enabled: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        extraction_enabled: state.extractor.is_some(),
    })
}

// ============ POST /extract, /extract/batch ============

/// Collect every file part of a multipart upload, in order.
///
/// A part must be a supported image by its content type or, failing that,
/// its filename extension.
async fn read_uploads(multipart: &mut Multipart) -> Result<Vec<ImageInput>, ApiError> {
    let mut images = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime_type = field
            .content_type()
            .filter(|ct| is_supported_mime_type(ct))
            .or_else(|| mime_type_for_path(std::path::Path::new(&filename)))
            .map(str::to_string)
            .ok_or_else(|| {
                bad_request(format!(
                    "{}: unsupported file type (expected jpg, jpeg, png, gif, bmp, or webp)",
                    filename
                ))
            })?;
        let bytes = field.bytes().await?.to_vec();
        images.push(ImageInput {
            filename,
            mime_type,
            bytes,
        });
    }
    Ok(images)
}

#[derive(Serialize)]
struct ExtractResponse {
    filename: String,
    text: String,
}

async fn handle_extract(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    let extractor = state.extractor()?;
    let image = read_uploads(&mut multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| bad_request("no file uploaded"))?;

    let text = extractor.extract(&image.bytes, &image.mime_type).await?;
    Ok(Json(ExtractResponse {
        filename: image.filename,
        text,
    }))
}

#[derive(Serialize)]
struct BatchResponse {
    entries: Vec<BatchEntry>,
    #[serde(flatten)]
    summary: BatchSummary,
}

async fn handle_extract_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, ApiError> {
    let extractor = state.extractor()?;
    let images = read_uploads(&mut multipart).await?;
    if images.is_empty() {
        return Err(bad_request("no files uploaded"));
    }

    let items = images.into_iter().map(Ok).collect();
    let entries = batch::extract_batch(extractor, items, &NoProgress).await;
    let summary = BatchSummary::of(&entries);
    Ok(Json(BatchResponse { entries, summary }))
}

// ============ /records ============

#[derive(Deserialize)]
struct CreateRecordRequest {
    filename: String,
    text: String,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: i64,
}

async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state.store.create(&req.filename, &req.text).await?;
    tracing::info!(id, filename = %req.filename, "record saved");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

#[derive(Deserialize)]
struct SaveBatchRequest {
    entries: Vec<BatchEntry>,
}

async fn handle_save_batch(
    State(state): State<AppState>,
    Json(req): Json<SaveBatchRequest>,
) -> Json<SaveReport> {
    Json(batch::save_successful(state.store.as_ref(), &req.entries).await)
}

#[derive(Deserialize)]
struct SearchQuery {
    keyword: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Serialize)]
struct RecordsResponse {
    records: Vec<Record>,
}

fn parse_optional_date(value: Option<&str>, name: &str) -> Result<Option<chrono::NaiveDate>, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| parse_date(v).map_err(|e| bad_request(format!("{}: {}", name, e))))
        .transpose()
}

async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let filter = RecordFilter {
        keyword: query.keyword,
        start_date: parse_optional_date(query.start_date.as_deref(), "start_date")?,
        end_date: parse_optional_date(query.end_date.as_deref(), "end_date")?,
    };

    let records = if filter.is_empty() {
        state.store.list_all().await?
    } else {
        state.store.search(&filter).await?
    };
    Ok(Json(RecordsResponse { records }))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Record>, ApiError> {
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

#[derive(Deserialize)]
struct UpdateRecordRequest {
    text: String,
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<Json<Record>, ApiError> {
    if !state.store.update(id, &req.text).await? {
        return Err(not_found(id));
    }
    // A concurrent delete can win between the two statements.
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(id).await? {
        tracing::info!(id, "record deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

// ============ GET /export/{format}, /stats ============

async fn handle_export(
    State(state): State<AppState>,
    Path(format): Path<String>,
) -> Result<Response, ApiError> {
    let format = match format.as_str() {
        "csv" => ExportFormat::Csv,
        "xlsx" => ExportFormat::Xlsx,
        other => return Err(bad_request(format!("unknown export format: {}", other))),
    };

    let records = state.store.list_all().await?;
    let bytes = format.render(&records)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(format, Utc::now())
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<Summary>, ApiError> {
    let records = state.store.list_all().await?;
    Ok(Json(stats::summarize(&records)))
}
