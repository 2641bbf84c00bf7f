//! HTTP front end: one axum route per service operation.
//!
//! Handlers read the body themselves instead of using the `Json` extractor so
//! that a malformed body gets this service's error message ("Invalid data",
//! "Invalid report data") rather than axum's generic rejection.
//!
//! | Route | Service call |
//! |-------|--------------|
//! | `POST /upload` | [`ReportService::ingest`] |
//! | `POST /process` | [`ReportService::aggregate`] |
//! | `POST /generate_pdf` | [`ReportService::render_pdf`] |
//! | `POST /generate_graph` | [`ReportService::render_chart`] |
//! | `POST /generate_detailed_pdf` | [`ReportService::render_detailed_pdf`] |
//! | `GET /health` | liveness and version |

use crate::error::{ErrorKind, ReportError};
use crate::report::{AggregationRequest, ChartRequest, RenderedArtifact, Report};
use crate::service::ReportService;
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Name of the multipart field carrying the workbook.
pub const FILE_FIELD: &str = "file";

/// Build the router with every endpoint.
pub fn build_router(service: ReportService) -> Router {
    let body_limit = service.config().max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/process", post(process))
        .route("/generate_pdf", post(generate_pdf))
        .route("/generate_graph", post(generate_graph))
        .route("/generate_detailed_pdf", post(generate_detailed_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind `config.bind_addr` and serve until the process is stopped.
pub async fn start_server(service: ReportService) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(&service.config().bind_addr).await?;
    serve(listener, service).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, service: ReportService) -> Result<(), std::io::Error> {
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(service)).await
}

// ── Error responses ──────────────────────────────────────────────────────

/// A [`ReportError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    error: ReportError,
    debug: bool,
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(error: ReportError, debug: bool) -> Self {
        Self { error, debug }
    }

    pub fn status(&self) -> StatusCode {
        match self.error.kind() {
            ErrorKind::InvalidInput | ErrorKind::NotFound | ErrorKind::UnsupportedOperation => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.error);
        } else {
            warn!("Request rejected: {}", self.error);
        }

        let detail = if self.debug { self.error.detail() } else { None };
        let body = ErrorBody {
            error: self.error.to_string(),
            detail,
        };
        (status, Json(body)).into_response()
    }
}

fn reject(service: &ReportService) -> impl Fn(ReportError) -> ApiError {
    let debug = service.config().debug;
    move |e| ApiError::new(e, debug)
}

fn artifact_response(artifact: RenderedArtifact) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    (
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn multipart_err(e: MultipartError, limit: usize) -> ReportError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ReportError::UploadTooLarge { limit }
    } else {
        debug!("Malformed multipart body: {}", e.body_text());
        ReportError::MissingFilePart
    }
}

/// Pull the `file` part out of a multipart body.
///
/// Returns `(None, _)` when there is no such part or it is not a file.
async fn read_file_part(
    mut multipart: Multipart,
    limit: usize,
) -> Result<(Option<String>, Vec<u8>), ReportError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_err(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            return Ok((None, Vec::new()));
        };
        let bytes = field.bytes().await.map_err(|e| multipart_err(e, limit))?;
        return Ok((Some(filename), bytes.to_vec()));
    }
    Ok((None, Vec::new()))
}

async fn upload(
    State(service): State<ReportService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let fail = reject(&service);
    let multipart = multipart.map_err(|e| {
        debug!("Upload without multipart body: {}", e);
        fail(ReportError::MissingFilePart)
    })?;

    let limit = service.config().max_upload_bytes;
    let (filename, bytes) = read_file_part(multipart, limit).await.map_err(&fail)?;
    let summary = service.ingest(filename, bytes).await.map_err(&fail)?;
    Ok(Json(summary).into_response())
}

async fn process(
    State(service): State<ReportService>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let fail = reject(&service);
    let request: AggregationRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!("Unparseable aggregation request: {}", e);
        fail(ReportError::InvalidData)
    })?;
    let report = service.aggregate(request).await.map_err(&fail)?;
    Ok(Json(report).into_response())
}

fn parse_report(body: &[u8]) -> Result<Report, ReportError> {
    serde_json::from_slice(body).map_err(|e| ReportError::InvalidReport {
        detail: e.to_string(),
    })
}

async fn generate_pdf(
    State(service): State<ReportService>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let fail = reject(&service);
    let report = parse_report(&body).map_err(&fail)?;
    let artifact = service.render_pdf(report).await.map_err(&fail)?;
    Ok(artifact_response(artifact))
}

async fn generate_graph(
    State(service): State<ReportService>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let fail = reject(&service);
    let request: ChartRequest =
        serde_json::from_slice(&body).map_err(|e| fail(ReportError::InvalidReport {
            detail: e.to_string(),
        }))?;
    let report = request.into_report().map_err(&fail)?;
    let artifact = service.render_chart(report).await.map_err(&fail)?;
    Ok(artifact_response(artifact))
}

async fn generate_detailed_pdf(
    State(service): State<ReportService>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let fail = reject(&service);
    let report = parse_report(&body).map_err(&fail)?;
    let artifact = service.render_detailed_pdf(report).await.map_err(&fail)?;
    Ok(artifact_response(artifact))
}
