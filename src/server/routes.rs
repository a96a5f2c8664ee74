//! Axum route handlers for the crop server.
//!
//! # Routes
//!
//! - `GET  /health`         — Returns `{"status": "ok", "version": "0.1.0"}`
//! - `POST /process-image/` — Multipart upload in, cropped PNG out

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use super::{ApiError, REQUEST_ID_HEADER, UPLOAD_FIELD};
use crate::config::ServerConfig;
use crate::crop::{self, CroppedImage};
use crate::detect::{Detector, FixedBoxDetector};

/// Shared application state for the HTTP server.
///
/// Read-only after startup; requests never share mutable data.
#[derive(Clone)]
pub struct AppState {
    /// Finds the region to crop.
    pub detector: Arc<dyn Detector>,
    pub config: Arc<ServerConfig>,
    content_disposition: HeaderValue,
}

impl AppState {
    /// State with a [`FixedBoxDetector`] using `config.crop_box`.
    pub fn new(config: ServerConfig) -> Self {
        let detector = Arc::new(FixedBoxDetector::new(config.crop_box));
        Self::with_detector(config, detector)
    }

    pub fn with_detector(config: ServerConfig, detector: Arc<dyn Detector>) -> Self {
        let content_disposition = config.content_disposition();

        Self {
            detector,
            config: Arc::new(config),
            content_disposition,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    let cors = state.config.cors.layer();
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health_handler))
        .route("/process-image/", post(process_image_handler))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "buscrop",
    }))
}

/// POST /process-image/ — crop the upload and return it as a PNG download.
///
/// The handler:
/// 1. Reads the `file` field of the multipart body into memory
/// 2. Decodes, locates and crops on the blocking pool
/// 3. Returns the PNG with a `Content-Disposition` filename hint
///
/// Every response, success or error, carries an `x-request-id` header.
async fn process_image_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("process_image", %request_id);

    let mut response = async move {
        match process_upload(&state, multipart).await {
            Ok(cropped) => png_response(&state, cropped),
            Err(err) => err.into_response(),
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn process_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<CroppedImage, ApiError> {
    let mut multipart = multipart.map_err(ApiError::from_rejection)?;
    let upload = read_upload(&mut multipart, state.config.max_upload_bytes).await?;
    tracing::info!(bytes = upload.len(), "received upload");

    let detector = Arc::clone(&state.detector);
    let limits = state.config.decode_limits();
    let span = tracing::Span::current();
    let cropped = tokio::task::spawn_blocking(move || {
        span.in_scope(|| crop::process(&upload, detector.as_ref(), limits))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("crop task failed: {}", e)))??;

    tracing::info!(
        bbox = %cropped.bbox,
        source_width = cropped.source_width,
        source_height = cropped.source_height,
        png_bytes = cropped.png.len(),
        "cropped upload"
    );
    Ok(cropped)
}

/// Pull the upload out of the multipart body.
///
/// Prefers the field named [`UPLOAD_FIELD`]; otherwise falls back to the first
/// field that carries a filename.
async fn read_upload(multipart: &mut Multipart, limit: usize) -> Result<Bytes, ApiError> {
    let to_api = |e: MultipartError| ApiError::from_multipart(e, limit);
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await.map_err(to_api)? {
        if field.name() == Some(UPLOAD_FIELD) {
            return field.bytes().await.map_err(to_api);
        }
        if fallback.is_none() && field.file_name().is_some() {
            tracing::debug!(field = ?field.name(), "using fallback file field");
            fallback = Some(field.bytes().await.map_err(to_api)?);
        }
    }

    fallback.ok_or(ApiError::MissingFile {
        field: UPLOAD_FIELD,
    })
}

fn png_response(state: &AppState, cropped: CroppedImage) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (header::CONTENT_DISPOSITION, state.content_disposition.clone()),
        ],
        cropped.png,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
