//! HTTP server for the crop service.
//!
//! # Endpoints
//!
//! - `GET  /health`         — Liveness probe
//! - `POST /process-image/` — Crop the bus-line region from an uploaded image

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{app_router, AppState};

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Multipart field the upload is expected in.
pub const UPLOAD_FIELD: &str = "file";
