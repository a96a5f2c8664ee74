//! Request-level errors and their HTTP mapping.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::error::CropError;

/// Everything that can go wrong while serving `POST /process-image/`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The multipart body had no usable file field.
    #[error("multipart body has no '{field}' file field")]
    MissingFile { field: &'static str },

    /// The body exceeded the configured upload limit.
    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// The body could not be read as multipart form data.
    #[error("invalid multipart body: {message}")]
    Multipart { status: StatusCode, message: String },

    #[error(transparent)]
    Crop(#[from] CropError),

    /// The blocking crop task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub(crate) fn from_multipart(err: MultipartError, limit: usize) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge { limit }
        } else {
            ApiError::Multipart {
                status,
                message: err.body_text(),
            }
        }
    }

    pub(crate) fn from_rejection(rejection: MultipartRejection) -> Self {
        ApiError::Multipart {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFile { .. } => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Multipart { status, .. } => *status,
            ApiError::Crop(CropError::Decode(_)) => StatusCode::BAD_REQUEST,
            ApiError::Crop(CropError::TooLarge(_)) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Crop(CropError::Geometry { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Crop(CropError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingFile { .. } => "missing_file",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::Multipart { .. } => "multipart",
            ApiError::Crop(err) => err.kind(),
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "request rejected");
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let ApiError::Crop(CropError::Geometry {
            bbox,
            width,
            height,
            ..
        }) = &self
        {
            body["bbox"] = serde_json::json!(bbox);
            body["image"] = serde_json::json!({ "width": width, "height": height });
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[test]
    fn test_status_mapping() {
        let geometry = ApiError::from(CropError::Geometry {
            bbox: BoundingBox::DEFAULT,
            width: 10,
            height: 10,
            reason: "box extends past the image bounds",
        });
        assert_eq!(geometry.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(geometry.kind(), "geometry_error");

        let missing = ApiError::MissingFile { field: "file" };
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let too_large = ApiError::PayloadTooLarge { limit: 10 };
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let oversized = ApiError::from(CropError::TooLarge(image::ImageError::Limits(
            image::error::LimitError::from_kind(image::error::LimitErrorKind::DimensionError),
        )));
        assert_eq!(oversized.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(oversized.kind(), "image_too_large");

        let internal = ApiError::Internal("task panicked".into());
        assert!(internal.status().is_server_error());
    }

    #[tokio::test]
    async fn test_geometry_error_body_reports_dimensions() {
        let err = ApiError::from(CropError::Geometry {
            bbox: BoundingBox::DEFAULT,
            width: 64,
            height: 32,
            reason: "box extends past the image bounds",
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "geometry_error");
        assert_eq!(json["image"]["width"], 64);
        assert_eq!(json["bbox"]["x"], 100);
    }
}
