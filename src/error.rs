//! Error types for the crop pipeline.

use thiserror::Error;

use crate::detect::BoundingBox;

/// Errors raised while turning uploaded bytes into a cropped PNG.
#[derive(Debug, Error)]
pub enum CropError {
    /// The uploaded bytes are not an image we can decode.
    #[error("could not decode uploaded image: {0}")]
    Decode(#[source] image::ImageError),

    /// The upload decodes to an image larger than the configured limits.
    #[error("uploaded image exceeds decode limits: {0}")]
    TooLarge(#[source] image::ImageError),

    /// The crop box does not fit inside the decoded image.
    #[error("crop box {bbox} is not valid for a {width}x{height} image: {reason}")]
    Geometry {
        bbox: BoundingBox,
        width: u32,
        height: u32,
        reason: &'static str,
    },

    /// Encoding the cropped image failed.
    #[error("could not encode cropped image: {0}")]
    Encode(#[source] image::ImageError),
}

impl CropError {
    /// Machine-readable error kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CropError::Decode(_) => "decode_error",
            CropError::TooLarge(_) => "image_too_large",
            CropError::Geometry { .. } => "geometry_error",
            CropError::Encode(_) => "encode_error",
        }
    }

    /// Whether the failure was caused by the client's input.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CropError::Encode(_))
    }
}

/// Errors raised while loading [`ServerConfig`](crate::config::ServerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value we could not parse.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
