//! # buscrop
//!
//! HTTP service that takes an uploaded photo, crops the bus-line region out
//! of it and returns the crop as a PNG download.
//!
//! The region comes from a [`Detector`](detect::Detector). Today that is a
//! [`FixedBoxDetector`](detect::FixedBoxDetector) returning the same box for
//! every image.

pub mod config;
pub mod crop;
pub mod detect;
pub mod error;
pub mod server;

pub use config::{CorsConfig, ServerConfig};
pub use crop::CroppedImage;
pub use detect::{BoundingBox, Detector, FixedBoxDetector};
pub use error::{ConfigError, CropError};
pub use server::{app_router, ApiError, AppState};

/// Crate version reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
