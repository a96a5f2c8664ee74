//! Locating the region of interest inside an uploaded image.
//!
//! The crop endpoint does not care how the region is found. It asks a
//! [`Detector`] for a [`BoundingBox`] and crops whatever comes back. The only
//! detector shipped today is [`FixedBoxDetector`], which returns the same box
//! for every image. A model-backed detector plugs in behind the same trait.

use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::CropError;

/// Rectangle in pixel coordinates, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// The box the service has always cropped: `(100, 50, 120, 60)`.
    pub const DEFAULT: BoundingBox = BoundingBox::new(100, 50, 120, 60);

    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge, `None` if it overflows `u32`.
    pub fn right(&self) -> Option<u32> {
        self.x.checked_add(self.width)
    }

    /// Exclusive bottom edge, `None` if it overflows `u32`.
    pub fn bottom(&self) -> Option<u32> {
        self.y.checked_add(self.height)
    }

    /// The box as `(left, top, right, bottom)`.
    pub fn to_edges(&self) -> Option<(u32, u32, u32, u32)> {
        Some((self.x, self.y, self.right()?, self.bottom()?))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the whole box lies inside a `width`x`height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        matches!(
            (self.right(), self.bottom()),
            (Some(right), Some(bottom)) if right <= width && bottom <= height
        )
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x={}, y={}, w={}, h={})",
            self.x, self.y, self.width, self.height
        )
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    /// Parse `"x,y,width,height"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|e| format!("'{}': {}", part.trim(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [x, y, width, height] => Ok(BoundingBox::new(*x, *y, *width, *height)),
            _ => Err(format!("expected 4 comma-separated integers, got {}", parts.len())),
        }
    }
}

/// Finds the region to crop.
///
/// Implementations run on the blocking thread pool, so they may do CPU-heavy
/// work synchronously.
pub trait Detector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Return the box to crop from `image`.
    fn detect(&self, image: &DynamicImage) -> Result<BoundingBox, CropError>;
}

/// Returns the same box regardless of image content.
#[derive(Debug, Clone, Default)]
pub struct FixedBoxDetector {
    bbox: BoundingBox,
}

impl FixedBoxDetector {
    pub fn new(bbox: BoundingBox) -> Self {
        Self { bbox }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

impl Detector for FixedBoxDetector {
    fn name(&self) -> &str {
        "fixed-box"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<BoundingBox, CropError> {
        Ok(self.bbox)
    }
}
