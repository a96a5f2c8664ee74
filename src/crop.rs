//! Decode → crop → encode pipeline.
//!
//! Everything here is synchronous and CPU-bound. The HTTP layer runs it on
//! the blocking pool.

use std::io::Cursor;

use image::{ColorType, DynamicImage, ImageError, ImageFormat, ImageReader, Limits};

use crate::detect::{BoundingBox, Detector};
use crate::error::CropError;

/// Result of a successful crop.
#[derive(Debug, Clone)]
pub struct CroppedImage {
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
    /// Box that was cropped, in source-image coordinates.
    pub bbox: BoundingBox,
    /// Dimensions of the uploaded image.
    pub source_width: u32,
    pub source_height: u32,
}

/// Decode an uploaded image, guessing the format from its contents.
///
/// Images whose dimensions or decode buffers exceed `limits` are refused
/// before the pixel buffer is allocated.
pub fn decode(bytes: &[u8], limits: Limits) -> Result<DynamicImage, CropError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CropError::Decode(ImageError::IoError(e)))?;
    reader.limits(limits);

    reader.decode().map_err(|e| match e {
        ImageError::Limits(_) => CropError::TooLarge(e),
        other => CropError::Decode(other),
    })
}

/// Cut `bbox` out of `image`.
///
/// Boxes that are empty or reach past the image edges are rejected rather
/// than clipped.
pub fn crop(image: &DynamicImage, bbox: BoundingBox) -> Result<DynamicImage, CropError> {
    let (width, height) = (image.width(), image.height());
    let geometry = |reason| CropError::Geometry {
        bbox,
        width,
        height,
        reason,
    };

    if bbox.is_empty() {
        return Err(geometry("box has zero area"));
    }
    if !bbox.fits_within(width, height) {
        return Err(geometry("box extends past the image bounds"));
    }

    Ok(image.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height))
}

/// Encode `image` as PNG into memory.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CropError> {
    let mut buf = Cursor::new(Vec::new());
    let written = match image.color() {
        // PNG has no float samples
        ColorType::Rgb32F | ColorType::Rgba32F => DynamicImage::ImageRgba16(image.to_rgba16())
            .write_to(&mut buf, ImageFormat::Png),
        _ => image.write_to(&mut buf, ImageFormat::Png),
    };
    written.map_err(CropError::Encode)?;
    Ok(buf.into_inner())
}

/// Run the whole pipeline on one upload.
pub fn process(
    bytes: &[u8],
    detector: &dyn Detector,
    limits: Limits,
) -> Result<CroppedImage, CropError> {
    let image = decode(bytes, limits)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "decoded upload"
    );

    let bbox = detector.detect(&image)?;
    tracing::debug!(detector = detector.name(), %bbox, "located crop box");

    let cropped = crop(&image, bbox)?;
    let png = encode_png(&cropped)?;

    Ok(CroppedImage {
        png,
        bbox,
        source_width: image.width(),
        source_height: image.height(),
    })
}
