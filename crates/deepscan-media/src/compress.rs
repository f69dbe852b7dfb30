//! Frame compression pre-pass: resize to a fixed height, then JPEG round-trip.

use opencv::core::{Mat, Size, Vector};
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Compression parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Output frame height in pixels
    pub target_height: i32,
    /// JPEG quality (0-100)
    pub jpeg_quality: i32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            target_height: 720,
            jpeg_quality: 80,
        }
    }
}

/// Width that keeps the aspect ratio at `target_height`, truncated.
pub fn scaled_width(width: i32, height: i32, target_height: i32) -> i32 {
    if height <= 0 {
        return width.max(1);
    }
    ((target_height as f64 * width as f64 / height as f64) as i32).max(1)
}

/// Resize `frame` to the target height and apply lossy JPEG compression.
pub fn compress_frame(frame: &Mat, settings: &CompressionSettings) -> MediaResult<Mat> {
    if frame.empty() {
        return Err(MediaError::InvalidVideo("empty frame".to_string()));
    }

    let width = scaled_width(frame.cols(), frame.rows(), settings.target_height);
    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(width, settings.target_height),
        0.0,
        0.0,
        imgproc::INTER_LANCZOS4,
    )?;

    let params = Vector::<i32>::from_slice(&[
        imgcodecs::IMWRITE_JPEG_QUALITY,
        settings.jpeg_quality.clamp(0, 100),
    ]);
    let mut encoded = Vector::<u8>::new();
    if !imgcodecs::imencode(".jpg", &resized, &mut encoded, &params)? {
        return Err(MediaError::internal("JPEG encode failed"));
    }

    let decoded = imgcodecs::imdecode(&encoded, imgcodecs::IMREAD_COLOR)?;
    if decoded.empty() {
        return Err(MediaError::internal("JPEG decode produced an empty frame"));
    }
    Ok(decoded)
}
