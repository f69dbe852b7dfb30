//! OpenCV YuNet face detector.
//!
//! YuNet is a small CNN exposed through OpenCV's `FaceDetectorYN`. Frames are
//! downscaled to an input size aligned to 32 and boxes are scaled back.
//!
//! # Known Issues
//! - OpenCV 4.6.0 fails 2023mar models with "Layer with requested id=-1 not
//!   found". Use a 2022mar model on that version.

use std::path::{Path, PathBuf};

use opencv::core::{Mat, Ptr, Size};
use opencv::dnn::{DNN_BACKEND_DEFAULT, DNN_BACKEND_OPENCV, DNN_TARGET_CPU};
use opencv::imgproc;
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::*;
use tracing::{debug, info, warn};

use super::{FaceBox, FaceDetector};
use crate::error::{MediaError, MediaResult};

const SCORE_THRESHOLD: f32 = 0.6;
const NMS_THRESHOLD: f32 = 0.3;
const TOP_K: i32 = 50;

/// Smallest plausible model file; anything below is a failed download.
const MIN_MODEL_BYTES: u64 = 50_000;

pub struct YuNetDetector {
    detector: Ptr<FaceDetectorYN>,
    /// Detector input size, recomputed when the frame size changes
    input_size: (i32, i32),
    frame_size: (i32, i32),
    model_path: PathBuf,
}

impl YuNetDetector {
    pub fn new(model_path: &Path) -> MediaResult<Self> {
        let metadata =
            std::fs::metadata(model_path).map_err(|_| MediaError::model_not_found(model_path))?;
        if metadata.len() < MIN_MODEL_BYTES {
            return Err(MediaError::detection_failed(format!(
                "YuNet model file appears corrupted (size: {} bytes)",
                metadata.len()
            )));
        }

        // Real input size is set on the first frame.
        let input_size = (320, 320);
        let detector = create_with_fallback(model_path, input_size)?;

        info!(model = %model_path.display(), "YuNet detector initialized");

        Ok(Self {
            detector,
            input_size,
            frame_size: (0, 0),
            model_path: model_path.to_path_buf(),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn ensure_input_size(&mut self, frame_w: i32, frame_h: i32) -> MediaResult<()> {
        if self.frame_size == (frame_w, frame_h) {
            return Ok(());
        }
        self.frame_size = (frame_w, frame_h);
        self.input_size = calculate_input_size(frame_w, frame_h);
        self.detector
            .set_input_size(Size::new(self.input_size.0, self.input_size.1))?;
        debug!(
            frame = ?self.frame_size,
            input = ?self.input_size,
            "YuNet input size updated"
        );
        Ok(())
    }

    /// Rows of `[x, y, w, h, 10 landmark coords, score]` in input pixels.
    fn parse_faces(&self, faces: &Mat) -> Vec<FaceBox> {
        if faces.rows() <= 0 || faces.cols() < 15 {
            return Vec::new();
        }

        let scale_x = self.frame_size.0 as f64 / self.input_size.0 as f64;
        let scale_y = self.frame_size.1 as f64 / self.input_size.1 as f64;

        let mut boxes = Vec::with_capacity(faces.rows() as usize);
        for i in 0..faces.rows() {
            let at = |col: i32| faces.at_2d::<f32>(i, col).map(|v| *v as f64).ok();
            let (Some(x), Some(y), Some(w), Some(h), Some(score)) = (at(0), at(1), at(2), at(3), at(14)) else {
                continue;
            };

            let face = FaceBox::new(
                (x * scale_x).round() as i32,
                (y * scale_y).round() as i32,
                (w * scale_x).round() as i32,
                (h * scale_y).round() as i32,
            )
            .with_score(score as f32);

            if let Some(clamped) = face.clamp_to(self.frame_size.0, self.frame_size.1) {
                boxes.push(clamped);
            }
        }
        boxes
    }
}

impl FaceDetector for YuNetDetector {
    fn detect(&mut self, frame_bgr: &Mat) -> MediaResult<Vec<FaceBox>> {
        if frame_bgr.empty() {
            return Ok(Vec::new());
        }
        self.ensure_input_size(frame_bgr.cols(), frame_bgr.rows())?;

        let mut resized = Mat::default();
        imgproc::resize(
            frame_bgr,
            &mut resized,
            Size::new(self.input_size.0, self.input_size.1),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut faces = Mat::default();
        self.detector.detect(&resized, &mut faces).map_err(|e| {
            MediaError::detection_failed(format!("YuNet detection failed: {e}"))
        })?;

        Ok(self.parse_faces(&faces))
    }

    fn name(&self) -> &'static str {
        "yunet"
    }
}

/// Input size within 960×540, aligned to multiples of 32.
pub(crate) fn calculate_input_size(frame_width: i32, frame_height: i32) -> (i32, i32) {
    const TARGET_W: f64 = 960.0;
    const TARGET_H: f64 = 540.0;
    const ALIGNMENT: i32 = 32;

    let scale = (frame_width as f64 / TARGET_W)
        .max(frame_height as f64 / TARGET_H)
        .max(1.0);

    let w = (frame_width as f64 / scale).round() as i32;
    let h = (frame_height as f64 / scale).round() as i32;

    let w = ((w + ALIGNMENT / 2) / ALIGNMENT) * ALIGNMENT;
    let h = ((h + ALIGNMENT / 2) / ALIGNMENT) * ALIGNMENT;

    (w.clamp(160, 960), h.clamp(120, 540))
}

fn create_with_fallback(model_path: &Path, input_size: (i32, i32)) -> MediaResult<Ptr<FaceDetectorYN>> {
    let backends = [
        (DNN_BACKEND_DEFAULT, DNN_TARGET_CPU, "default"),
        (DNN_BACKEND_OPENCV, DNN_TARGET_CPU, "opencv"),
    ];

    let path = model_path.to_string_lossy();
    let mut last_error = String::new();

    for (backend_id, target_id, backend_name) in backends {
        match FaceDetectorYN::create(
            &path,
            "",
            Size::new(input_size.0, input_size.1),
            SCORE_THRESHOLD,
            NMS_THRESHOLD,
            TOP_K,
            backend_id,
            target_id,
        ) {
            Ok(detector) => {
                debug!(backend = backend_name, "YuNet created");
                return Ok(detector);
            }
            Err(e) => {
                warn!(backend = backend_name, error = %e, "YuNet backend failed");
                last_error = e.to_string();
            }
        }
    }

    Err(MediaError::detection_failed(format!(
        "Failed to create YuNet detector with any backend: {last_error}"
    )))
}
