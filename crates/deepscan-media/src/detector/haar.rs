//! OpenCV Haar cascade frontal face detector.

use std::path::{Path, PathBuf};

use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use tracing::{debug, info};

use super::{FaceBox, FaceDetector};
use crate::error::{MediaError, MediaResult};

pub(super) const DEFAULT_CASCADE_FILE: &str = "haarcascade_frontalface_default.xml";

/// Directories that ship OpenCV's Haar cascades on common installs.
const CASCADE_DIRS: &[&str] = &[
    ".",
    "models",
    "/usr/share/opencv4/haarcascades",
    "/usr/share/opencv/haarcascades",
    "/usr/local/share/opencv4/haarcascades",
    "/usr/local/share/opencv/haarcascades",
    "/opt/homebrew/share/opencv4/haarcascades",
];

/// Locate the frontal-face cascade in the usual OpenCV data directories.
pub fn find_cascade_path() -> Option<PathBuf> {
    CASCADE_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(DEFAULT_CASCADE_FILE))
        .find(|p| p.exists())
}

/// `detectMultiScale` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaarParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size: i32,
}

impl Default for HaarParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 30,
        }
    }
}

pub struct HaarCascadeDetector {
    classifier: CascadeClassifier,
    params: HaarParams,
}

impl HaarCascadeDetector {
    pub fn new(cascade_path: &Path, params: HaarParams) -> MediaResult<Self> {
        if !cascade_path.exists() {
            return Err(MediaError::model_not_found(cascade_path));
        }

        let classifier = CascadeClassifier::new(&cascade_path.to_string_lossy())?;
        if classifier.empty()? {
            return Err(MediaError::detection_failed(format!(
                "Failed to load Haar cascade from {}",
                cascade_path.display()
            )));
        }

        info!(cascade = %cascade_path.display(), "Haar cascade loaded");
        Ok(Self { classifier, params })
    }
}

impl FaceDetector for HaarCascadeDetector {
    fn detect(&mut self, frame_bgr: &Mat) -> MediaResult<Vec<FaceBox>> {
        if frame_bgr.empty() {
            return Ok(Vec::new());
        }

        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame_bgr, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let mut rects = Vector::<Rect>::new();
        let min = Size::new(self.params.min_size, self.params.min_size);
        self.classifier.detect_multi_scale(
            &gray,
            &mut rects,
            self.params.scale_factor,
            self.params.min_neighbors,
            0,
            min,
            Size::new(0, 0),
        )?;

        let (w, h) = (frame_bgr.cols(), frame_bgr.rows());
        let faces: Vec<FaceBox> = rects
            .iter()
            .filter_map(|r| FaceBox::from(r).clamp_to(w, h))
            .collect();

        debug!(faces = faces.len(), "Haar detection");
        Ok(faces)
    }

    fn name(&self) -> &'static str {
        "haar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let p = HaarParams::default();
        assert_eq!(p.scale_factor, 1.1);
        assert_eq!(p.min_neighbors, 5);
        assert_eq!(p.min_size, 30);
    }

    #[test]
    fn test_missing_cascade() {
        let result = HaarCascadeDetector::new(Path::new("/nonexistent/cascade.xml"), HaarParams::default());
        assert!(matches!(result, Err(MediaError::ModelNotFound(_))));
    }
}
