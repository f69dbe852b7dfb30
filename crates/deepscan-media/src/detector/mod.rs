//! Face detection behind a single trait.
//!
//! Two backends are available:
//! - [`HaarCascadeDetector`]: OpenCV Haar cascade (frontal face)
//! - [`YuNetDetector`]: OpenCV's FaceDetectorYN CNN

mod haar;
mod yunet;

pub use haar::{find_cascade_path, HaarCascadeDetector, HaarParams};
pub use yunet::YuNetDetector;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use opencv::core::{Mat, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Face bounding box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Detector confidence, `1.0` for detectors that report none
    pub score: f32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score: 1.0,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Clip the box to a `frame_w × frame_h` frame. Returns `None` when
    /// nothing is left.
    pub fn clamp_to(&self, frame_w: i32, frame_h: i32) -> Option<Self> {
        let x1 = self.x.clamp(0, frame_w);
        let y1 = self.y.clamp(0, frame_h);
        let x2 = (self.x + self.width).clamp(0, frame_w);
        let y2 = (self.y + self.height).clamp(0, frame_h);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            score: self.score,
        })
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

impl From<Rect> for FaceBox {
    fn from(r: Rect) -> Self {
        Self::new(r.x, r.y, r.width, r.height)
    }
}

/// A face detector operating on BGR frames.
pub trait FaceDetector: Send {
    /// Detect faces; boxes are clamped to the frame.
    fn detect(&mut self, frame_bgr: &Mat) -> MediaResult<Vec<FaceBox>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Available detector backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default]
    Haar,
    YuNet,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Haar => f.write_str("haar"),
            DetectorKind::YuNet => f.write_str("yunet"),
        }
    }
}

impl FromStr for DetectorKind {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haar" | "haarcascade" => Ok(Self::Haar),
            "yunet" => Ok(Self::YuNet),
            other => Err(MediaError::invalid_config(format!(
                "unknown detector '{other}' (expected haar or yunet)"
            ))),
        }
    }
}

/// Build a detector. `model_path` is the cascade XML for Haar (searched in
/// the OpenCV data directories when absent) and the ONNX file for YuNet.
pub fn create_detector(kind: DetectorKind, model_path: Option<&Path>) -> MediaResult<Box<dyn FaceDetector>> {
    match kind {
        DetectorKind::Haar => {
            let path = match model_path {
                Some(p) => p.to_path_buf(),
                None => find_cascade_path().ok_or_else(|| {
                    MediaError::model_not_found(haar::DEFAULT_CASCADE_FILE)
                })?,
            };
            Ok(Box::new(HaarCascadeDetector::new(&path, HaarParams::default())?))
        }
        DetectorKind::YuNet => {
            let path = model_path.ok_or_else(|| {
                MediaError::invalid_config("YuNet requires a model path (--detector-model)")
            })?;
            Ok(Box::new(YuNetDetector::new(path)?))
        }
    }
}

/// Keep the `max` largest boxes, largest first.
pub fn largest_faces(mut faces: Vec<FaceBox>, max: usize) -> Vec<FaceBox> {
    faces.sort_by(|a, b| b.area().cmp(&a.area()));
    faces.truncate(max);
    faces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_inside() {
        let b = FaceBox::new(10, 20, 30, 40);
        assert_eq!(b.clamp_to(100, 100), Some(b));
    }

    #[test]
    fn test_clamp_partial() {
        let b = FaceBox::new(-10, 90, 50, 50).clamp_to(100, 100).unwrap();
        assert_eq!((b.x, b.y, b.width, b.height), (0, 90, 40, 10));
    }

    #[test]
    fn test_clamp_outside() {
        assert!(FaceBox::new(200, 200, 10, 10).clamp_to(100, 100).is_none());
        assert!(FaceBox::new(10, 10, 0, 10).clamp_to(100, 100).is_none());
    }

    #[test]
    fn test_detector_kind_parse() {
        assert_eq!("haar".parse::<DetectorKind>().unwrap(), DetectorKind::Haar);
        assert_eq!("YuNet".parse::<DetectorKind>().unwrap(), DetectorKind::YuNet);
        assert!("mtcnn".parse::<DetectorKind>().is_err());
        assert_eq!(DetectorKind::YuNet.to_string(), "yunet");
    }

    #[test]
    fn test_largest_faces() {
        let faces = vec![
            FaceBox::new(0, 0, 10, 10),
            FaceBox::new(0, 0, 30, 30),
            FaceBox::new(0, 0, 20, 20),
        ];
        let top = largest_faces(faces, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].width, 30);
        assert_eq!(top[1].width, 20);
    }

    #[test]
    fn test_yunet_requires_path() {
        assert!(matches!(
            create_detector(DetectorKind::YuNet, None),
            Err(MediaError::InvalidConfig(_))
        ));
    }
}
