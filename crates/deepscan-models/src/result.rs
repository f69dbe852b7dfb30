//! Records printed to stdout at the end of a run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::aggregate::Aggregate;
use crate::prediction::Prediction;

/// Face-detection statistics gathered while sampling a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceStats {
    /// Frames decoded from the capture
    pub frames_read: u64,
    /// Frames that fell on the sampling stride
    pub frames_sampled: u64,
    /// Sampled frames with at least one face
    pub frames_with_faces: u64,
    /// Total faces classified
    pub faces_detected: u64,
}

impl FaceStats {
    /// Fraction of sampled frames that contained a face.
    pub fn face_hit_rate(&self) -> f64 {
        if self.frames_sampled == 0 {
            return 0.0;
        }
        self.frames_with_faces as f64 / self.frames_sampled as f64
    }
}

/// Final result of the face-classifier pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// File name of the analysed video (no directory)
    pub video: String,
    pub prediction: Prediction,
    pub confidence: f64,
    pub confidence_scores: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_stats: Option<FaceStats>,
}

impl DetectionResult {
    /// Build a result from an aggregate for the given video path.
    pub fn from_aggregate(video_path: impl AsRef<Path>, aggregate: Aggregate) -> Self {
        Self {
            video: video_display_name(video_path),
            prediction: aggregate.prediction,
            confidence: aggregate.confidence,
            confidence_scores: aggregate.confidence_scores,
            face_stats: None,
        }
    }

    /// Attach face-detection statistics.
    pub fn with_face_stats(mut self, stats: FaceStats) -> Self {
        self.face_stats = Some(stats);
        self
    }
}

/// Result of the RGB + optical-flow fusion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub prediction: Prediction,
    /// Fused probability of "fake"
    pub confidence: f64,
    /// Path of the combined still-image preview
    pub combined_frames: String,
}

/// Error record printed instead of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ErrorReport {
    /// A bare `{"error": ...}` record.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            prediction: None,
            confidence: None,
        }
    }

    /// An error record that carries no usable outcome.
    pub fn unknown_outcome(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            prediction: Some("Unknown".to_string()),
            confidence: Some(0.0),
        }
    }

    /// An error record that still reports the outcome reached before failing.
    pub fn with_outcome(message: impl Into<String>, prediction: Prediction, confidence: f64) -> Self {
        Self {
            error: message.into(),
            prediction: Some(prediction.as_str().to_string()),
            confidence: Some(confidence),
        }
    }
}

/// File name of a video path, falling back to the full path.
pub fn video_display_name(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ScoreAggregator;
    use serde_json::{json, Value};

    #[test]
    fn test_detection_result_shape() {
        let mut agg = ScoreAggregator::new();
        agg.push_score(0.9);
        agg.push_score(0.3);
        agg.push_score(0.8);
        let result = DetectionResult::from_aggregate("/tmp/uploads/clip.mp4", agg.finish());

        let value: Value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["video"], "clip.mp4");
        assert_eq!(value["prediction"], "Fake");
        assert_eq!(value["confidence_scores"].as_array().unwrap().len(), 3);
        assert!(value.get("face_stats").is_none());

        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_face_stats_are_optional() {
        let result = DetectionResult::from_aggregate("a.mp4", ScoreAggregator::new().finish())
            .with_face_stats(FaceStats {
                frames_read: 100,
                frames_sampled: 20,
                frames_with_faces: 5,
                faces_detected: 6,
            });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["face_stats"]["faces_detected"], 6);
        assert!((result.face_stats.unwrap().face_hit_rate() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_error_report_shapes() {
        let bare = serde_json::to_value(ErrorReport::new("Video file not found")).unwrap();
        assert_eq!(bare, json!({"error": "Video file not found"}));

        let unknown = serde_json::to_value(ErrorReport::unknown_outcome("no frames")).unwrap();
        assert_eq!(
            unknown,
            json!({"error": "no frames", "prediction": "Unknown", "confidence": 0.0})
        );

        let partial =
            serde_json::to_value(ErrorReport::with_outcome("preview", Prediction::Fake, 0.7)).unwrap();
        assert_eq!(partial["prediction"], "Fake");
    }

    #[test]
    fn test_result_parses_back() {
        let raw = r#"{"video":"v.mp4","prediction":"Real","confidence":0.91,"confidence_scores":[0.9,0.92]}"#;
        let parsed: DetectionResult = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.prediction, Prediction::Real);
        assert!(parsed.face_stats.is_none());
    }

    #[test]
    fn test_display_name_without_directory() {
        assert_eq!(video_display_name("video.mp4"), "video.mp4");
        assert_eq!(video_display_name("a/b/c.avi"), "c.avi");
    }
}
