//! Face-classifier pipeline: sample frames, detect faces, classify crops,
//! aggregate by majority vote.

use std::path::{Path, PathBuf};
use std::time::Instant;

use opencv::core::Mat;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use deepscan_models::{is_sampled_frame, moving_average, Aggregate, DetectionResult, FaceStats, ScoreAggregator, SAMPLE_EVERY_N_FRAMES};

use crate::classifier::{FrameClassifier, OnnxClassifier};
use crate::compress::{compress_frame, CompressionSettings};
use crate::detector::{create_detector, DetectorKind, FaceDetector};
use crate::error::{MediaError, MediaResult};
use crate::runtime::InferenceDevice;
use crate::tensor::ClassifierSpec;
use crate::video::VideoReader;

/// Detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectConfig {
    pub model_path: PathBuf,
    pub classifier: ClassifierSpec,
    pub detector: DetectorKind,
    /// Cascade XML (Haar) or ONNX file (YuNet)
    pub detector_model: Option<PathBuf>,
    /// Analyse frames whose index is a multiple of this
    pub sample_every: u64,
    /// Resize + JPEG pass applied to sampled frames before detection
    pub compression: Option<CompressionSettings>,
    /// Centered moving average over the reported scores (`<= 1` disables)
    pub smooth_window: usize,
    pub include_stats: bool,
    pub device: InferenceDevice,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/deepfake_detection.onnx"),
            classifier: ClassifierSpec::face_crop(),
            detector: DetectorKind::Haar,
            detector_model: None,
            sample_every: SAMPLE_EVERY_N_FRAMES,
            compression: None,
            smooth_window: 0,
            include_stats: false,
            device: InferenceDevice::Cpu,
        }
    }
}

/// Per-frame loop output.
#[derive(Debug, Clone)]
pub struct FrameScan {
    pub aggregate: Aggregate,
    pub stats: FaceStats,
}

/// Run the face-classifier pipeline over a video file.
pub fn detect_video(path: impl AsRef<Path>, config: &DetectConfig) -> MediaResult<DetectionResult> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let started = Instant::now();
    let classifier = OnnxClassifier::load(&config.model_path, config.classifier, config.device)?;
    let mut detector = create_detector(config.detector, config.detector_model.as_deref())?;
    let reader = VideoReader::open(path)?;

    let scan = scan_frames(
        reader,
        detector.as_mut(),
        &classifier,
        config.sample_every,
        config.compression.as_ref(),
    )?;

    info!(
        video = %path.display(),
        detector = detector.name(),
        samples = scan.aggregate.samples(),
        frames = scan.stats.frames_read,
        face_hit_rate = scan.stats.face_hit_rate(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Detection finished"
    );

    build_result(path, scan, config)
}

/// Sample, detect and classify every face in `frames`.
pub fn scan_frames<I>(
    frames: I,
    detector: &mut dyn FaceDetector,
    classifier: &dyn FrameClassifier,
    sample_every: u64,
    compression: Option<&CompressionSettings>,
) -> MediaResult<FrameScan>
where
    I: IntoIterator<Item = MediaResult<(u64, Mat)>>,
{
    let mut aggregator = ScoreAggregator::new();
    let mut stats = FaceStats::default();

    for item in frames {
        let (index, frame) = item?;
        stats.frames_read += 1;
        if !is_sampled_frame(index, sample_every) {
            continue;
        }
        stats.frames_sampled += 1;

        let frame = match compression {
            Some(settings) => compress_frame(&frame, settings)?,
            None => frame,
        };

        let faces = detector.detect(&frame)?;
        if faces.is_empty() {
            continue;
        }
        stats.frames_with_faces += 1;

        for face in &faces {
            stats.faces_detected += 1;
            let crop = Mat::roi(&frame, face.to_rect())?.try_clone()?;
            let score = classifier.score(&crop).map_err(as_prediction_error)?;
            let verdict = aggregator.push_score(score);
            debug!(
                frame = index,
                score,
                prediction = %verdict.prediction,
                "Face classified"
            );
        }
    }

    Ok(FrameScan {
        aggregate: aggregator.finish(),
        stats,
    })
}

fn as_prediction_error(err: MediaError) -> MediaError {
    match err {
        MediaError::InferenceFailed(_) => err,
        other => MediaError::inference_failed(other.to_string()),
    }
}

/// Turn a scan into the printed record.
pub fn build_result(path: &Path, scan: FrameScan, config: &DetectConfig) -> MediaResult<DetectionResult> {
    if scan.aggregate.samples() == 0 {
        return Err(MediaError::NoFacesDetected);
    }

    let mut result = DetectionResult::from_aggregate(path, scan.aggregate);
    if config.smooth_window > 1 {
        result.confidence_scores = moving_average(&result.confidence_scores, config.smooth_window);
    }
    if config.include_stats {
        result = result.with_face_stats(scan.stats);
    }
    Ok(result)
}
