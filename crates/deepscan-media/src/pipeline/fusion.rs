//! RGB + optical-flow fusion pipeline.
//!
//! 1. Extract every frame (compressed) into the frames directory.
//! 2. Run RAFT on consecutive pairs and save color-wheel flow images.
//! 3. Classify every RGB frame and every flow image, average each set.
//! 4. Fuse both averages and write a combined still preview.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use deepscan_models::{fuse, mean, ErrorReport, FusionOutcome, FusionResult, FusionWeighting, FAKE_THRESHOLD};

use crate::classifier::{FrameClassifier, OnnxClassifier};
use crate::compress::CompressionSettings;
use crate::error::{MediaError, MediaResult};
use crate::frames::{clear_frame_images, extract_frames, list_frame_images, read_image, write_image};
use crate::optical_flow::{flow_image, FlowEstimator, RaftFlowEstimator};
use crate::preview::combine_random_frames;
use crate::runtime::InferenceDevice;
use crate::tensor::ClassifierSpec;

/// Fusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub raft_model: PathBuf,
    pub optical_model: PathBuf,
    pub rgb_model: PathBuf,
    /// Extracted RGB frames
    pub frames_dir: PathBuf,
    /// Generated flow images
    pub flow_dir: PathBuf,
    /// Where `combined_frames.jpg` goes
    pub preview_dir: PathBuf,
    pub threshold: f64,
    pub weighting: FusionWeighting,
    /// ImageNet normalization of classifier inputs
    pub aug_norm: bool,
    pub crop_size: i32,
    pub compression: Option<CompressionSettings>,
    pub device: InferenceDevice,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            raft_model: PathBuf::from("raft_model/raft-things.onnx"),
            optical_model: PathBuf::from("checkpoints/optical.onnx"),
            rgb_model: PathBuf::from("checkpoints/original.onnx"),
            frames_dir: PathBuf::from("frame/000000"),
            flow_dir: PathBuf::from("optical_result/000000"),
            preview_dir: PathBuf::from("temp_frames"),
            threshold: FAKE_THRESHOLD,
            weighting: FusionWeighting::default(),
            aug_norm: true,
            crop_size: 448,
            compression: Some(CompressionSettings::default()),
            device: InferenceDevice::Cpu,
        }
    }
}

impl FusionConfig {
    fn classifier_spec(&self) -> ClassifierSpec {
        ClassifierSpec::full_frame(self.aug_norm).with_size(self.crop_size)
    }
}

/// Fusion failures, each with the message printed at the process boundary.
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("No frames could be extracted from the video. Please check if the video is valid.")]
    NoFrames,

    #[error("Error processing frames for optical flow: {0}")]
    FlowFailed(MediaError),

    #[error("No optical flow frames were generated. Please check if the video contains sufficient motion.")]
    NoFlowFrames,

    /// The verdict was reached; only the preview failed.
    #[error("Error combining frames: {source}")]
    PreviewFailed {
        outcome: FusionOutcome,
        source: MediaError,
    },

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl FusionError {
    /// The JSON record for this failure.
    pub fn report(&self) -> ErrorReport {
        match self {
            FusionError::PreviewFailed { outcome, .. } => {
                ErrorReport::with_outcome(self.to_string(), outcome.prediction, outcome.probability)
            }
            _ => ErrorReport::unknown_outcome(self.to_string()),
        }
    }
}

/// Run the fusion pipeline on a video.
pub fn run_fusion(video: impl AsRef<Path>, config: &FusionConfig) -> Result<FusionResult, FusionError> {
    let video = video.as_ref();
    let started = Instant::now();

    let raft = RaftFlowEstimator::load(&config.raft_model, config.device)?;

    let frames = match extract_frames(video, &config.frames_dir, config.compression.as_ref()) {
        Ok(frames) => frames,
        Err(MediaError::FileNotFound(_) | MediaError::VideoOpen(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    if frames.is_empty() {
        return Err(FusionError::NoFrames);
    }

    let spec = config.classifier_spec();
    let rgb_classifier = OnnxClassifier::load(&config.rgb_model, spec, config.device)?;
    let optical_classifier = OnnxClassifier::load(&config.optical_model, spec, config.device)?;

    let result = fuse_frames(&frames, config, &raft, &rgb_classifier, &optical_classifier)?;
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Fusion pipeline done");
    Ok(result)
}

/// Flow generation, classification, fusion and preview over extracted frames.
pub fn fuse_frames(
    frames: &[PathBuf],
    config: &FusionConfig,
    flow: &dyn FlowEstimator,
    rgb_classifier: &dyn FrameClassifier,
    optical_classifier: &dyn FrameClassifier,
) -> Result<FusionResult, FusionError> {
    if frames.is_empty() {
        return Err(FusionError::NoFrames);
    }
    info!(frames = frames.len(), "Processing frames for optical flow");

    generate_flow_images(frames, &config.flow_dir, flow).map_err(FusionError::FlowFailed)?;

    let rgb_scores = classify_directory(&config.frames_dir, rgb_classifier)?;
    let optical_scores = classify_directory(&config.flow_dir, optical_classifier)?;
    if optical_scores.is_empty() {
        return Err(FusionError::NoFlowFrames);
    }

    let rgb_probability = mean(&rgb_scores);
    let optical_probability = mean(&optical_scores);
    let outcome = fuse(rgb_probability, optical_probability, config.weighting, config.threshold);

    info!(
        rgb = rgb_probability,
        optical = optical_probability,
        rgb_weight = outcome.rgb_weight,
        fused = outcome.probability,
        prediction = %outcome.prediction,
        "Fusion finished"
    );

    let combined = combine_random_frames(
        &config.frames_dir,
        &config.flow_dir,
        &config.preview_dir,
        &mut rand::rng(),
    )
    .map_err(|source| FusionError::PreviewFailed { outcome, source })?;

    Ok(FusionResult {
        prediction: outcome.prediction,
        confidence: outcome.probability,
        combined_frames: combined.to_string_lossy().into_owned(),
    })
}

/// Write one flow image per consecutive frame pair, named after the first frame.
fn generate_flow_images(frames: &[PathBuf], flow_dir: &Path, estimator: &dyn FlowEstimator) -> MediaResult<usize> {
    fs::create_dir_all(flow_dir)?;
    clear_frame_images(flow_dir)?;

    let mut written = 0;
    let mut previous = match frames.first() {
        Some(path) => read_image(path)?,
        None => return Ok(0),
    };

    for pair in frames.windows(2) {
        let next = read_image(&pair[1])?;
        let flow = estimator.estimate(&previous, &next)?;

        let name = pair[0]
            .file_name()
            .ok_or_else(|| MediaError::internal(format!("bad frame path {}", pair[0].display())))?;
        write_image(&flow_dir.join(name), &flow_image(&flow)?)?;
        debug!(frame = %pair[0].display(), "Flow image written");

        written += 1;
        previous = next;
    }
    Ok(written)
}

/// Probability of "fake" for every image in `dir`.
pub fn classify_directory(dir: &Path, classifier: &dyn FrameClassifier) -> MediaResult<Vec<f64>> {
    list_frame_images(dir)?
        .iter()
        .map(|path| classifier.score(&read_image(path)?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepscan_models::Prediction;
    use crate::flow_viz::FlowField;
    use crate::preview::COMBINED_FRAMES_FILE;
    use opencv::core::{Mat, Scalar, CV_8UC3};
    use opencv::prelude::*;

    /// Scores an image by its mean blue value.
    struct BlueClassifier;

    impl FrameClassifier for BlueClassifier {
        fn score(&self, image: &Mat) -> MediaResult<f64> {
            Ok(image.data_bytes()?[0] as f64 / 255.0)
        }
    }

    struct ConstClassifier(f64);

    impl FrameClassifier for ConstClassifier {
        fn score(&self, _image: &Mat) -> MediaResult<f64> {
            Ok(self.0)
        }
    }

    /// Reports no motion between any pair.
    struct StillFlow;

    impl FlowEstimator for StillFlow {
        fn estimate(&self, first: &Mat, _second: &Mat) -> MediaResult<FlowField> {
            Ok(FlowField::zeros(first.cols() as usize, first.rows() as usize))
        }
    }

    struct BrokenFlow;

    impl FlowEstimator for BrokenFlow {
        fn estimate(&self, _first: &Mat, _second: &Mat) -> MediaResult<FlowField> {
            Err(MediaError::inference_failed("bad shape"))
        }
    }

    /// Config rooted in `root` with `count` solid frames already extracted.
    fn extracted_frames(root: &Path, count: usize) -> (FusionConfig, Vec<PathBuf>) {
        let config = FusionConfig {
            frames_dir: root.join("frames"),
            flow_dir: root.join("flow"),
            preview_dir: root.join("preview"),
            ..FusionConfig::default()
        };
        fs::create_dir_all(&config.frames_dir).unwrap();
        let frames = (0..count)
            .map(|i| {
                let path = config.frames_dir.join(format!("frame_{i:05}.png"));
                let img = Mat::new_rows_cols_with_default(32, 48, CV_8UC3, Scalar::new(40.0, 80.0, 120.0, 0.0))
                    .unwrap();
                write_image(&path, &img).unwrap();
                path
            })
            .collect();
        (config, frames)
    }

    #[test]
    fn test_fuse_frames() {
        let dir = tempfile::tempdir().unwrap();
        let (config, frames) = extracted_frames(dir.path(), 3);
        fs::create_dir_all(&config.flow_dir).unwrap();
        let stale = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::all(0.0)).unwrap();
        write_image(&config.flow_dir.join("frame_00042.png"), &stale).unwrap();

        let result = fuse_frames(&frames, &config, &StillFlow, &ConstClassifier(0.2), &ConstClassifier(0.9)).unwrap();

        let flow_names: Vec<String> = list_frame_images(&config.flow_dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(flow_names, vec!["frame_00000.png", "frame_00001.png"]);

        let expected = fuse(0.2, 0.9, config.weighting, config.threshold);
        assert_eq!(result.prediction, expected.prediction);
        assert!((result.confidence - expected.probability).abs() < 1e-12);
        assert!(result.combined_frames.ends_with(COMBINED_FRAMES_FILE));
        assert!(Path::new(&result.combined_frames).exists());
    }

    #[test]
    fn test_single_frame_has_no_flow() {
        let dir = tempfile::tempdir().unwrap();
        let (config, frames) = extracted_frames(dir.path(), 1);

        let err = fuse_frames(&frames, &config, &StillFlow, &ConstClassifier(0.2), &ConstClassifier(0.9)).unwrap_err();
        assert!(matches!(err, FusionError::NoFlowFrames));
    }

    #[test]
    fn test_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = extracted_frames(dir.path(), 0);

        let err = fuse_frames(&[], &config, &StillFlow, &ConstClassifier(0.2), &ConstClassifier(0.9)).unwrap_err();
        assert!(matches!(err, FusionError::NoFrames));
    }

    #[test]
    fn test_flow_estimator_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (config, frames) = extracted_frames(dir.path(), 2);

        let err = fuse_frames(&frames, &config, &BrokenFlow, &ConstClassifier(0.2), &ConstClassifier(0.9)).unwrap_err();
        assert!(matches!(err, FusionError::FlowFailed(MediaError::InferenceFailed(_))));
        assert_eq!(
            err.to_string(),
            "Error processing frames for optical flow: Inference failed: bad shape"
        );
    }

    #[test]
    fn test_classify_directory() {
        let dir = tempfile::tempdir().unwrap();
        for (i, blue) in [0.0, 255.0].iter().enumerate() {
            let img = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::new(*blue, 0.0, 0.0, 0.0)).unwrap();
            write_image(&dir.path().join(format!("frame_{i:05}.png")), &img).unwrap();
        }

        let scores = classify_directory(dir.path(), &BlueClassifier).unwrap();
        assert_eq!(scores, vec![0.0, 1.0]);
    }

    #[test]
    fn test_classify_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(classify_directory(dir.path(), &BlueClassifier).unwrap().is_empty());
    }

    #[test]
    fn test_error_reports() {
        let report = FusionError::NoFrames.report();
        assert_eq!(report.prediction.as_deref(), Some("Unknown"));
        assert_eq!(report.confidence, Some(0.0));
        assert!(report.error.starts_with("No frames could be extracted"));

        let outcome = fuse(0.9, 0.8, FusionWeighting::default(), 0.5);
        let report = FusionError::PreviewFailed {
            outcome,
            source: MediaError::internal("disk full"),
        }
        .report();
        assert_eq!(report.prediction.as_deref(), Some("Fake"));
        assert_eq!(report.confidence, Some(outcome.probability));
        assert!(report.error.starts_with("Error combining frames: "));
        assert_eq!(outcome.prediction, Prediction::Fake);
    }

    #[test]
    fn test_flow_failure_message() {
        let err = FusionError::FlowFailed(MediaError::inference_failed("bad shape"));
        assert_eq!(
            err.to_string(),
            "Error processing frames for optical flow: Inference failed: bad shape"
        );
    }

    #[test]
    fn test_default_config() {
        let config = FusionConfig::default();
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.weighting, FusionWeighting::Fixed { rgb_weight: 0.7 });
        assert_eq!(config.classifier_spec().width, 448);
    }

    #[test]
    fn test_missing_raft_model() {
        let config = FusionConfig {
            raft_model: PathBuf::from("/nonexistent/raft.onnx"),
            ..FusionConfig::default()
        };
        let err = run_fusion("/nonexistent/video.mp4", &config).unwrap_err();
        assert!(matches!(err, FusionError::Media(MediaError::ModelNotFound(_))));
    }
}
