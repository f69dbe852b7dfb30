//! Command-line arguments for the three binaries.
//!
//! Every option falls back to an environment variable (loaded from `.env`
//! when present) and then to the default used by the media pipelines.

use std::path::PathBuf;

use clap::{error::ErrorKind, ArgAction, Parser, ValueEnum};

use deepscan_media::{
    AnnotateConfig, ClassifierSpec, CompressionSettings, DetectConfig, DetectorKind, FusionConfig,
    InferenceDevice,
};
use deepscan_models::{parse_confidence_scores, FusionWeighting, FAKE_THRESHOLD, SAMPLE_EVERY_N_FRAMES};

use crate::error::{CliError, CliResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DetectorArg {
    /// OpenCV Haar cascade
    Haar,
    /// YuNet ONNX face detector
    Yunet,
}

impl From<DetectorArg> for DetectorKind {
    fn from(value: DetectorArg) -> Self {
        match value {
            DetectorArg::Haar => DetectorKind::Haar,
            DetectorArg::Yunet => DetectorKind::YuNet,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    Cpu,
    #[value(alias = "gpu")]
    Cuda,
}

impl From<DeviceArg> for InferenceDevice {
    fn from(value: DeviceArg) -> Self {
        match value {
            DeviceArg::Cpu => InferenceDevice::Cpu,
            DeviceArg::Cuda => InferenceDevice::Cuda,
        }
    }
}

/// Help and version requests are printed and exit 0; anything else is a usage error.
pub fn is_informational(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

/// The video argument must be given and must exist.
pub fn require_video(video: Option<PathBuf>) -> CliResult<PathBuf> {
    let video = video.ok_or(CliError::MissingVideo)?;
    if !video.exists() {
        return Err(CliError::VideoNotFound);
    }
    Ok(video)
}

/// Classify a video as Real or Fake from its faces.
#[derive(Debug, Parser)]
#[command(name = "deepscan-detect", author, version, about)]
pub struct DetectArgs {
    /// Video to analyse.
    pub video: Option<PathBuf>,

    /// Face-crop classifier (ONNX).
    #[arg(long, env = "DEEPSCAN_MODEL", default_value = "model/deepfake_detection.onnx")]
    pub model: PathBuf,

    /// Face detector implementation.
    #[arg(long, env = "DEEPSCAN_DETECTOR", value_enum, default_value = "haar")]
    pub detector: DetectorArg,

    /// Cascade XML for Haar, ONNX file for YuNet.
    #[arg(long = "detector-model", visible_alias = "cascade", env = "DEEPSCAN_CASCADE")]
    pub detector_model: Option<PathBuf>,

    /// Side length of the square classifier input.
    #[arg(long = "input-size", default_value_t = 128)]
    pub input_size: i32,

    /// Analyse every Nth frame.
    #[arg(long = "sample-every", default_value_t = SAMPLE_EVERY_N_FRAMES)]
    pub sample_every: u64,

    /// Downscale and JPEG-compress sampled frames before detection.
    #[arg(long, action = ArgAction::SetTrue)]
    pub compress: bool,

    /// Centered moving average over the reported scores (0 disables).
    #[arg(long = "smooth-window", default_value_t = 0)]
    pub smooth_window: usize,

    /// Include face-detection statistics in the result.
    #[arg(long, action = ArgAction::SetTrue)]
    pub stats: bool,

    /// Inference device.
    #[arg(long, env = "DEEPSCAN_DEVICE", value_enum, default_value = "cpu")]
    pub device: DeviceArg,
}

impl DetectArgs {
    pub fn detect_config(&self) -> DetectConfig {
        DetectConfig {
            model_path: self.model.clone(),
            classifier: ClassifierSpec::face_crop().with_size(self.input_size),
            detector: self.detector.into(),
            detector_model: self.detector_model.clone(),
            sample_every: self.sample_every,
            compression: self.compress.then(CompressionSettings::default),
            smooth_window: self.smooth_window,
            include_stats: self.stats,
            device: self.device.into(),
        }
    }
}

/// Render a face-mesh overlay with confidence labels to MP4.
#[derive(Debug, Parser)]
#[command(name = "deepscan-annotate", author, version, about)]
pub struct AnnotateArgs {
    /// Source video.
    pub input: Option<PathBuf>,

    /// Destination MP4.
    pub output: Option<PathBuf>,

    /// JSON list of scores (`[0.91, 0.87]`) or a single number.
    pub confidence_scores: Option<String>,

    /// Face landmark model (ONNX).
    #[arg(
        long = "face-mesh-model",
        env = "DEEPSCAN_FACE_MESH_MODEL",
        default_value = "models/face_mesh/face_landmark_with_attention.onnx"
    )]
    pub face_mesh_model: PathBuf,

    /// Face detector implementation.
    #[arg(long, env = "DEEPSCAN_DETECTOR", value_enum, default_value = "haar")]
    pub detector: DetectorArg,

    /// Cascade XML for Haar, ONNX file for YuNet.
    #[arg(long = "detector-model", visible_alias = "cascade", env = "DEEPSCAN_CASCADE")]
    pub detector_model: Option<PathBuf>,

    /// Faces annotated per frame.
    #[arg(long = "max-faces", default_value_t = 2)]
    pub max_faces: usize,

    /// Frames between label updates.
    #[arg(long = "update-every", default_value_t = SAMPLE_EVERY_N_FRAMES)]
    pub update_every: u64,

    /// FFmpeg encode timeout in seconds.
    #[arg(long = "ffmpeg-timeout", default_value_t = 3600)]
    pub ffmpeg_timeout: u64,

    /// Inference device.
    #[arg(long, env = "DEEPSCAN_DEVICE", value_enum, default_value = "cpu")]
    pub device: DeviceArg,
}

/// Validated annotate inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub scores: Vec<f64>,
}

impl AnnotateArgs {
    pub fn job(&self) -> CliResult<AnnotateJob> {
        let input = require_video(self.input.clone())?;
        let output = self
            .output
            .clone()
            .ok_or_else(|| CliError::Usage("No output video provided".to_string()))?;
        let raw = self
            .confidence_scores
            .as_deref()
            .ok_or_else(|| CliError::Usage("No confidence scores provided".to_string()))?;
        let scores = parse_confidence_scores(raw)?;
        Ok(AnnotateJob { input, output, scores })
    }

    pub fn annotate_config(&self) -> AnnotateConfig {
        AnnotateConfig {
            face_mesh_model: self.face_mesh_model.clone(),
            detector: self.detector.into(),
            detector_model: self.detector_model.clone(),
            max_faces: self.max_faces,
            update_every: self.update_every,
            ffmpeg_timeout_secs: self.ffmpeg_timeout,
            device: self.device.into(),
            ..AnnotateConfig::default()
        }
    }
}

/// Classify a video by fusing an RGB classifier with an optical-flow classifier.
#[derive(Debug, Parser)]
#[command(name = "deepscan-fusion", author, version, about)]
pub struct FusionArgs {
    /// Video to analyse.
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// RAFT optical-flow model (ONNX).
    #[arg(long, env = "DEEPSCAN_RAFT_MODEL", default_value = "raft_model/raft-things.onnx")]
    pub model: PathBuf,

    /// Directory for extracted RGB frames.
    #[arg(long = "folder-original-path", default_value = "frame/000000")]
    pub frames_dir: PathBuf,

    /// Directory for optical-flow images.
    #[arg(long = "folder-optical-flow-path", default_value = "optical_result/000000")]
    pub flow_dir: PathBuf,

    /// RGB frame classifier (ONNX).
    #[arg(long = "model-original-path", env = "DEEPSCAN_RGB_MODEL", default_value = "checkpoints/original.onnx")]
    pub rgb_model: PathBuf,

    /// Optical-flow image classifier (ONNX).
    #[arg(
        long = "model-optical-flow-path",
        env = "DEEPSCAN_OPTICAL_MODEL",
        default_value = "checkpoints/optical.onnx"
    )]
    pub optical_model: PathBuf,

    /// Where `combined_frames.jpg` is written.
    #[arg(long = "preview-dir", default_value = "temp_frames")]
    pub preview_dir: PathBuf,

    /// Fused probability at or above this is Fake.
    #[arg(short = 't', long, default_value_t = FAKE_THRESHOLD)]
    pub threshold: f64,

    /// Weight of the RGB model under fixed weighting.
    #[arg(long = "rgb-weight", default_value_t = 0.7, value_parser = parse_unit_weight)]
    pub rgb_weight: f64,

    /// Derive the weights from each model's confidence.
    #[arg(long = "adaptive-weight", action = ArgAction::SetTrue)]
    pub adaptive_weight: bool,

    /// ImageNet normalization of classifier inputs.
    #[arg(long = "aug-norm", default_value_t = true, action = ArgAction::Set)]
    pub aug_norm: bool,

    /// Center-crop size fed to the classifiers.
    #[arg(long = "crop-size", default_value_t = 448)]
    pub crop_size: i32,

    /// Keep extracted frames at full resolution.
    #[arg(long = "no-compress", action = ArgAction::SetTrue)]
    pub no_compress: bool,

    /// Inference device.
    #[arg(long, env = "DEEPSCAN_DEVICE", value_enum, default_value = "cpu")]
    pub device: DeviceArg,
}

/// A weight in `[0, 1]`.
fn parse_unit_weight(s: &str) -> Result<f64, String> {
    let weight: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(weight)
    } else {
        Err(format!("{weight} is not in [0, 1]"))
    }
}

impl FusionArgs {
    pub fn fusion_config(&self) -> FusionConfig {
        let weighting = if self.adaptive_weight {
            FusionWeighting::Adaptive
        } else {
            FusionWeighting::Fixed {
                rgb_weight: self.rgb_weight,
            }
        };

        FusionConfig {
            raft_model: self.model.clone(),
            optical_model: self.optical_model.clone(),
            rgb_model: self.rgb_model.clone(),
            frames_dir: self.frames_dir.clone(),
            flow_dir: self.flow_dir.clone(),
            preview_dir: self.preview_dir.clone(),
            threshold: self.threshold,
            weighting,
            aug_norm: self.aug_norm,
            crop_size: self.crop_size,
            compression: (!self.no_compress).then(CompressionSettings::default),
            device: self.device.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepscan_media::{Normalization, ResizeMode};

    #[test]
    fn test_detect_defaults() {
        let args = DetectArgs::try_parse_from(["deepscan-detect", "clip.mp4"]).unwrap();
        assert_eq!(args.video, Some(PathBuf::from("clip.mp4")));

        let config = args.detect_config();
        assert_eq!(config.sample_every, 5);
        assert_eq!(config.classifier.width, 128);
        assert!(config.compression.is_none());
        assert!(!config.include_stats);
    }

    #[test]
    fn test_detect_options() {
        let args = DetectArgs::try_parse_from([
            "deepscan-detect",
            "clip.mp4",
            "--detector",
            "yunet",
            "--cascade",
            "models/yunet.onnx",
            "--compress",
            "--stats",
            "--smooth-window",
            "3",
            "--input-size",
            "224",
        ])
        .unwrap();

        let config = args.detect_config();
        assert_eq!(config.detector, DetectorKind::YuNet);
        assert_eq!(config.detector_model, Some(PathBuf::from("models/yunet.onnx")));
        assert_eq!(config.compression, Some(CompressionSettings::default()));
        assert!(config.include_stats);
        assert_eq!(config.smooth_window, 3);
        assert_eq!(config.classifier.width, 224);
    }

    #[test]
    fn test_detect_without_video_parses() {
        let args = DetectArgs::try_parse_from(["deepscan-detect"]).unwrap();
        assert!(matches!(require_video(args.video), Err(CliError::MissingVideo)));
    }

    #[test]
    fn test_require_video() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        assert_eq!(require_video(Some(path.clone())).unwrap(), path);
        assert!(matches!(
            require_video(Some(PathBuf::from("/nonexistent/clip.mp4"))),
            Err(CliError::VideoNotFound)
        ));
    }

    #[test]
    fn test_gpu_alias() {
        let args = DetectArgs::try_parse_from(["deepscan-detect", "a.mp4", "--device", "gpu"]).unwrap();
        assert_eq!(InferenceDevice::from(args.device), InferenceDevice::Cuda);
    }

    #[test]
    fn test_help_is_informational() {
        let err = DetectArgs::try_parse_from(["deepscan-detect", "--help"]).unwrap_err();
        assert!(is_informational(&err));

        let err = DetectArgs::try_parse_from(["deepscan-detect", "--bogus"]).unwrap_err();
        assert!(!is_informational(&err));
    }

    #[test]
    fn test_annotate_job() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let input = file.path().to_string_lossy().into_owned();
        let args =
            AnnotateArgs::try_parse_from(["deepscan-annotate", input.as_str(), "out.mp4", "[0.91, 0.87]"]).unwrap();

        let job = args.job().unwrap();
        assert_eq!(job.output, PathBuf::from("out.mp4"));
        assert_eq!(job.scores, vec![0.91, 0.87]);
        assert_eq!(args.annotate_config().max_faces, 2);
    }

    #[test]
    fn test_annotate_scalar_score() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let input = file.path().to_string_lossy().into_owned();
        let args = AnnotateArgs::try_parse_from(["deepscan-annotate", input.as_str(), "out.mp4", "0.42"]).unwrap();
        assert_eq!(args.job().unwrap().scores, vec![0.42]);
    }

    #[test]
    fn test_annotate_missing_pieces() {
        let args = AnnotateArgs::try_parse_from(["deepscan-annotate"]).unwrap();
        assert!(matches!(args.job(), Err(CliError::MissingVideo)));

        let file = tempfile::NamedTempFile::new().unwrap();
        let input = file.path().to_string_lossy().into_owned();
        let args = AnnotateArgs::try_parse_from(["deepscan-annotate", input.as_str(), "out.mp4"]).unwrap();
        assert_eq!(args.job().unwrap_err().message(), "No confidence scores provided");

        let args = AnnotateArgs::try_parse_from(["deepscan-annotate", input.as_str(), "out.mp4", "[2.0]"]).unwrap();
        assert!(matches!(args.job(), Err(CliError::InvalidScores(_))));
    }

    #[test]
    fn test_fusion_defaults() {
        let args = FusionArgs::try_parse_from(["deepscan-fusion", "--path", "video/000000.mp4"]).unwrap();
        let config = args.fusion_config();
        assert_eq!(config.weighting, FusionWeighting::Fixed { rgb_weight: 0.7 });
        assert_eq!(config.threshold, 0.5);
        assert!(config.aug_norm);
        assert_eq!(config.crop_size, 448);
        assert!(config.compression.is_some());
        assert_eq!(config.frames_dir, PathBuf::from("frame/000000"));
    }

    #[test]
    fn test_fusion_options() {
        let args = FusionArgs::try_parse_from([
            "deepscan-fusion",
            "--path",
            "v.mp4",
            "-t",
            "0.6",
            "--adaptive-weight",
            "--aug-norm",
            "false",
            "--no-compress",
        ])
        .unwrap();
        let config = args.fusion_config();
        assert_eq!(config.weighting, FusionWeighting::Adaptive);
        assert_eq!(config.threshold, 0.6);
        assert!(!config.aug_norm);
        assert!(config.compression.is_none());

        let spec = ClassifierSpec::full_frame(config.aug_norm);
        assert_eq!(spec.normalization, Normalization::UnitRange);
        assert_eq!(spec.resize, ResizeMode::CenterCrop);
    }

    #[test]
    fn test_rgb_weight_range() {
        let args = FusionArgs::try_parse_from(["deepscan-fusion", "--path", "v.mp4", "--rgb-weight", "0.9"]).unwrap();
        assert_eq!(args.fusion_config().weighting, FusionWeighting::Fixed { rgb_weight: 0.9 });

        for bad in ["1.5", "-0.1", "NaN", "heavy"] {
            let flag = format!("--rgb-weight={bad}");
            let err = FusionArgs::try_parse_from(["deepscan-fusion", "--path", "v.mp4", flag.as_str()]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "{bad}");
        }
    }
}
