#![deny(unreachable_patterns)]
//! Media and inference layer for deepfake detection.
//!
//! This crate provides:
//! - OpenCV frame capture with the every-Nth-frame sampling schedule
//! - Haar cascade and YuNet face detectors behind one trait
//! - ONNX Runtime classifiers for face crops and full frames
//! - RAFT optical flow and its color visualization
//! - Face mesh annotation rendered to MP4 through the FFmpeg CLI
//! - The detect, annotate and fusion pipelines used by the binaries

pub mod annotate;
pub mod classifier;
pub mod command;
pub mod compress;
pub mod detector;
pub mod error;
pub mod face_mesh;
pub mod flow_viz;
pub mod frames;
pub mod optical_flow;
pub mod pipeline;
pub mod preview;
pub mod probe;
pub mod progress;
pub mod runtime;
pub mod tensor;
pub mod video;

pub use annotate::{annotate_video, AnnotateConfig, AnnotateSummary, ConfidenceTicker};
pub use classifier::{FrameClassifier, OnnxClassifier};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use compress::{compress_frame, CompressionSettings};
pub use detector::{create_detector, DetectorKind, FaceBox, FaceDetector, HaarCascadeDetector, YuNetDetector};
pub use error::{MediaError, MediaResult};
pub use face_mesh::{FaceLandmark, FaceMeshDetector};
pub use optical_flow::{FlowEstimator, RaftFlowEstimator};
pub use pipeline::detect::{detect_video, scan_frames, DetectConfig};
pub use pipeline::fusion::{fuse_frames, run_fusion, FusionConfig, FusionError};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use runtime::InferenceDevice;
pub use tensor::{ChannelOrder, ClassifierSpec, Normalization, OutputActivation, ResizeMode, TensorLayout};
pub use video::VideoReader;
