//! Shared data models for DeepScan.
//!
//! This crate provides Serde-serializable types for:
//! - Per-sample verdicts and the final video result
//! - Error records printed at the process boundary
//! - Majority-vote aggregation of classifier scores
//! - RGB/optical-flow fusion weighting
//! - Confidence-score parsing and smoothing

pub mod aggregate;
pub mod fusion;
pub mod prediction;
pub mod result;
pub mod scores;
pub mod smoothing;

// Re-export common types
pub use aggregate::{is_sampled_frame, round_to, Aggregate, ScoreAggregator, SAMPLE_EVERY_N_FRAMES};
pub use fusion::{fuse, model_confidence, FusionOutcome, FusionWeighting};
pub use prediction::{FrameVerdict, Prediction, FAKE_THRESHOLD};
pub use result::{video_display_name, DetectionResult, ErrorReport, FaceStats, FusionResult};
pub use scores::{parse_confidence_scores, ScoreParseError};
pub use smoothing::{mean, moving_average};
