//! Errors surfaced by the command-line binaries.

use deepscan_media::MediaError;
use deepscan_models::ScoreParseError;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("No video file provided")]
    MissingVideo,

    #[error("Video file not found")]
    VideoNotFound,

    #[error("Invalid confidence scores: {0}")]
    InvalidScores(#[from] ScoreParseError),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl CliError {
    /// Message printed in the `{"error": ...}` record.
    pub fn message(&self) -> String {
        match self {
            CliError::Media(MediaError::FileNotFound(_)) => "Video file not found".to_string(),
            CliError::Media(MediaError::VideoOpen(path)) => format!("Could not open video: {path}"),
            CliError::Media(MediaError::NoFacesDetected) => "No faces detected in video".to_string(),
            CliError::Media(MediaError::InferenceFailed(detail)) => format!("Prediction error: {detail}"),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_boundary_messages() {
        assert_eq!(CliError::MissingVideo.message(), "No video file provided");
        assert_eq!(CliError::VideoNotFound.message(), "Video file not found");
        assert_eq!(
            CliError::from(MediaError::FileNotFound(PathBuf::from("a.mp4"))).message(),
            "Video file not found"
        );
        assert_eq!(
            CliError::from(MediaError::VideoOpen("clip.avi".into())).message(),
            "Could not open video: clip.avi"
        );
        assert_eq!(
            CliError::from(MediaError::NoFacesDetected).message(),
            "No faces detected in video"
        );
        assert_eq!(
            CliError::from(MediaError::inference_failed("shape mismatch")).message(),
            "Prediction error: shape mismatch"
        );
    }

    #[test]
    fn test_other_media_errors_pass_through() {
        let err = CliError::from(MediaError::FfmpegNotFound);
        assert_eq!(err.message(), "FFmpeg not found in PATH");
    }
}
