//! Detection and annotation behind the upload handler.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use deepscan_media::{
    annotate_video, detect_video, AnnotateConfig, AnnotateSummary, DetectConfig, MediaError,
    MediaResult,
};
use deepscan_models::DetectionResult;

/// The two pipeline stages a detect request runs.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Classify a stored upload.
    async fn detect(&self, video: &Path) -> MediaResult<DetectionResult>;

    /// Render the face-mesh overlay for `input` into `output`.
    async fn annotate(
        &self,
        input: &Path,
        output: &Path,
        scores: &[f64],
    ) -> MediaResult<AnnotateSummary>;
}

/// Runs the media pipelines with the server's configuration.
pub struct PipelineAnalyzer {
    detect: DetectConfig,
    annotate: AnnotateConfig,
}

impl PipelineAnalyzer {
    pub fn new(detect: DetectConfig, annotate: AnnotateConfig) -> Self {
        Self { detect, annotate }
    }
}

#[async_trait]
impl VideoAnalyzer for PipelineAnalyzer {
    async fn detect(&self, video: &Path) -> MediaResult<DetectionResult> {
        let config = self.detect.clone();
        let video: PathBuf = video.to_path_buf();
        tokio::task::spawn_blocking(move || detect_video(&video, &config))
            .await
            .map_err(|e| MediaError::Internal(format!("detection task failed: {e}")))?
    }

    async fn annotate(
        &self,
        input: &Path,
        output: &Path,
        scores: &[f64],
    ) -> MediaResult<AnnotateSummary> {
        annotate_video(input, output, scores, &self.annotate).await
    }
}
