//! Application state.

use std::sync::Arc;

use crate::analyzer::{PipelineAnalyzer, VideoAnalyzer};
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub analyzer: Arc<dyn VideoAnalyzer>,
}

impl AppState {
    /// State backed by the ONNX/OpenCV pipelines.
    pub fn new(config: ApiConfig) -> Self {
        let analyzer = PipelineAnalyzer::new(config.detect.clone(), config.annotate.clone());
        Self::with_analyzer(config, Arc::new(analyzer))
    }

    pub fn with_analyzer(config: ApiConfig, analyzer: Arc<dyn VideoAnalyzer>) -> Self {
        Self {
            config: Arc::new(config),
            analyzer,
        }
    }
}
