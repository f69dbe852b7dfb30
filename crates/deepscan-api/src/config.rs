//! API configuration.

use std::path::PathBuf;
use std::str::FromStr;

use deepscan_media::{AnnotateConfig, DetectConfig, DetectorKind, InferenceDevice};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Stored uploads and processed videos
    pub upload_dir: PathBuf,
    /// Prefix of `processed_video_url`
    pub public_base_url: String,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    pub metrics_enabled: bool,
    pub detect: DetectConfig,
    pub annotate: AnnotateConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            public_base_url: "http://localhost:5000".to_string(),
            cors_origins: vec!["*".to_string()],
            max_body_size: 512 * 1024 * 1024, // 512MB
            metrics_enabled: true,
            detect: DetectConfig::default(),
            annotate: AnnotateConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("API_PORT")
            .or_else(|| env_parse("PORT"))
            .unwrap_or(defaults.port);

        let mut detect = defaults.detect;
        let mut annotate = defaults.annotate;

        if let Ok(model) = std::env::var("DEEPSCAN_MODEL") {
            detect.model_path = PathBuf::from(model);
        }
        if let Some(kind) = env_parse::<DetectorKind>("DEEPSCAN_DETECTOR") {
            detect.detector = kind;
            annotate.detector = kind;
        }
        if let Ok(path) = std::env::var("DEEPSCAN_CASCADE") {
            detect.detector_model = Some(PathBuf::from(&path));
            annotate.detector_model = Some(PathBuf::from(path));
        }
        if let Ok(model) = std::env::var("DEEPSCAN_FACE_MESH_MODEL") {
            annotate.face_mesh_model = PathBuf::from(model);
        }
        if let Some(device) = env_parse::<InferenceDevice>("DEEPSCAN_DEVICE") {
            detect.device = device;
            annotate.device = device;
        }

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            detect,
            annotate,
        }
    }

    /// Public URL of a file in the upload directory.
    pub fn upload_url(&self, file_name: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url.trim_end_matches('/'), file_name)
    }
}
