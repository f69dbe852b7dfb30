//! Upload, classify and annotate a video.

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use deepscan_models::DetectionResult;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

const DEFAULT_UPLOAD_NAME: &str = "upload.mp4";

/// Detection result plus the URL of the annotated video.
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    #[serde(flatten)]
    pub result: DetectionResult,
    pub processed_video_url: String,
}

/// A video written to the upload directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub file_name: String,
    pub path: PathBuf,
}

/// Keep the last path component and replace anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `<unix_millis>-<sanitised name>`.
pub fn stored_file_name(original: Option<&str>, unix_millis: i64) -> String {
    let name = original.map(sanitize_file_name).unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
    format!("{unix_millis}-{name}")
}

/// POST /api/detect
pub async fn detect(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "Request is not a multipart upload");
        ApiError::NoFileUploaded
    })?;

    let upload = receive_video(&mut multipart, &state.config.upload_dir).await?;
    info!(file = %upload.file_name, "Video uploaded");

    let started = Instant::now();
    let result = state.analyzer.detect(&upload.path).await.map_err(|e| {
        metrics::record_pipeline_failure("detect");
        ApiError::Detection(e.to_string())
    })?;
    metrics::record_detection(result.prediction.as_str(), started.elapsed().as_secs_f64());

    let processed_name = format!("processed_{}", upload.file_name);
    let processed_path = state.config.upload_dir.join(&processed_name);

    let started = Instant::now();
    state
        .analyzer
        .annotate(&upload.path, &processed_path, &result.confidence_scores)
        .await
        .map_err(|e| {
            metrics::record_pipeline_failure("annotate");
            ApiError::Annotation(e.to_string())
        })?;
    metrics::record_annotation(started.elapsed().as_secs_f64());

    info!(
        file = %upload.file_name,
        prediction = %result.prediction,
        confidence = result.confidence,
        "Detection request finished"
    );

    Ok(Json(DetectResponse {
        processed_video_url: state.config.upload_url(&processed_name),
        result,
    }))
}

/// Store the first `video` field; other fields are ignored.
async fn receive_video(multipart: &mut Multipart, upload_dir: &Path) -> ApiResult<StoredUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let file_name = stored_file_name(field.file_name(), Utc::now().timestamp_millis());
        let path = upload_dir.join(&file_name);
        save_field(field, upload_dir, &path).await?;
        return Ok(StoredUpload { file_name, path });
    }

    Err(ApiError::NoFileUploaded)
}

async fn save_field(mut field: Field<'_>, upload_dir: &Path, path: &Path) -> ApiResult<()> {
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("create {}: {e}", upload_dir.display())))?;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("create {}: {e}", path.display())))?;

    let mut written = 0usize;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(path).await;
                return Err(ApiError::bad_request(e.body_text()));
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("write {}: {e}", path.display())))?;
        written += chunk.len();
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("flush {}: {e}", path.display())))?;

    debug!(path = %path.display(), bytes = written, "Upload stored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepscan_models::Prediction;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("my video (1).mp4"), "my_video__1_.mp4");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\clip.mov"), "clip.mov");
        assert_eq!(sanitize_file_name("..."), DEFAULT_UPLOAD_NAME);
        assert_eq!(sanitize_file_name(""), DEFAULT_UPLOAD_NAME);
    }

    #[test]
    fn test_response_flattens_result() {
        let response = DetectResponse {
            result: DetectionResult {
                video: "1-clip.mp4".to_string(),
                prediction: Prediction::Fake,
                confidence: 0.8,
                confidence_scores: vec![0.7, 0.9],
                face_stats: None,
            },
            processed_video_url: "http://localhost:5000/uploads/processed_1-clip.mp4".to_string(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "video": "1-clip.mp4",
                "prediction": "Fake",
                "confidence": 0.8,
                "confidence_scores": [0.7, 0.9],
                "processed_video_url": "http://localhost:5000/uploads/processed_1-clip.mp4"
            })
        );
    }

    #[test]
    fn test_stored_file_name() {
        assert_eq!(
            stored_file_name(Some("clip.mp4"), 1_700_000_000_000),
            "1700000000000-clip.mp4"
        );
        assert_eq!(stored_file_name(None, 5), "5-upload.mp4");
    }
}
