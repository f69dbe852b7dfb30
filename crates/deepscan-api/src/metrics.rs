//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle that renders it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "deepscan_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "deepscan_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "deepscan_http_requests_in_flight";

    // Pipeline metrics
    pub const DETECTIONS_TOTAL: &str = "deepscan_detections_total";
    pub const DETECT_DURATION_SECONDS: &str = "deepscan_detect_duration_seconds";
    pub const ANNOTATE_DURATION_SECONDS: &str = "deepscan_annotate_duration_seconds";
    pub const PIPELINE_FAILURES_TOTAL: &str = "deepscan_pipeline_failures_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route_label(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished detection.
pub fn record_detection(prediction: &str, duration_secs: f64) {
    let labels = [("prediction", prediction.to_string())];
    counter!(names::DETECTIONS_TOTAL, &labels).increment(1);
    histogram!(names::DETECT_DURATION_SECONDS).record(duration_secs);
}

/// Record a finished annotation render.
pub fn record_annotation(duration_secs: f64) {
    histogram!(names::ANNOTATE_DURATION_SECONDS).record(duration_secs);
}

/// Record a failed pipeline stage (`detect` or `annotate`).
pub fn record_pipeline_failure(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::PIPELINE_FAILURES_TOTAL, &labels).increment(1);
}

/// Collapse file names under `/uploads` so the label set stays bounded.
fn route_label(path: &str) -> String {
    if path.starts_with("/uploads/") {
        "/uploads/:file".to_string()
    } else {
        path.to_string()
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_label() {
        assert_eq!(route_label("/uploads/processed_1-clip.mp4"), "/uploads/:file");
        assert_eq!(route_label("/api/detect"), "/api/detect");
        assert_eq!(route_label("/uploads"), "/uploads");
    }
}
