//! JSON output at the process boundary.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use deepscan_media::AnnotateSummary;
use deepscan_models::ErrorReport;
use serde::Serialize;
use tracing::error;

/// Summary printed by the annotation binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotateReport {
    pub output: String,
    pub frames: u64,
    pub faces_annotated: u64,
    pub fps: u32,
}

impl AnnotateReport {
    pub fn new(output: &Path, summary: &AnnotateSummary) -> Self {
        Self {
            output: output.to_string_lossy().into_owned(),
            frames: summary.frames,
            faces_annotated: summary.faces_annotated,
            fps: summary.fps,
        }
    }
}

/// Print one JSON line on stdout.
pub fn emit_json<T: Serialize>(value: &T) -> ExitCode {
    let line = match serde_json::to_string(value) {
        Ok(line) => line,
        Err(e) => {
            error!(error = %e, "Failed to serialize result");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{line}").and_then(|_| stdout.flush()).is_err() {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Print an error record and return exit code 1.
pub fn fail(report: &ErrorReport) -> ExitCode {
    error!(error = %report.error, "Run failed");
    let _ = emit_json(report);
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_annotate_report_shape() {
        let summary = AnnotateSummary {
            frames: 120,
            faces_annotated: 118,
            fps: 30,
        };
        let report = AnnotateReport::new(Path::new("uploads/processed_clip.mp4"), &summary);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "output": "uploads/processed_clip.mp4",
                "frames": 120,
                "faces_annotated": 118,
                "fps": 30
            })
        );
    }
}
