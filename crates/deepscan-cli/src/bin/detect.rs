//! Classify a video as Real or Fake from its faces.
//!
//! Usage: deepscan-detect <video_path> [options]

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use deepscan_cli::{emit_json, fail, init_tracing, is_informational, require_video, CliResult, DetectArgs};
use deepscan_media::detect_video;
use deepscan_models::{DetectionResult, ErrorReport};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = match DetectArgs::try_parse() {
        Ok(args) => args,
        Err(e) if is_informational(&e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail(&ErrorReport::new(e.to_string().trim())),
    };

    match run(&args) {
        Ok(result) => emit_json(&result),
        Err(e) => fail(&ErrorReport::new(e.message())),
    }
}

fn run(args: &DetectArgs) -> CliResult<DetectionResult> {
    let video = require_video(args.video.clone())?;
    let config = args.detect_config();
    info!(
        video = %video.display(),
        model = %config.model_path.display(),
        detector = %config.detector,
        device = %config.device,
        "Starting detection"
    );
    Ok(detect_video(&video, &config)?)
}
