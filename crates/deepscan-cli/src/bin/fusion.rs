//! Classify a video by fusing RGB and optical-flow classifiers.
//!
//! Usage: deepscan-fusion --path <video> [options]

use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use deepscan_cli::{emit_json, fail, init_tracing, is_informational, require_video, FusionArgs};
use deepscan_media::run_fusion;
use deepscan_models::ErrorReport;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = match FusionArgs::try_parse() {
        Ok(args) => args,
        Err(e) if is_informational(&e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail(&ErrorReport::unknown_outcome(e.to_string().trim())),
    };

    let video = match require_video(args.path.clone()) {
        Ok(video) => video,
        Err(e) => return fail(&ErrorReport::unknown_outcome(e.message())),
    };

    let config = args.fusion_config();
    info!(
        video = %video.display(),
        weighting = ?config.weighting,
        threshold = config.threshold,
        device = %config.device,
        "Starting fusion"
    );

    match run_fusion(&video, &config) {
        Ok(result) => emit_json(&result),
        Err(e) => fail(&e.report()),
    }
}
