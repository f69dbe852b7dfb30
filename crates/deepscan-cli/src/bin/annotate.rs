//! Render a face-mesh overlay with confidence labels to MP4.
//!
//! Usage: deepscan-annotate <input_video> <output_video> <confidence_scores>

use std::process::ExitCode;

use clap::Parser;

use deepscan_cli::{emit_json, fail, init_tracing, is_informational, AnnotateArgs, AnnotateReport, CliResult};
use deepscan_media::annotate_video;
use deepscan_models::ErrorReport;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = match AnnotateArgs::try_parse() {
        Ok(args) => args,
        Err(e) if is_informational(&e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail(&ErrorReport::new(e.to_string().trim())),
    };

    match run(&args).await {
        Ok(report) => emit_json(&report),
        Err(e) => fail(&ErrorReport::new(e.message())),
    }
}

async fn run(args: &AnnotateArgs) -> CliResult<AnnotateReport> {
    let job = args.job()?;
    let config = args.annotate_config();
    let summary = annotate_video(&job.input, &job.output, &job.scores, &config).await?;
    Ok(AnnotateReport::new(&job.output, &summary))
}
