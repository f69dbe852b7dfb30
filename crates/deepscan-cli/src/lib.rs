//! Shared plumbing for the DeepScan binaries.
//!
//! Each binary parses its arguments, runs one pipeline and prints a single
//! JSON object on stdout. Logs go to stderr.

pub mod args;
pub mod error;
pub mod logging;
pub mod output;

pub use args::{is_informational, require_video, AnnotateArgs, AnnotateJob, DetectArgs, DetectorArg, DeviceArg, FusionArgs};
pub use error::{CliError, CliResult};
pub use logging::init_tracing;
pub use output::{emit_json, fail, AnnotateReport};
