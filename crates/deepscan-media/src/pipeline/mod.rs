//! End-to-end pipelines behind the command-line entry points.

pub mod detect;
pub mod fusion;
