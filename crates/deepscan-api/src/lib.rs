//! Axum upload server.
//!
//! This crate provides:
//! - `POST /api/detect`: store an uploaded video, classify it and render
//!   the face-mesh overlay
//! - Static serving of stored and processed videos under `/uploads`
//! - Health and Prometheus metrics endpoints

pub mod analyzer;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use analyzer::{PipelineAnalyzer, VideoAnalyzer};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
