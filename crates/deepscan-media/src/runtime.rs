//! ONNX Runtime session loading.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};

/// Where inference runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceDevice {
    #[default]
    Cpu,
    Cuda,
}

impl fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceDevice::Cpu => f.write_str("cpu"),
            InferenceDevice::Cuda => f.write_str("cuda"),
        }
    }
}

impl FromStr for InferenceDevice {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(MediaError::invalid_config(format!(
                "unknown device '{other}' (expected cpu or cuda)"
            ))),
        }
    }
}

/// Load an ONNX model into a session for the requested device.
pub fn load_session(model_path: &Path, device: InferenceDevice) -> MediaResult<Session> {
    if !model_path.exists() {
        return Err(MediaError::model_not_found(model_path));
    }

    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::inference_failed(format!("ORT read model file: {e}")))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::inference_failed(format!("ORT session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::inference_failed(format!("ORT opt level: {e}")))?;

    let builder = match device {
        InferenceDevice::Cpu => builder,
        #[cfg(feature = "cuda")]
        InferenceDevice::Cuda => builder
            .with_execution_providers([ort::execution_providers::CUDAExecutionProvider::default().build()])
            .map_err(|e| MediaError::inference_failed(format!("ORT CUDA provider: {e}")))?,
        #[cfg(not(feature = "cuda"))]
        InferenceDevice::Cuda => {
            warn!("CUDA requested but the cuda feature is not enabled; running on CPU");
            builder
        }
    };

    let session = builder
        .commit_from_memory(model_bytes.as_slice())
        .map_err(|e| MediaError::inference_failed(format!("ORT load model {}: {e}", model_path.display())))?;

    info!(model = %model_path.display(), %device, "ONNX model loaded");
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<InferenceDevice>().unwrap(), InferenceDevice::Cpu);
        assert_eq!("CUDA".parse::<InferenceDevice>().unwrap(), InferenceDevice::Cuda);
        assert!("tpu".parse::<InferenceDevice>().is_err());
        assert_eq!(InferenceDevice::default().to_string(), "cpu");
    }

    #[test]
    fn test_missing_model() {
        let result = load_session(Path::new("/nonexistent/model.onnx"), InferenceDevice::Cpu);
        assert!(matches!(result, Err(MediaError::ModelNotFound(_))));
    }
}
