//! RAFT optical flow through ONNX Runtime.

use std::path::Path;
use std::sync::Mutex;

use opencv::core::{self, Mat, Scalar, CV_8UC3};
use opencv::prelude::*;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::flow_viz::{flow_to_bgr, FlowField};
use crate::runtime::{load_session, InferenceDevice};
use crate::tensor::{bgr_to_tensor, ChannelOrder, Normalization, TensorLayout};

/// Spatial dimensions RAFT needs to be divisible by.
pub const RAFT_ALIGNMENT: i32 = 8;

/// Symmetric padding that brings a frame to a multiple of 8 in both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPadder {
    pub width: i32,
    pub height: i32,
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl InputPadder {
    pub fn new(width: i32, height: i32) -> Self {
        let pad_w = pad_amount(width);
        let pad_h = pad_amount(height);
        Self {
            width,
            height,
            left: pad_w / 2,
            right: pad_w - pad_w / 2,
            top: pad_h / 2,
            bottom: pad_h - pad_h / 2,
        }
    }

    pub fn padded_size(&self) -> (i32, i32) {
        (
            self.width + self.left + self.right,
            self.height + self.top + self.bottom,
        )
    }

    /// Replicate-pad a frame.
    pub fn pad(&self, frame: &Mat) -> MediaResult<Mat> {
        let mut out = Mat::default();
        core::copy_make_border(
            frame,
            &mut out,
            self.top,
            self.bottom,
            self.left,
            self.right,
            core::BORDER_REPLICATE,
            Scalar::all(0.0),
        )?;
        Ok(out)
    }

    /// Remove the padding from a flow field computed on padded frames.
    pub fn unpad(&self, flow: &FlowField) -> FlowField {
        flow.crop(
            self.left as usize,
            self.top as usize,
            self.width as usize,
            self.height as usize,
        )
    }
}

fn pad_amount(size: i32) -> i32 {
    ((size / RAFT_ALIGNMENT + 1) * RAFT_ALIGNMENT - size) % RAFT_ALIGNMENT
}

/// Dense flow between two consecutive BGR frames of equal size.
pub trait FlowEstimator: Send + Sync {
    fn estimate(&self, first: &Mat, second: &Mat) -> MediaResult<FlowField>;
}

/// RAFT behind an ONNX session.
pub struct RaftFlowEstimator {
    session: Mutex<Session>,
    /// RAFT returns low-res and upsampled flow; the upsampled one is last.
    flow_output: String,
}

impl RaftFlowEstimator {
    pub fn load(model_path: &Path, device: InferenceDevice) -> MediaResult<Self> {
        let session = load_session(model_path, device)?;
        let flow_output = session
            .outputs
            .last()
            .map(|o| o.name.clone())
            .ok_or_else(|| MediaError::inference_failed("RAFT model declares no outputs"))?;
        Ok(Self {
            session: Mutex::new(session),
            flow_output,
        })
    }
}

impl FlowEstimator for RaftFlowEstimator {
    fn estimate(&self, first: &Mat, second: &Mat) -> MediaResult<FlowField> {
        let (w, h) = (first.cols(), first.rows());
        if (second.cols(), second.rows()) != (w, h) {
            return Err(MediaError::inference_failed(format!(
                "frame size mismatch: {}x{} vs {}x{}",
                w,
                h,
                second.cols(),
                second.rows()
            )));
        }

        let padder = InputPadder::new(w, h);
        let image1 = frame_tensor(&padder.pad(first)?)?;
        let image2 = frame_tensor(&padder.pad(second)?)?;
        let (pw, ph) = padder.padded_size();

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::inference_failed("ORT session poisoned"))?;

        let outputs = session
            .run(ort::inputs![image1, image2])
            .map_err(|e| MediaError::inference_failed(format!("ORT run failed: {e}")))?;

        let output = outputs
            .get(self.flow_output.as_str())
            .ok_or_else(|| MediaError::inference_failed("RAFT returned no flow"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference_failed(format!("ORT extract: {e}")))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        let (out_h, out_w) = match dims.as_slice() {
            [1, 2, h, w] | [2, h, w] => (*h as usize, *w as usize),
            _ => {
                return Err(MediaError::inference_failed(format!(
                    "unexpected RAFT output shape: {dims:?}"
                )))
            }
        };
        if (out_w, out_h) != (pw as usize, ph as usize) {
            return Err(MediaError::inference_failed(format!(
                "RAFT output {out_w}x{out_h} does not match padded input {pw}x{ph}"
            )));
        }

        let padded = FlowField::from_planar(data, out_w, out_h)
            .ok_or_else(|| MediaError::inference_failed("RAFT output truncated"))?;

        debug!(width = w, height = h, "RAFT flow estimated");
        Ok(padder.unpad(&padded))
    }
}

/// Render a flow field as a BGR color-wheel image.
pub fn flow_image(flow: &FlowField) -> MediaResult<Mat> {
    let bgr = flow_to_bgr(flow);
    let mut image = Mat::new_rows_cols_with_default(
        flow.height as i32,
        flow.width as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    image.data_bytes_mut()?.copy_from_slice(&bgr);
    Ok(image)
}

/// RGB float `[0, 255]` NCHW.
fn frame_tensor(frame_bgr: &Mat) -> MediaResult<Value> {
    let (w, h) = (frame_bgr.cols() as usize, frame_bgr.rows() as usize);
    let continuous;
    let frame = if frame_bgr.is_continuous() {
        frame_bgr
    } else {
        continuous = frame_bgr.try_clone()?;
        &continuous
    };

    let data = bgr_to_tensor(
        frame.data_bytes()?,
        w,
        h,
        ChannelOrder::Rgb,
        TensorLayout::Nchw,
        Normalization::None,
    );

    Tensor::from_array((vec![1usize, 3, h, w], data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::inference_failed(format!("ORT tensor: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_amounts() {
        assert_eq!(pad_amount(720), 0);
        assert_eq!(pad_amount(721), 7);
        assert_eq!(pad_amount(1277), 3);
    }

    #[test]
    fn test_padder_symmetric() {
        let p = InputPadder::new(1277, 719);
        assert_eq!((p.left, p.right), (1, 2));
        assert_eq!((p.top, p.bottom), (0, 1));
        assert_eq!(p.padded_size(), (1280, 720));
    }

    #[test]
    fn test_padder_aligned_is_noop() {
        let p = InputPadder::new(1280, 720);
        assert_eq!(p.padded_size(), (1280, 720));
        assert_eq!(p.left + p.right + p.top + p.bottom, 0);
    }

    #[test]
    fn test_pad_and_unpad() {
        let p = InputPadder::new(5, 3);
        let frame = Mat::new_rows_cols_with_default(3, 5, CV_8UC3, Scalar::all(9.0)).unwrap();
        let padded = p.pad(&frame).unwrap();
        assert_eq!((padded.cols(), padded.rows()), (8, 8));

        let mut flow = FlowField::zeros(8, 8);
        let idx = p.top as usize * 8 + p.left as usize;
        flow.u[idx] = 3.0;
        let unpadded = p.unpad(&flow);
        assert_eq!((unpadded.width, unpadded.height), (5, 3));
        assert_eq!(unpadded.u[0], 3.0);
    }

    #[test]
    fn test_flow_image_still_field_is_white() {
        let image = flow_image(&FlowField::zeros(4, 3)).unwrap();
        assert_eq!((image.cols(), image.rows()), (4, 3));
        assert!(image.data_bytes().unwrap().iter().all(|&b| b == 255));
    }
}
