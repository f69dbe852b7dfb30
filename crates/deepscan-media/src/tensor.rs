//! Pixel-to-tensor conversion shared by every ONNX model.
//!
//! Frames arrive from OpenCV as interleaved BGR bytes. Each model declares how
//! it wants them laid out through a [`ClassifierSpec`].

use serde::{Deserialize, Serialize};

/// ImageNet channel means (RGB order).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations (RGB order).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Memory layout of the input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, C]` (Keras exports)
    Nhwc,
    /// `[1, C, H, W]` (PyTorch exports)
    Nchw,
}

/// Channel order fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Bgr,
    Rgb,
}

/// Value scaling applied after channel reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Raw byte values `[0, 255]`
    None,
    /// `[0, 1]`
    UnitRange,
    /// `[-1, 1]`
    SignedUnit,
    /// `[0, 1]` followed by ImageNet mean/std (expects RGB)
    ImageNet,
}

/// How the raw model output maps to a probability of "fake".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputActivation {
    /// Output is already a probability (sigmoid inside the graph)
    Probability,
    /// Output is a logit; apply a sigmoid
    Logit,
}

/// How an image is brought to the model's input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Resize ignoring aspect ratio
    Stretch,
    /// Take the centered window, zero-padding when the image is smaller
    CenterCrop,
}

/// Input contract of a classifier model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub width: i32,
    pub height: i32,
    pub layout: TensorLayout,
    pub channels: ChannelOrder,
    pub normalization: Normalization,
    pub activation: OutputActivation,
    pub resize: ResizeMode,
}

impl ClassifierSpec {
    /// Face-crop classifier: 128×128 BGR in `[0, 1]`, NHWC, probability output.
    pub fn face_crop() -> Self {
        Self {
            width: 128,
            height: 128,
            layout: TensorLayout::Nhwc,
            channels: ChannelOrder::Bgr,
            normalization: Normalization::UnitRange,
            activation: OutputActivation::Probability,
            resize: ResizeMode::Stretch,
        }
    }

    /// Full-frame ResNet classifier: 448×448 center crop, RGB, NCHW, logit output.
    pub fn full_frame(aug_norm: bool) -> Self {
        Self {
            width: 448,
            height: 448,
            layout: TensorLayout::Nchw,
            channels: ChannelOrder::Rgb,
            normalization: if aug_norm {
                Normalization::ImageNet
            } else {
                Normalization::UnitRange
            },
            activation: OutputActivation::Logit,
            resize: ResizeMode::CenterCrop,
        }
    }

    /// Set a square input size.
    pub fn with_size(mut self, size: i32) -> Self {
        self.width = size;
        self.height = size;
        self
    }

    /// Tensor shape for a batch of one.
    pub fn input_shape(&self) -> Vec<usize> {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            TensorLayout::Nhwc => vec![1, h, w, 3],
            TensorLayout::Nchw => vec![1, 3, h, w],
        }
    }
}

/// Numerically stable logistic function.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Map a raw model output to a probability.
pub fn apply_activation(raw: f32, activation: OutputActivation) -> f64 {
    match activation {
        OutputActivation::Probability => raw as f64,
        OutputActivation::Logit => sigmoid(raw as f64),
    }
}

/// Convert interleaved BGR bytes (`width * height * 3`) into a tensor buffer.
pub fn bgr_to_tensor(
    bgr: &[u8],
    width: usize,
    height: usize,
    channels: ChannelOrder,
    layout: TensorLayout,
    normalization: Normalization,
) -> Vec<f32> {
    let plane = width * height;
    let mut out = vec![0.0f32; plane * 3];

    for p in 0..plane.min(bgr.len() / 3) {
        let px = &bgr[p * 3..p * 3 + 3];
        // Index in RGB order regardless of requested output order.
        let rgb = [px[2], px[1], px[0]];

        for c in 0..3 {
            let source_rgb_index = match channels {
                ChannelOrder::Rgb => c,
                ChannelOrder::Bgr => 2 - c,
            };
            let value = normalize(rgb[source_rgb_index], source_rgb_index, normalization);
            let idx = match layout {
                TensorLayout::Nhwc => p * 3 + c,
                TensorLayout::Nchw => c * plane + p,
            };
            out[idx] = value;
        }
    }

    out
}

#[inline]
fn normalize(byte: u8, rgb_channel: usize, normalization: Normalization) -> f32 {
    let v = byte as f32;
    match normalization {
        Normalization::None => v,
        Normalization::UnitRange => v / 255.0,
        Normalization::SignedUnit => v / 255.0 * 2.0 - 1.0,
        Normalization::ImageNet => (v / 255.0 - IMAGENET_MEAN[rgb_channel]) / IMAGENET_STD[rgb_channel],
    }
}

/// Placement of a centered crop window relative to the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    /// Source window
    pub src_x: i32,
    pub src_y: i32,
    pub width: i32,
    pub height: i32,
    /// Zero padding added around the window to reach the crop size
    pub pad_left: i32,
    pub pad_top: i32,
    pub pad_right: i32,
    pub pad_bottom: i32,
}

/// Plan a centered `crop_w × crop_h` window over a `src_w × src_h` image.
pub fn center_crop_plan(src_w: i32, src_h: i32, crop_w: i32, crop_h: i32) -> CropPlan {
    let (src_x, width, pad_left, pad_right) = center_axis(src_w, crop_w);
    let (src_y, height, pad_top, pad_bottom) = center_axis(src_h, crop_h);
    CropPlan {
        src_x,
        src_y,
        width,
        height,
        pad_left,
        pad_top,
        pad_right,
        pad_bottom,
    }
}

fn center_axis(size: i32, crop: i32) -> (i32, i32, i32, i32) {
    if size >= crop {
        // Half-pixel offsets round to even.
        let offset = ((size - crop) as f64 / 2.0).round_ties_even() as i32;
        (offset, crop, 0, 0)
    } else {
        let before = (crop - size) / 2;
        (0, size, before, crop - size - before)
    }
}
