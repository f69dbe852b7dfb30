//! Binary real/fake classifiers backed by ONNX Runtime.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use opencv::core::{self, Mat, Rect, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;
use ort::session::Session;
use ort::value::{Tensor, Value};

use crate::error::{MediaError, MediaResult};
use crate::runtime::{load_session, InferenceDevice};
use crate::tensor::{
    apply_activation, bgr_to_tensor, center_crop_plan, ClassifierSpec, OutputActivation, ResizeMode,
};

/// Scores a BGR image with the probability that it is fake.
pub trait FrameClassifier: Send + Sync {
    fn score(&self, image_bgr: &Mat) -> MediaResult<f64>;
}

/// ONNX classifier with a single image input and a single scalar output.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    spec: ClassifierSpec,
    model_path: PathBuf,
}

impl OnnxClassifier {
    pub fn load(model_path: &Path, spec: ClassifierSpec, device: InferenceDevice) -> MediaResult<Self> {
        let session = load_session(model_path, device)?;
        Ok(Self {
            session: Mutex::new(session),
            spec,
            model_path: model_path.to_path_buf(),
        })
    }

    pub fn spec(&self) -> &ClassifierSpec {
        &self.spec
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn input_tensor(&self, image_bgr: &Mat) -> MediaResult<Value> {
        let prepared = prepare_image(image_bgr, &self.spec)?;
        let bytes = prepared.data_bytes()?;
        let data = bgr_to_tensor(
            bytes,
            self.spec.width as usize,
            self.spec.height as usize,
            self.spec.channels,
            self.spec.layout,
            self.spec.normalization,
        );

        Tensor::from_array((self.spec.input_shape(), data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::inference_failed(format!("ORT tensor: {e}")))
    }
}

impl FrameClassifier for OnnxClassifier {
    fn score(&self, image_bgr: &Mat) -> MediaResult<f64> {
        let tensor = self.input_tensor(image_bgr)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::inference_failed("ORT session poisoned"))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| MediaError::inference_failed("model declares no outputs"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| MediaError::inference_failed(format!("ORT run failed: {e}")))?;

        let output = outputs
            .get(output_name.as_str())
            .ok_or_else(|| MediaError::inference_failed("ORT returned no outputs"))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference_failed(format!("ORT extract: {e}")))?;

        let raw = data
            .first()
            .copied()
            .ok_or_else(|| MediaError::inference_failed("empty model output"))?;

        output_probability(raw, self.spec.activation)
    }
}

/// Probability of "fake" from the raw model output.
pub fn output_probability(raw: f32, activation: OutputActivation) -> MediaResult<f64> {
    if !raw.is_finite() {
        return Err(MediaError::inference_failed(format!("model output is {raw}")));
    }
    Ok(apply_activation(raw, activation).clamp(0.0, 1.0))
}

/// Bring an image to the model's input size as a continuous 8-bit BGR Mat.
pub fn prepare_image(image_bgr: &Mat, spec: &ClassifierSpec) -> MediaResult<Mat> {
    if image_bgr.empty() {
        return Err(MediaError::inference_failed("empty image"));
    }

    let bgr = ensure_bgr(image_bgr)?;

    match spec.resize {
        ResizeMode::Stretch => {
            let mut resized = Mat::default();
            imgproc::resize(
                &bgr,
                &mut resized,
                Size::new(spec.width, spec.height),
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            Ok(resized)
        }
        ResizeMode::CenterCrop => {
            let plan = center_crop_plan(bgr.cols(), bgr.rows(), spec.width, spec.height);
            let window =
                Mat::roi(&bgr, Rect::new(plan.src_x, plan.src_y, plan.width, plan.height))?.try_clone()?;
            let mut padded = Mat::default();
            core::copy_make_border(
                &window,
                &mut padded,
                plan.pad_top,
                plan.pad_bottom,
                plan.pad_left,
                plan.pad_right,
                core::BORDER_CONSTANT,
                Scalar::all(0.0),
            )?;
            Ok(padded)
        }
    }
}

fn ensure_bgr(image: &Mat) -> MediaResult<Mat> {
    let mut out = Mat::default();
    match image.channels() {
        3 => return Ok(image.try_clone()?),
        1 => imgproc::cvt_color_def(image, &mut out, imgproc::COLOR_GRAY2BGR)?,
        4 => imgproc::cvt_color_def(image, &mut out, imgproc::COLOR_BGRA2BGR)?,
        n => {
            return Err(MediaError::inference_failed(format!(
                "unsupported channel count: {n}"
            )))
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::CV_8UC3;

    #[test]
    fn test_prepare_stretch() {
        let img = Mat::new_rows_cols_with_default(50, 80, CV_8UC3, Scalar::new(1.0, 2.0, 3.0, 0.0)).unwrap();
        let out = prepare_image(&img, &ClassifierSpec::face_crop()).unwrap();
        assert_eq!((out.cols(), out.rows()), (128, 128));
        assert_eq!(out.data_bytes().unwrap().len(), 128 * 128 * 3);
    }

    #[test]
    fn test_prepare_center_crop_pads() {
        let img = Mat::new_rows_cols_with_default(100, 600, CV_8UC3, Scalar::all(200.0)).unwrap();
        let out = prepare_image(&img, &ClassifierSpec::full_frame(true)).unwrap();
        assert_eq!((out.cols(), out.rows()), (448, 448));

        let bytes = out.data_bytes().unwrap();
        // Top-left pixel is padding, center pixel is image content.
        assert_eq!(bytes[0], 0);
        let center = (224 * 448 + 224) * 3;
        assert_eq!(bytes[center], 200);
    }

    #[test]
    fn test_prepare_rejects_empty() {
        assert!(prepare_image(&Mat::default(), &ClassifierSpec::face_crop()).is_err());
    }

    #[test]
    fn test_output_probability() {
        assert_eq!(output_probability(0.25, OutputActivation::Probability).unwrap(), 0.25);
        assert_eq!(output_probability(1.5, OutputActivation::Probability).unwrap(), 1.0);
        assert_eq!(output_probability(0.0, OutputActivation::Logit).unwrap(), 0.5);
    }

    #[test]
    fn test_output_probability_rejects_non_finite() {
        for raw in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            for activation in [OutputActivation::Probability, OutputActivation::Logit] {
                assert!(matches!(
                    output_probability(raw, activation),
                    Err(MediaError::InferenceFailed(_))
                ));
            }
        }
    }

    #[test]
    fn test_missing_model() {
        let result = OnnxClassifier::load(
            Path::new("/nonexistent/classifier.onnx"),
            ClassifierSpec::face_crop(),
            InferenceDevice::Cpu,
        );
        assert!(matches!(result, Err(MediaError::ModelNotFound(_))));
    }
}
