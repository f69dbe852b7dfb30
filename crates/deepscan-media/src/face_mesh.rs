//! MediaPipe Face Mesh ONNX inference for annotation overlays.
//!
//! Notes:
//! - OpenCV delivers frames as BGR; they are converted to RGB in `[-1, 1]`.
//! - Coordinates are mapped back to frame space with a center-based transform
//!   so clamped crops do not drift.
//! - Some exports emit landmarks in 192-pixel input units, others normalized.
//!   Both are accepted.

use std::path::Path;
use std::sync::Mutex;

use opencv::core::{Mat, Point2f, Rect, Size, Vec6f, Vector};
use opencv::imgproc;
use opencv::prelude::*;
use ort::session::Session;
use ort::value::{Tensor, Value};

use crate::detector::FaceBox;
use crate::error::{MediaError, MediaResult};
use crate::runtime::{load_session, InferenceDevice};
use crate::tensor::{bgr_to_tensor, ChannelOrder, Normalization, TensorLayout};

/// Model input edge in pixels.
pub const FACE_MESH_INPUT_SIZE: i32 = 192;

/// Landmarks in the base mesh (refined models add iris points after these).
pub const FACE_MESH_POINTS: usize = 468;

/// Crop padding around the detector box.
const CROP_PAD_RATIO: f32 = 0.25;

/// Single face landmark in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

pub const FACE_OVAL: &[usize] = &[
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109, 10,
];
pub const LIPS_OUTER_LOWER: &[usize] = &[61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291];
pub const LIPS_OUTER_UPPER: &[usize] = &[61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291];
pub const LIPS_INNER_LOWER: &[usize] = &[78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308];
pub const LIPS_INNER_UPPER: &[usize] = &[78, 191, 80, 81, 82, 13, 312, 311, 310, 415, 308];
pub const LEFT_EYE_LOWER: &[usize] = &[263, 249, 390, 373, 374, 380, 381, 382, 362];
pub const LEFT_EYE_UPPER: &[usize] = &[263, 466, 388, 387, 386, 385, 384, 398, 362];
pub const RIGHT_EYE_LOWER: &[usize] = &[33, 7, 163, 144, 145, 153, 154, 155, 133];
pub const RIGHT_EYE_UPPER: &[usize] = &[33, 246, 161, 160, 159, 158, 157, 173, 133];
pub const LEFT_EYEBROW_LOWER: &[usize] = &[276, 283, 282, 295, 285];
pub const LEFT_EYEBROW_UPPER: &[usize] = &[300, 293, 334, 296, 336];
pub const RIGHT_EYEBROW_LOWER: &[usize] = &[46, 53, 52, 65, 55];
pub const RIGHT_EYEBROW_UPPER: &[usize] = &[70, 63, 105, 66, 107];

/// Polylines drawn over a face.
pub const FACE_CONTOURS: &[&[usize]] = &[
    FACE_OVAL,
    LIPS_OUTER_LOWER,
    LIPS_OUTER_UPPER,
    LIPS_INNER_LOWER,
    LIPS_INNER_UPPER,
    LEFT_EYE_LOWER,
    LEFT_EYE_UPPER,
    RIGHT_EYE_LOWER,
    RIGHT_EYE_UPPER,
    LEFT_EYEBROW_LOWER,
    LEFT_EYEBROW_UPPER,
    RIGHT_EYEBROW_LOWER,
    RIGHT_EYEBROW_UPPER,
];

/// ONNX Runtime wrapper for the MediaPipe Face Mesh model.
pub struct FaceMeshDetector {
    session: Mutex<Session>,
    output_names: Vec<String>,
}

impl FaceMeshDetector {
    pub fn load(model_path: &Path, device: InferenceDevice) -> MediaResult<Self> {
        let session = load_session(model_path, device)?;
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();
        Ok(Self {
            session: Mutex::new(session),
            output_names,
        })
    }

    /// Run the mesh on one detected face of a BGR frame.
    pub fn detect(&self, frame_bgr: &Mat, face: &FaceBox) -> MediaResult<Vec<FaceLandmark>> {
        let crop = square_crop(face, frame_bgr.cols(), frame_bgr.rows(), CROP_PAD_RATIO)
            .ok_or_else(|| MediaError::detection_failed("ROI too small for face mesh"))?;

        let roi = Mat::roi(frame_bgr, crop)?;
        let mut resized = Mat::default();
        imgproc::resize(
            &roi,
            &mut resized,
            Size::new(FACE_MESH_INPUT_SIZE, FACE_MESH_INPUT_SIZE),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let side = FACE_MESH_INPUT_SIZE as usize;
        let data = bgr_to_tensor(
            resized.data_bytes()?,
            side,
            side,
            ChannelOrder::Rgb,
            TensorLayout::Nchw,
            Normalization::SignedUnit,
        );
        let tensor = Tensor::from_array((vec![1usize, 3, side, side], data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::inference_failed(format!("ORT tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::inference_failed("ORT session poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| MediaError::inference_failed(format!("ORT run failed: {e}")))?;

        // The mesh output is the first one large enough to hold every point.
        for name in &self.output_names {
            let Some(output) = outputs.get(name.as_str()) else {
                continue;
            };
            let Ok((_, data)) = output.try_extract_tensor::<f32>() else {
                continue;
            };
            if let Some(landmarks) = landmarks_from_output(data, &crop) {
                return Ok(landmarks);
            }
        }

        Err(MediaError::inference_failed(
            "face mesh model produced no landmark tensor",
        ))
    }
}

/// Expand the face box by `pad_ratio`, square it and clamp to the frame.
pub fn square_crop(face: &FaceBox, frame_w: i32, frame_h: i32, pad_ratio: f32) -> Option<Rect> {
    let w = face.width as f32;
    let h = face.height as f32;
    let size = w.max(h) * (1.0 + pad_ratio);

    let center_x = face.x as f32 + w / 2.0;
    let center_y = face.y as f32 + h / 2.0;

    let mut x = center_x - size / 2.0;
    let mut y = center_y - size / 2.0;
    let mut s = size;

    if x < 0.0 {
        s += x;
        x = 0.0;
    }
    if y < 0.0 {
        s += y;
        y = 0.0;
    }
    if x + s > frame_w as f32 {
        s = frame_w as f32 - x;
    }
    if y + s > frame_h as f32 {
        s = frame_h as f32 - y;
    }

    if s < 8.0 {
        return None;
    }

    let (xi, yi) = (x.round() as i32, y.round() as i32);
    let si = (s.round() as i32).min(frame_w - xi).min(frame_h - yi);
    Some(Rect::new(xi, yi, si, si))
}

/// Center-based mapping from normalized crop coords to frame coords.
#[inline]
pub fn map_normalized_to_frame(nx: f32, ny: f32, crop: &Rect) -> (f32, f32) {
    let center_x = crop.x as f32 + crop.width as f32 / 2.0;
    let center_y = crop.y as f32 + crop.height as f32 / 2.0;
    let box_w = crop.width as f32;
    (center_x + (nx - 0.5) * box_w, center_y + (ny - 0.5) * box_w)
}

/// Interpret a flat `[x, y, z]*` buffer as landmarks. `None` when the buffer
/// is too small to be the mesh.
pub fn landmarks_from_output(data: &[f32], crop: &Rect) -> Option<Vec<FaceLandmark>> {
    if data.len() < FACE_MESH_POINTS * 3 || data.len() % 3 != 0 {
        return None;
    }

    let points = data.len() / 3;
    let max_xy = data
        .chunks_exact(3)
        .flat_map(|p| [p[0].abs(), p[1].abs()])
        .fold(0.0f32, f32::max);
    let scale = if max_xy > 2.0 {
        FACE_MESH_INPUT_SIZE as f32
    } else {
        1.0
    };

    let landmarks = (0..points)
        .map(|i| {
            let base = i * 3;
            let (x, y) = map_normalized_to_frame(data[base] / scale, data[base + 1] / scale, crop);
            FaceLandmark {
                x,
                y,
                z: data[base + 2],
            }
        })
        .collect();
    Some(landmarks)
}

/// Delaunay triangles over the landmarks that lie inside a `width × height` frame.
pub fn tesselate(landmarks: &[FaceLandmark], width: i32, height: i32) -> MediaResult<Vec<[Point2f; 3]>> {
    let inside: Vec<Point2f> = landmarks
        .iter()
        .filter(|lm| lm.x >= 0.0 && lm.y >= 0.0 && lm.x < width as f32 && lm.y < height as f32)
        .map(|lm| Point2f::new(lm.x, lm.y))
        .collect();
    if inside.len() < 3 {
        return Ok(Vec::new());
    }

    let mut subdiv = imgproc::Subdiv2D::new(Rect::new(0, 0, width, height))?;
    for point in inside {
        subdiv.insert(point)?;
    }

    let mut triangles = Vector::<Vec6f>::new();
    subdiv.get_triangle_list(&mut triangles)?;
    Ok(triangles
        .iter()
        .map(|t| {
            [
                Point2f::new(t[0], t[1]),
                Point2f::new(t[2], t[3]),
                Point2f::new(t[4], t[5]),
            ]
        })
        .collect())
}
