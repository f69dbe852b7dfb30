//! Face-mesh annotation rendered to MP4.
//!
//! Every frame is decoded, overlaid with the face mesh and the current
//! confidence label, written as a numbered PNG, then encoded with FFmpeg.

use std::path::{Path, PathBuf};
use std::time::Instant;

use opencv::core::{Mat, Point, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::detector::{create_detector, largest_faces, DetectorKind};
use crate::error::{MediaError, MediaResult};
use crate::face_mesh::{tesselate, FaceLandmark, FaceMeshDetector, FACE_CONTOURS};
use crate::frames::write_image;
use crate::probe::probe_video;
use crate::runtime::InferenceDevice;
use crate::video::VideoReader;
use deepscan_models::SAMPLE_EVERY_N_FRAMES;

/// Landmark the confidence label is anchored to.
const LABEL_ANCHOR_LANDMARK: usize = 263;

/// Frame rate used when neither the capture nor ffprobe report one.
const FALLBACK_FPS: u32 = 30;

/// Annotation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateConfig {
    pub face_mesh_model: PathBuf,
    pub detector: DetectorKind,
    /// Cascade XML (Haar) or ONNX file (YuNet)
    pub detector_model: Option<PathBuf>,
    pub max_faces: usize,
    /// The label advances to the next score every this many frames
    pub update_every: u64,
    /// BGR
    pub color: [f64; 3],
    pub font_scale: f64,
    pub text_thickness: i32,
    /// Label offset from the anchor landmark
    pub text_offset: (i32, i32),
    pub device: InferenceDevice,
    pub ffmpeg_timeout_secs: u64,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            face_mesh_model: PathBuf::from("models/face_mesh/face_landmark_with_attention.onnx"),
            detector: DetectorKind::Haar,
            detector_model: None,
            max_faces: 2,
            update_every: SAMPLE_EVERY_N_FRAMES,
            color: [0.0, 0.0, 139.0],
            font_scale: 0.8,
            text_thickness: 2,
            text_offset: (-250, -10),
            device: InferenceDevice::Cpu,
            ffmpeg_timeout_secs: 3600,
        }
    }
}

/// What the render pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnotateSummary {
    pub frames: u64,
    pub faces_annotated: u64,
    pub fps: u32,
}

/// Steps through the confidence list as frames go by.
///
/// On every `update_every`-th frame the next score (if any) becomes current;
/// once the list runs out the last score stays on screen.
#[derive(Debug, Clone)]
pub struct ConfidenceTicker {
    scores: Vec<f64>,
    next: usize,
    current: Option<f64>,
    update_every: u64,
}

impl ConfidenceTicker {
    pub fn new(scores: Vec<f64>, update_every: u64) -> Self {
        Self {
            scores,
            next: 0,
            current: None,
            update_every: update_every.max(1),
        }
    }

    /// Score to display on `frame_index`.
    pub fn advance(&mut self, frame_index: u64) -> Option<f64> {
        if frame_index % self.update_every == 0 {
            if let Some(&score) = self.scores.get(self.next) {
                self.current = Some(score);
                self.next += 1;
            }
        }
        self.current
    }
}

/// `0.9134` → `"91.34%"`.
pub fn confidence_label(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

/// Integer frame rate for the encoder, `None` when the value is unusable.
pub fn encoding_fps(fps: f64) -> Option<u32> {
    if fps.is_finite() && fps >= 1.0 {
        Some(fps as u32)
    } else {
        None
    }
}

/// Annotate `input` and encode the result to `output`.
pub async fn annotate_video(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    scores: &[f64],
    config: &AnnotateConfig,
) -> MediaResult<AnnotateSummary> {
    let input = input.as_ref().to_path_buf();
    let output = output.as_ref().to_path_buf();
    check_ffmpeg()?;

    let temp = tempfile::Builder::new().prefix("deepscan-frames-").tempdir()?;
    let frames_dir = temp.path().to_path_buf();

    let started = Instant::now();
    let render_input = input.clone();
    let render_scores = scores.to_vec();
    let render_config = config.clone();
    let mut summary = tokio::task::spawn_blocking(move || {
        render_annotated_frames(&render_input, &frames_dir, &render_scores, &render_config)
    })
    .await
    .map_err(|e| MediaError::internal(format!("render task failed: {e}")))??;

    if summary.fps == 0 {
        summary.fps = match probe_video(&input).await {
            Ok(info) => encoding_fps(info.fps).unwrap_or(FALLBACK_FPS),
            Err(e) => {
                warn!(error = %e, "ffprobe fallback failed, using {FALLBACK_FPS} fps");
                FALLBACK_FPS
            }
        };
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::image_sequence_to_mp4(temp.path().join("frame_%04d.png"), &output, summary.fps);
    let total_frames = summary.frames;
    FfmpegRunner::new()
        .with_timeout(config.ffmpeg_timeout_secs)
        .run_with_progress(&cmd, move |progress| {
            debug!(
                frame = progress.frame,
                percent = progress.frame_percentage(total_frames),
                speed = progress.speed,
                "Encoding annotated video"
            );
        })
        .await?;

    info!(
        input = %input.display(),
        output = %output.display(),
        frames = summary.frames,
        faces = summary.faces_annotated,
        fps = summary.fps,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Annotated video written"
    );
    Ok(summary)
}

/// Decode `input`, draw overlays and write `frame_%04d.png` into `frames_dir`.
///
/// The returned `fps` is `0` when the capture does not report a usable rate.
pub fn render_annotated_frames(
    input: &Path,
    frames_dir: &Path,
    scores: &[f64],
    config: &AnnotateConfig,
) -> MediaResult<AnnotateSummary> {
    let reader = VideoReader::open(input)?;
    let fps = encoding_fps(reader.fps()).unwrap_or(0);

    let mut detector = create_detector(config.detector, config.detector_model.as_deref())?;
    let mesh = FaceMeshDetector::load(&config.face_mesh_model, config.device)?;
    let mut ticker = ConfidenceTicker::new(scores.to_vec(), config.update_every);

    let mut frames = 0u64;
    let mut faces_annotated = 0u64;

    for item in reader {
        let (index, mut frame) = item?;
        let current = ticker.advance(index);
        let label = current.map(confidence_label);

        let faces = largest_faces(detector.detect(&frame)?, config.max_faces);
        for face in &faces {
            match mesh.detect(&frame, face) {
                Ok(landmarks) => {
                    draw_face_overlay(&mut frame, &landmarks, label.as_deref(), config)?;
                    faces_annotated += 1;
                }
                Err(e) => debug!(frame = index, error = %e, "Face mesh skipped"),
            }
        }

        write_image(&frames_dir.join(format!("frame_{index:04}.png")), &frame)?;
        frames += 1;
    }

    if frames == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "no frames decoded from {}",
            input.display()
        )));
    }

    Ok(AnnotateSummary {
        frames,
        faces_annotated,
        fps,
    })
}

fn to_point(lm: &FaceLandmark) -> Point {
    Point::new(lm.x.round() as i32, lm.y.round() as i32)
}

fn draw_face_overlay(
    frame: &mut Mat,
    landmarks: &[FaceLandmark],
    label: Option<&str>,
    config: &AnnotateConfig,
) -> MediaResult<()> {
    let color = Scalar::new(config.color[0], config.color[1], config.color[2], 0.0);

    let mesh: Vector<Vector<Point>> = tesselate(landmarks, frame.cols(), frame.rows())?
        .iter()
        .map(|triangle| {
            triangle
                .iter()
                .map(|p| Point::new(p.x.round() as i32, p.y.round() as i32))
                .collect()
        })
        .collect();
    if !mesh.is_empty() {
        imgproc::polylines(frame, &mesh, true, color, 1, imgproc::LINE_AA, 0)?;
    }

    for contour in FACE_CONTOURS {
        let points: Vector<Point> = contour
            .iter()
            .filter_map(|&i| landmarks.get(i))
            .map(to_point)
            .collect();
        if points.len() < 2 {
            continue;
        }
        imgproc::polylines(frame, &points, false, color, 1, imgproc::LINE_AA, 0)?;
    }

    for lm in landmarks {
        imgproc::circle(frame, to_point(lm), 1, color, 1, imgproc::LINE_8, 0)?;
    }

    if let (Some(text), Some(anchor)) = (label, landmarks.get(LABEL_ANCHOR_LANDMARK)) {
        let origin = to_point(anchor);
        imgproc::put_text(
            frame,
            text,
            Point::new(origin.x + config.text_offset.0, origin.y + config.text_offset.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            config.font_scale,
            color,
            config.text_thickness,
            imgproc::LINE_AA,
            false,
        )?;
    }

    Ok(())
}
