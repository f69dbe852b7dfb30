//! Frame-by-frame video capture through OpenCV.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Sequential BGR frame reader.
///
/// Yields `(frame_index, frame)` pairs with zero-based indices until the
/// capture runs dry.
pub struct VideoReader {
    capture: VideoCapture,
    path: PathBuf,
    next_index: u64,
    fps: f64,
    frame_count: Option<u64>,
}

impl VideoReader {
    /// Open a video file.
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let path_str = path.to_string_lossy();
        let capture = VideoCapture::from_file(&path_str, videoio::CAP_ANY)
            .map_err(|_| MediaError::VideoOpen(path_str.to_string()))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(MediaError::VideoOpen(path_str.to_string()));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as i32;
        let frame_count = capture
            .get(videoio::CAP_PROP_FRAME_COUNT)
            .ok()
            .filter(|c| c.is_finite() && *c > 0.0)
            .map(|c| c as u64);

        debug!(
            path = %path.display(),
            fps,
            width,
            height,
            frames = ?frame_count,
            "Opened video capture"
        );

        Ok(Self {
            capture,
            path: path.to_path_buf(),
            next_index: 0,
            fps,
            frame_count,
        })
    }

    /// Frame rate reported by the container, `0.0` when unknown.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Frame count reported by the container, if any.
    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the next frame, or `None` at end of stream.
    pub fn read_frame(&mut self) -> MediaResult<Option<(u64, Mat)>> {
        let mut frame = Mat::default();
        let ok = self.capture.read(&mut frame)?;
        if !ok || frame.empty() {
            return Ok(None);
        }

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some((index, frame)))
    }
}

impl Iterator for VideoReader {
    type Item = MediaResult<(u64, Mat)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}
