//! Frame image directories used by the fusion pipeline.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;
use tracing::{debug, info};

use crate::compress::{compress_frame, CompressionSettings};
use crate::error::{MediaError, MediaResult};
use crate::video::VideoReader;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// File name of the `index`-th extracted frame.
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:05}.png")
}

fn is_frame_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Image files in `dir`, naturally sorted (`frame_2` before `frame_10`).
pub fn list_frame_images(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_frame_image(p))
        .collect();

    files.sort_by(|a, b| {
        let an = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let bn = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        natural_cmp(&an, &bn)
    });
    Ok(files)
}

/// Remove image files left in `dir` by a previous run.
pub fn clear_frame_images(dir: &Path) -> MediaResult<usize> {
    let stale = list_frame_images(dir)?;
    for path in &stale {
        fs::remove_file(path)?;
    }
    if !stale.is_empty() {
        debug!(dir = %dir.display(), removed = stale.len(), "Cleared stale frames");
    }
    Ok(stale.len())
}

/// Compare strings treating digit runs as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ac), Some(bc)) if ac.is_ascii_digit() && bc.is_ascii_digit() => {
                let an: String = std::iter::from_fn(|| ai.next_if(|c| c.is_ascii_digit())).collect();
                let bn: String = std::iter::from_fn(|| bi.next_if(|c| c.is_ascii_digit())).collect();
                let at = an.trim_start_matches('0');
                let bt = bn.trim_start_matches('0');
                let ord = at
                    .len()
                    .cmp(&bt.len())
                    .then_with(|| at.cmp(bt))
                    .then_with(|| an.len().cmp(&bn.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ac), Some(bc)) => {
                if ac != bc {
                    return ac.cmp(&bc);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

/// Decode every frame of `video`, compress it and write it as
/// `frame_%05d.png` into `out_dir`. Returns the written paths in order.
pub fn extract_frames(
    video: &Path,
    out_dir: &Path,
    compression: Option<&CompressionSettings>,
) -> MediaResult<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    clear_frame_images(out_dir)?;

    let reader = VideoReader::open(video)?;
    let expected = reader.frame_count();
    let mut written = Vec::new();

    for item in reader {
        let (index, frame) = item?;
        let frame = match compression {
            Some(settings) => compress_frame(&frame, settings)?,
            None => frame,
        };
        let path = out_dir.join(frame_file_name(index));
        write_image(&path, &frame)?;
        written.push(path);
    }

    info!(
        video = %video.display(),
        frames = written.len(),
        expected = ?expected,
        dir = %out_dir.display(),
        "Extracted frames"
    );
    Ok(written)
}

pub fn read_image(path: &Path) -> MediaResult<Mat> {
    let image = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
    if image.empty() {
        return Err(MediaError::InvalidVideo(format!(
            "could not decode image {}",
            path.display()
        )));
    }
    Ok(image)
}

pub fn write_image(path: &Path, image: &Mat) -> MediaResult<()> {
    if !imgcodecs::imwrite(&path.to_string_lossy(), image, &Vector::<i32>::new())? {
        return Err(MediaError::internal(format!(
            "failed to write image {}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("frame_2.png", "frame_10.png"), Ordering::Less);
        assert_eq!(natural_cmp("frame_00010.png", "frame_00009.png"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "ab"), Ordering::Less);
        assert_eq!(natural_cmp("img1b", "img1a"), Ordering::Greater);
    }

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(0), "frame_00000.png");
        assert_eq!(frame_file_name(123), "frame_00123.png");
    }

    #[test]
    fn test_list_frame_images_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_10.png", "frame_2.jpg", "notes.txt", "frame_1.JPEG"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.png")).unwrap();

        let names: Vec<String> = list_frame_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame_1.JPEG", "frame_2.jpg", "frame_10.png"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        assert!(list_frame_images(Path::new("/nonexistent/frames")).unwrap().is_empty());
    }

    #[test]
    fn test_clear_frame_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("frame_00001.png"), b"x").unwrap();
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();
        assert_eq!(clear_frame_images(dir.path()).unwrap(), 1);
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_extract_frames_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_frames(Path::new("/nonexistent.mp4"), dir.path(), None);
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
