//! Side-by-side still preview of RGB and optical-flow frames.

use std::fs;
use std::path::{Path, PathBuf};

use opencv::core::{self, Mat, Point, Scalar, Size, Vector};
use opencv::imgproc;
use opencv::prelude::*;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::info;

use crate::error::{MediaError, MediaResult};
use crate::frames::{list_frame_images, read_image, write_image};

/// Output file name inside the preview directory.
pub const COMBINED_FRAMES_FILE: &str = "combined_frames.jpg";

/// Frames taken from each directory.
const FRAMES_PER_SOURCE: usize = 2;
const TILE_HEIGHT: i32 = 360;
const TITLE_HEIGHT: i32 = 36;
const GAP: i32 = 8;

/// Width of a tile scaled to `TILE_HEIGHT`.
pub fn tile_width(width: i32, height: i32) -> i32 {
    if height <= 0 {
        return width.max(1);
    }
    ((TILE_HEIGHT as f64 * width as f64 / height as f64).round() as i32).max(1)
}

/// Pick two random RGB frames and two random flow frames, lay them out in a
/// titled row and save `<out_dir>/combined_frames.jpg`.
pub fn combine_random_frames<R: Rng + ?Sized>(
    rgb_dir: &Path,
    flow_dir: &Path,
    out_dir: &Path,
    rng: &mut R,
) -> MediaResult<PathBuf> {
    fs::create_dir_all(out_dir)?;

    let rgb = list_frame_images(rgb_dir)?;
    let flow = list_frame_images(flow_dir)?;
    if rgb.is_empty() || flow.is_empty() {
        return Err(MediaError::internal("no frames available for the preview"));
    }

    let mut tiles = Vec::with_capacity(FRAMES_PER_SOURCE * 2);
    for path in rgb.choose_multiple(rng, FRAMES_PER_SOURCE) {
        tiles.push(titled_tile(path, "RGB Frame")?);
    }
    for path in flow.choose_multiple(rng, FRAMES_PER_SOURCE) {
        tiles.push(titled_tile(path, "Optical Flow")?);
    }

    let combined = hconcat_with_gaps(&tiles)?;
    let out_path = out_dir.join(COMBINED_FRAMES_FILE);
    write_image(&out_path, &combined)?;

    info!(path = %out_path.display(), tiles = tiles.len(), "Combined preview written");
    Ok(out_path)
}

fn titled_tile(path: &Path, label: &str) -> MediaResult<Mat> {
    let image = read_image(path)?;
    let width = tile_width(image.cols(), image.rows());

    let mut resized = Mat::default();
    imgproc::resize(
        &image,
        &mut resized,
        Size::new(width, TILE_HEIGHT),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;

    let mut tile = Mat::default();
    core::copy_make_border(
        &resized,
        &mut tile,
        TITLE_HEIGHT,
        0,
        0,
        0,
        core::BORDER_CONSTANT,
        Scalar::all(255.0),
    )?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    imgproc::put_text(
        &mut tile,
        &format!("{label}: {name}"),
        Point::new(6, TITLE_HEIGHT - 12),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        Scalar::all(0.0),
        1,
        imgproc::LINE_AA,
        false,
    )?;
    Ok(tile)
}

fn hconcat_with_gaps(tiles: &[Mat]) -> MediaResult<Mat> {
    let mut row = Vector::<Mat>::new();
    for (i, tile) in tiles.iter().enumerate() {
        if i > 0 {
            row.push(Mat::new_rows_cols_with_default(
                tile.rows(),
                GAP,
                tile.typ(),
                Scalar::all(255.0),
            )?);
        }
        row.push(tile.try_clone()?);
    }

    let mut out = Mat::default();
    core::hconcat(&row, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::CV_8UC3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn write_frames(dir: &Path, count: usize, w: i32, h: i32) {
        for i in 0..count {
            let img = Mat::new_rows_cols_with_default(h, w, CV_8UC3, Scalar::all(i as f64 * 40.0)).unwrap();
            write_image(&dir.join(format!("frame_{i:05}.png")), &img).unwrap();
        }
    }

    #[test]
    fn test_tile_width() {
        assert_eq!(tile_width(1280, 720), 640);
        assert_eq!(tile_width(720, 720), 360);
        assert_eq!(tile_width(50, 0), 50);
    }

    #[test]
    fn test_combine_random_frames() {
        let rgb = tempfile::tempdir().unwrap();
        let flow = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_frames(rgb.path(), 3, 128, 72);
        write_frames(flow.path(), 2, 128, 72);

        let mut rng = StdRng::seed_from_u64(7);
        let path = combine_random_frames(rgb.path(), flow.path(), out.path(), &mut rng).unwrap();
        assert_eq!(path, out.path().join(COMBINED_FRAMES_FILE));

        let combined = read_image(&path).unwrap();
        assert_eq!(combined.rows(), TILE_HEIGHT + TITLE_HEIGHT);
        assert_eq!(combined.cols(), 4 * 640 + 3 * GAP);
    }

    #[test]
    fn test_combine_single_frame_sources() {
        let rgb = tempfile::tempdir().unwrap();
        let flow = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_frames(rgb.path(), 1, 64, 64);
        write_frames(flow.path(), 1, 64, 64);

        let mut rng = StdRng::seed_from_u64(1);
        let path = combine_random_frames(rgb.path(), flow.path(), out.path(), &mut rng).unwrap();
        let combined = read_image(&path).unwrap();
        assert_eq!(combined.cols(), 2 * 360 + GAP);
    }

    #[test]
    fn test_combine_requires_frames() {
        let empty = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(combine_random_frames(empty.path(), empty.path(), out.path(), &mut rng).is_err());
    }
}
