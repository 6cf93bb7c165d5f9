//! # Initial Background Module
//!
//! The engine refuses to run without a correctly sized background, so before processing a video
//! one must be created. This module checks for an existing background and seeds a new one from
//! a sample of the video's frames when needed.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::Path;
use std::time::Instant;

use image::RgbImage;
use log::{info, warn};

use crate::error::{Error, Result};
use crate::store::CameraPaths;
use crate::strategy::median_of;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Frames at either end of a video which are never sampled, they are often black or corrupt.
pub const IGNORED_END_FRAMES: u64 = 10;

/// Default memory budget for holding sampled frames.
pub const DEFAULT_MAX_RAM_MB: f64 = 250.0;

/// Default upper limit on sampled frames.
pub const DEFAULT_MAX_FRAMES: usize = 25;

const BYTES_PER_PIXEL: f64 = 3.0;

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Whether the camera folder already holds a usable background of the given size.
///
/// Unreadable backgrounds count as missing.
pub fn check_for_valid_background<P: AsRef<Path>>(camera_folder: P, width: u32, height: u32) -> bool {
    let pool = CameraPaths::new(camera_folder).generate_pool();

    match pool.load_newest() {
        Ok(Some(bg)) if bg.dimensions() == (width, height) => {
            info!("Found existing {}x{} background", width, height);
            true
        },
        Ok(Some(bg)) => {
            warn!(
                "Existing background is {:?} but the video is {:?}, it will be replaced",
                bg.dimensions(),
                (width, height)
            );
            false
        },
        Ok(None) => false,
        Err(e) => {
            warn!("Could not load existing background: {}", e);
            false
        }
    }
}

/// Create the initial background from the median of `frames`.
///
/// The generate pool is cleared and the new background saved as its first slot.
pub fn seed_initial_background<P: AsRef<Path>>(
    camera_folder: P,
    frames: &[RgbImage],
    png_compression: u8
) -> Result<RgbImage> {
    let start = Instant::now();

    let background = median_of(frames).ok_or_else(|| {
        Error::GenerationFailed(format!(
            "cannot seed a background from {} frames, at least one is needed and all must be \
            the same size",
            frames.len()
        ))
    })?;

    let pool = CameraPaths::new(camera_folder).generate_pool();
    pool.reset()?;
    pool.save(0, &background, png_compression)?;

    info!(
        "Seeded initial background from {} frames in {:.1} s",
        frames.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(background)
}

/// Make sure a valid background exists, seeding one from `load_frames` if it doesn't.
///
/// Returns true if a new background was seeded.
pub fn ensure_background<P, F>(camera_folder: P, video_wh: (u32, u32), load_frames: F) -> Result<bool>
where
    P: AsRef<Path>,
    F: FnOnce() -> Result<Vec<RgbImage>>
{
    if check_for_valid_background(&camera_folder, video_wh.0, video_wh.1) {
        return Ok(false);
    }

    info!("No background found ({}x{}), generating one", video_wh.0, video_wh.1);
    let frames = load_frames()?;
    seed_initial_background(camera_folder, &frames, 0)?;

    Ok(true)
}

/// Memory needed to hold one RGB frame, in megabytes (1e6 bytes).
pub fn mb_per_frame(frame_wh: (u32, u32)) -> f64 {
    (frame_wh.0 as f64 * frame_wh.1 as f64 * BYTES_PER_PIXEL) / 1e6
}

/// How many frames fit within a memory budget.
pub fn frames_allowed_by_ram(max_ram_mb: f64, frame_wh: (u32, u32)) -> usize {
    let per_frame = mb_per_frame(frame_wh);
    if per_frame <= 0.0 {
        return 0;
    }

    (max_ram_mb / per_frame).floor().max(0.0) as usize
}

/// Evenly spaced frame indices to sample from a video of `total_frames` frames.
///
/// The first and last [`IGNORED_END_FRAMES`] are skipped when the video is long enough,
/// otherwise the whole video is sampled. At most `max_frames` indices are returned.
pub fn sample_frame_indices(total_frames: u64, max_frames: usize) -> Vec<u64> {
    if total_frames == 0 || max_frames == 0 {
        return Vec::new();
    }

    let (first, last) = if total_frames > 2 * IGNORED_END_FRAMES + 1 {
        (IGNORED_END_FRAMES, total_frames - 1 - IGNORED_END_FRAMES)
    } else {
        (0, total_frames - 1)
    };

    let available = (last - first + 1) as usize;
    let count = max_frames.min(available);

    if count == 1 {
        return vec![first];
    }

    let span = last - first;
    let steps = (count - 1) as u64;
    (0..count as u64)
        .map(|i| first + (i * span) / steps)
        .collect()
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([value, value, value]))
    }

    #[test]
    fn test_seed_and_check() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!check_for_valid_background(dir.path(), 8, 6));

        let frames = vec![solid(8, 6, 10), solid(8, 6, 200), solid(8, 6, 30)];
        let bg = seed_initial_background(dir.path(), &frames, 0).unwrap();
        assert_eq!(bg.get_pixel(0, 0), &Rgb([30, 30, 30]));

        let pool = CameraPaths::new(dir.path()).generate_pool();
        assert_eq!(pool.list_newest_first().unwrap(), vec![pool.slot_path(0)]);

        assert!(check_for_valid_background(dir.path(), 8, 6));
        assert!(!check_for_valid_background(dir.path(), 6, 8));
    }

    /// Seeding replaces whatever was in the generate pool
    #[test]
    fn test_seed_clears_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pool = CameraPaths::new(dir.path()).generate_pool();
        pool.save(3, &solid(4, 4, 1), 0).unwrap();

        seed_initial_background(dir.path(), &[solid(8, 6, 50)], 0).unwrap();

        assert_eq!(pool.count().unwrap(), 1);
        assert_eq!(pool.newest_slot().unwrap(), Some(0));
    }

    #[test]
    fn test_seed_needs_frames() {
        let dir = tempfile::tempdir().unwrap();

        assert!(seed_initial_background(dir.path(), &[], 0).is_err());
        assert!(seed_initial_background(dir.path(), &[solid(8, 6, 1), solid(6, 8, 1)], 0).is_err());
    }

    #[test]
    fn test_ensure_background() {
        let dir = tempfile::tempdir().unwrap();

        let seeded = ensure_background(dir.path(), (8, 6), || Ok(vec![solid(8, 6, 7)])).unwrap();
        assert!(seeded);

        let seeded = ensure_background(dir.path(), (8, 6), || {
            panic!("frames should not be loaded when a background exists")
        })
        .unwrap();
        assert!(!seeded);
    }

    #[test]
    fn test_ram_budget() {
        assert!((mb_per_frame((1000, 1000)) - 3.0).abs() < 1e-9);
        assert_eq!(frames_allowed_by_ram(250.0, (1920, 1080)), 40);
        assert_eq!(frames_allowed_by_ram(1.0, (1920, 1080)), 0);
        assert_eq!(frames_allowed_by_ram(10.0, (0, 0)), 0);
    }

    #[test]
    fn test_sample_frame_indices() {
        assert_eq!(sample_frame_indices(121, 5), vec![10, 35, 60, 85, 110]);

        let indices = sample_frame_indices(10_000, 25);
        assert_eq!(indices.len(), 25);
        assert_eq!(indices[0], 10);
        assert_eq!(indices[24], 9989);

        // Short videos are sampled end to end
        assert_eq!(sample_frame_indices(5, 10), vec![0, 1, 2, 3, 4]);
        assert_eq!(sample_frame_indices(100, 1), vec![10]);
        assert!(sample_frame_indices(0, 5).is_empty());
    }
}
