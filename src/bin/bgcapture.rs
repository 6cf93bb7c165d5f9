//! # Background capture replay
//!
//! Replays a directory of frames through a background capture engine as if they were a video
//! recorded at a fixed frame period, logging every background update.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use bg_capture::initialize::{
    ensure_background, frames_allowed_by_ram, sample_frame_indices, DEFAULT_MAX_FRAMES
};
use bg_capture::prelude::*;
use bg_capture::store::load_rgb;
use bg_capture::{Error, Result};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Replay a directory of frames through background capture
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder holding the camera's resources and reports
    camera_folder: PathBuf,

    /// Directory of frames, replayed in file name order
    #[arg(short, long)]
    frames: PathBuf,

    /// Background capture config file (json, toml, ...)
    #[arg(short, long)]
    config: PathBuf,

    /// Time between consecutive frames
    #[arg(long, default_value_t = 1000)]
    frame_period_ms: u64,

    /// Epoch time of the first frame, defaults to now
    #[arg(long)]
    start_epoch_ms: Option<u64>,

    /// Seed an initial background from the frames if there isn't a valid one
    #[arg(long, default_value_t = false)]
    seed: bool,

    /// Memory budget for seeding frames
    #[arg(long, default_value_t = 250.0)]
    max_ram_mb: f64,

    /// Empty the capture and generate pools before starting
    #[arg(long, default_value_t = false)]
    clear: bool
}

// -----------------------------------------------------------------------------------------------
// MAIN
// -----------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    fs::create_dir_all(&args.camera_folder)
        .map_err(|e| Error::IoError(args.camera_folder.clone(), e))?;

    let frame_paths = list_frames(&args.frames)?;
    let first = match frame_paths.first() {
        Some(p) => load_rgb(p)?,
        None => return Err(Error::FileNotFound(args.frames.clone()))
    };
    let video_wh = first.dimensions();
    info!("Replaying {} frames ({}x{})", frame_paths.len(), video_wh.0, video_wh.1);

    if args.seed {
        ensure_background(&args.camera_folder, video_wh, || {
            let max_frames = frames_allowed_by_ram(args.max_ram_mb, video_wh).min(DEFAULT_MAX_FRAMES);
            sample_frame_indices(frame_paths.len() as u64, max_frames)
                .into_iter()
                .map(|i| load_rgb(&frame_paths[i as usize]))
                .collect()
        })?;
    }

    let mut capture = BackgroundCaptureBuilder::new()
        .camera_folder(&args.camera_folder)?
        .video_wh(video_wh)
        .config_from_file(&args.config)?
        .build()?;

    if args.clear {
        capture.clear_resources()?;
    }

    let start_epoch_ms = args
        .start_epoch_ms
        .unwrap_or_else(|| Utc::now().timestamp_millis().max(0) as u64);

    let mut frame_index = 0;
    let mut epoch_ms = start_epoch_ms;
    let mut updates = 0;

    for path in &frame_paths {
        let frame = match load_rgb(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping frame: {}", e);
                continue;
            }
        };

        if frame.dimensions() != video_wh {
            warn!("Skipping {:?}, frame size {:?} doesn't match video", path, frame.dimensions());
            continue;
        }

        let update = capture.run(&frame, frame_index, epoch_ms, datetime_of(epoch_ms))?;
        if update.updated {
            updates += 1;
            info!("Background updated at frame {} ({:?})", frame_index, path);
        }

        frame_index += 1;
        epoch_ms += args.frame_period_ms;
    }

    capture.close(frame_index, epoch_ms, datetime_of(epoch_ms))?;
    info!("Done, {} background updates over {} frames", updates, frame_index);

    Ok(())
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Image files in the directory, sorted by name.
fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::IoError(dir.to_path_buf(), e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::IoError(dir.to_path_buf(), e))?.path();

        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        if is_frame {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths)
}

fn datetime_of(epoch_ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .unwrap_or_else(Utc::now)
}
