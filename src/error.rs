//! # `bg_capture` Error module
//!
//! Provides abstractions over errors which can occur during this crate's use.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::PathBuf;

use serde_any;
use thiserror;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Result type used by faillible functions inside the `bg_capture` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors which can occur during use of the `bg_capture` crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Cannot find file at {0:?}")]
    FileNotFound(PathBuf),

    #[error("Error deserialising data: {0}")]
    DeserialisationError(serde_any::Error),

    #[error("Error serialising report metadata: {0}")]
    MetadataError(serde_json::Error),

    #[error("Filesystem error at {0:?}: {1}")]
    IoError(PathBuf, std::io::Error),

    #[error("Error loading image {0:?}: {1}")]
    ImageLoadError(PathBuf, image::ImageError),

    #[error("Error saving image {0:?}: {1}")]
    ImageSaveError(PathBuf, image::ImageError),

    #[error("No images found in pool at {0:?}")]
    EmptyPool(PathBuf),

    #[error(
        "No valid background image found in {0:?}, an initial background must be created \
        before the engine can run"
    )]
    NoBackgroundFound(PathBuf),

    #[error(
        "Background image is {found:?} (w, h) but the video is {expected:?}, the background \
        pool does not belong to this video"
    )]
    BackgroundSizeMismatch {
        expected: (u32, u32),
        found: (u32, u32)
    },

    #[error("Unknown background generation strategy {0:?}")]
    UnknownStrategy(String),

    #[error("Error building background capture: {0}")]
    BuildError(String),

    #[error("Could not start generation worker: {0}")]
    WorkerSpawnError(std::io::Error),

    #[error("Background generation failed: {0}")]
    GenerationFailed(String),

    #[error("Could not send to saver thread")]
    ChannelSendError,

    #[error("Could not join saver thread")]
    ThreadJoinError,

    #[error("Background capture has already been closed")]
    EngineClosed
}
