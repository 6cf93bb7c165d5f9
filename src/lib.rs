//! # Background capture for use in the CV system
//!
//! This crate maintains an up-to-date background image for a fixed camera. Frames are fed in
//! one at a time, a subset are periodically captured into a ring buffer on disk, and every so
//! often a new background is generated from those captures on a worker thread. Frame processing
//! never waits on generation, it always gets back the most recent background available.
//!
//! ## Installation
//!
//! Add the following to your project's `Cargo.toml`
//!
//! ```toml
//! [dependencies]
//! bg_capture = "0.1"
//! ```
//!
//! ## Usage
//!
//! The engine refuses to start without an initial background, which is seeded from a sample of
//! frames using [`seed_initial_background`](initialize::seed_initial_background). Then the
//! engine is created through a builder API `BackgroundCaptureBuilder`.
//!
//! ```rust,no_run
//! use bg_capture::prelude::*;
//!
//! let mut capture = BackgroundCaptureBuilder::new()
//!     // The folder holding this camera's resources, which returns a result
//!     .camera_folder("cameras/loading_dock")
//!     .expect("Cannot find camera folder")
//!     // Size of the video frames, the background must match
//!     .video_wh((1280, 720))
//!     // Strategy and settings, alternatively use .setup(...) or .generator(...)
//!     .config_from_file("res/median_background.json")
//!     .expect("Cannot load background capture config")
//!     // Construct the object
//!     .build()
//!     .expect("No valid background available");
//! ```
//!
//! Once the engine has been built every frame is passed through:
//!
//! ```rust,ignore
//! let update = capture.run(&frame, frame_index, epoch_ms, datetime)?;
//! ```
//!
//! which returns a [`BackgroundUpdate`] holding the current background and whether it changed.

#[deny(missing_docs)]

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use builder::{BackgroundCaptureBuilder, Configurable};
pub use config::{BackgroundCaptureConfig, Controls, StrategySetup};
pub use counter::BoundedCounter;
pub use engine::{BackgroundCapture, BackgroundUpdate, EngineSettings, EngineState, SavingSettings};
pub use error::{Error, Result};
pub use store::{CameraPaths, ImagePool, PoolImages};
pub use strategy::{BackgroundGenerator, MedianParams, RollingAverageParams, Strategy, StrategyKind};
pub use timer::PeriodicTimer;

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod builder;
pub mod config;
mod counter;
mod engine;
mod error;
pub mod initialize;
pub mod saver;
pub mod store;
pub mod strategy;
pub mod timer;
mod worker;

pub mod prelude {
    pub use crate::{BackgroundCaptureBuilder, Configurable};
    pub use crate::{BackgroundCapture, BackgroundUpdate, EngineSettings, SavingSettings};
    pub use crate::{BackgroundCaptureConfig, BackgroundGenerator, Strategy};
}
