//! # `BackgroundCaptureBuilder` implementation
//!
//! This module implements the builder for background capture engines.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_any;
use serde::de::DeserializeOwned;

use crate::config::{BackgroundCaptureConfig, StrategySetup};
use crate::engine::{BackgroundCapture, EngineSettings};
use crate::error::{Error, Result};
use crate::store::CameraPaths;
use crate::strategy::BackgroundGenerator;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Provides common methods for configuring a builder from a file.
pub trait Configurable: Sized {
    /// The configuration to be used, must be deserialisable.
    type Config: DeserializeOwned;

    fn config(self, config: Self::Config) -> Result<Self>;

    /// Load the configuration from a file.
    ///
    /// The file type will be guessed at runtime, any file type supported by
    /// [`serde_any`](https://docs.rs/serde_any/0.5.0/serde_any/) is supported, but it must be
    /// deserialisable into `Self::Config`.
    fn config_from_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        // Check the file exists
        if !path.as_ref().exists() {
            return Err(Error::FileNotFound(path.as_ref().to_path_buf()));
        }

        // Load the config from the file, guessing which format it's in using serde_any
        let c = serde_any::from_file(path)
            .map_err(|e| Error::DeserialisationError(e))?;

        self.config(c)
    }
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Builder for a [`BackgroundCapture`].
pub struct BackgroundCaptureBuilder {
    camera_folder: Option<PathBuf>,

    video_wh: Option<(u32, u32)>,

    generator: Option<Arc<dyn BackgroundGenerator>>,

    settings: EngineSettings
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl BackgroundCaptureBuilder {
    pub fn new() -> Self {
        Self {
            camera_folder: None,
            video_wh: None,
            generator: None,
            settings: EngineSettings::default()
        }
    }

    /// Specify the folder holding this camera's `resources` and `report` data.
    ///
    /// # Returns
    /// - `self` if the folder exists, `Err` otherwise
    pub fn camera_folder<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        if path.as_ref().is_dir() {
            self.camera_folder = Some(path.as_ref().to_path_buf());

            Ok(self)
        } else {
            Err(Error::FileNotFound(path.as_ref().to_path_buf()))
        }
    }

    /// Set the (width, height) of the video frames.
    pub fn video_wh(mut self, video_wh: (u32, u32)) -> Self {
        self.video_wh = Some(video_wh);

        self
    }

    /// Use a strategy along with the settings it was set up with.
    pub fn setup(mut self, setup: StrategySetup) -> Self {
        self.generator = Some(Arc::new(setup.strategy));
        self.settings = setup.settings;

        self
    }

    /// Use any generator, such as a custom [`BackgroundGenerator`] implementation.
    ///
    /// Settings are left unchanged.
    pub fn generator(mut self, generator: Arc<dyn BackgroundGenerator>) -> Self {
        self.generator = Some(generator);

        self
    }

    /// Override the engine settings.
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;

        self
    }

    /// Build the engine.
    ///
    /// This fails if the camera folder has no correctly sized background yet, see
    /// [`seed_initial_background`](crate::initialize::seed_initial_background).
    pub fn build(self) -> Result<BackgroundCapture> {
        // Confirm that required parameters are present
        let camera_folder = self.camera_folder
            .ok_or_else(|| Error::BuildError(String::from("Missing camera folder")))?;
        let video_wh = self.video_wh
            .ok_or_else(|| Error::BuildError(String::from("Missing video size")))?;
        let generator = self.generator
            .ok_or_else(|| Error::BuildError(String::from("Missing generation strategy")))?;

        if video_wh.0 == 0 || video_wh.1 == 0 {
            return Err(Error::BuildError(format!("Invalid video size {:?}", video_wh)));
        }

        BackgroundCapture::new(CameraPaths::new(camera_folder), video_wh, generator, self.settings)
    }
}

impl Configurable for BackgroundCaptureBuilder {
    type Config = BackgroundCaptureConfig;

    fn config(self, config: Self::Config) -> Result<Self> {
        Ok(self.setup(config.setup()?))
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use crate::engine::EngineState;
    use image::{Rgb, RgbImage};

    /// Test that a builder loads its configuration from file
    #[test]
    fn test_config_from_file() {
        let builder = BackgroundCaptureBuilder::new()
            .config_from_file("res/median_background.json")
            .expect("Cannot load the background capture config");

        assert_eq!(builder.settings.max_capture_count, 10);
        assert_eq!(builder.settings.generate_every_n_captures, 3);
        assert!(!builder.settings.saving.threaded_saving);
        assert_eq!(builder.generator.unwrap().name(), "median");
    }

    #[test]
    fn test_toml_config_from_file() {
        let builder = BackgroundCaptureBuilder::new()
            .config_from_file("res/rolling_average_background.toml")
            .expect("Cannot load the background capture config");

        assert_eq!(builder.settings.capture_period_ms, 2 * 60 * 1000);
        assert!(builder.settings.saving.threaded_saving);
        assert_eq!(builder.generator.unwrap().name(), "rolling_average");
    }

    #[test]
    fn test_missing_config_file() {
        let result = BackgroundCaptureBuilder::new().config_from_file("res/nonexistent.toml");

        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    /// Test that missing parameters are reported rather than defaulted
    #[test]
    fn test_missing_parameters() {
        let dir = tempfile::tempdir().unwrap();

        let result = BackgroundCaptureBuilder::new().video_wh((8, 6)).build();
        assert!(matches!(result, Err(Error::BuildError(_))));

        let result = BackgroundCaptureBuilder::new()
            .camera_folder(dir.path())
            .unwrap()
            .video_wh((8, 6))
            .build();
        assert!(matches!(result, Err(Error::BuildError(_))));

        assert!(BackgroundCaptureBuilder::new().camera_folder(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_build() {
        let dir = tempfile::tempdir().unwrap();
        CameraPaths::new(dir.path())
            .generate_pool()
            .save(0, &RgbImage::from_pixel(8, 6, Rgb([9, 9, 9])), 0)
            .unwrap();

        let engine = BackgroundCaptureBuilder::new()
            .camera_folder(dir.path())
            .unwrap()
            .video_wh((8, 6))
            .config(BackgroundCaptureConfig::new("passthrough"))
            .unwrap()
            .build()
            .expect("Cannot build engine");

        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.background().get_pixel(3, 3), &Rgb([9, 9, 9]));
        assert_eq!(engine.settings().capture_period_ms, 60 * 60 * 1000);
    }
}
