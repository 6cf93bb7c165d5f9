//! # Background Capture Engine
//!
//! This module provides the object which is fed every video frame, periodically captures frames
//! into the capture pool, launches background generation on a worker thread and hands back the
//! most up-to-date background image.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbImage;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::counter::BoundedCounter;
use crate::error::{Error, Result};
use crate::saver::{new_saver, DataSaver, SaveJob};
use crate::store::{CameraPaths, ImagePool};
use crate::strategy::BackgroundGenerator;
use crate::timer::{period_ms, PeriodicTimer};
use crate::worker::{GenerationJob, GenerationOutcome, GenerationTask};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// How long `close` waits for an in-flight generation before abandoning it.
pub const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(15);

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// File i/o behaviour of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavingSettings {
    /// Save a jpg + metadata copy of every adopted background
    pub report_saving: bool,

    /// Capture frames and generate new backgrounds at all
    pub resource_saving: bool,

    /// Save on background threads rather than blocking the frame loop
    pub threaded_saving: bool,

    pub jpg_quality: u8,

    pub png_compression: u8
}

/// Everything that controls capture and generation timing and retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub capture_period_ms: u64,

    /// Random extra delay added to each capture period, `None` or `Some(0)` to disable
    pub capture_jitter_sec: Option<u64>,

    /// Generate a new background after every N captures
    pub generate_every_n_captures: usize,

    pub max_capture_count: usize,

    pub max_generate_count: usize,

    pub saving: SavingSettings
}

/// The result of feeding one frame to the engine.
#[derive(Debug, Clone)]
pub struct BackgroundUpdate {
    /// Most up-to-date background
    pub image: Arc<RgbImage>,

    /// True if `image` was adopted during this call
    pub updated: bool
}

/// Timing of the frame being processed, recorded in report metadata.
#[derive(Debug, Clone, Copy)]
struct FrameTime {
    frame_index: u64,
    epoch_ms: u64,
    datetime: DateTime<Utc>
}

/// Metadata saved alongside every report image.
#[derive(Debug, Clone, Serialize)]
struct ReportMetadata {
    name: String,
    datetime_isoformat: String,
    frame_index: u64,
    epoch_ms: u64,
    video_wh: (u32, u32),
    strategy: String
}

/// Periodically captures frames and generates new background images from them.
pub struct BackgroundCapture {
    paths: CameraPaths,
    video_wh: (u32, u32),

    settings: EngineSettings,

    generator: Arc<dyn BackgroundGenerator>,

    capture_pool: ImagePool,
    generate_pool: ImagePool,

    capture_timer: PeriodicTimer,
    generate_trigger: BoundedCounter,
    capture_slots: BoundedCounter,
    generate_slots: BoundedCounter,

    capture_saver: Box<dyn DataSaver>,
    report_saver: Box<dyn DataSaver>,

    background: Arc<RgbImage>,
    task: Option<GenerationTask>,

    /// How long `close` waits for an in-flight generation
    close_grace: Duration,

    state: EngineState
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Lifecycle of a [`BackgroundCapture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed with a valid background, no frames seen yet
    Ready,

    /// At least one frame has been processed
    Running,

    /// Closed, no further frames are accepted
    Closed
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for SavingSettings {
    fn default() -> Self {
        Self {
            report_saving: true,
            resource_saving: true,
            threaded_saving: true,
            jpg_quality: 25,
            png_compression: 0
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            capture_period_ms: period_ms(0, 15, 0, 0),
            capture_jitter_sec: None,
            generate_every_n_captures: 4,
            max_capture_count: 10,
            max_generate_count: 5,
            saving: SavingSettings::default()
        }
    }
}

impl EngineSettings {
    /// Clamp every value into its usable range.
    pub fn validated(mut self) -> Self {
        self.capture_period_ms = self.capture_period_ms.max(1);
        self.generate_every_n_captures = self.generate_every_n_captures.max(1);
        self.max_capture_count = self.max_capture_count.max(1);
        self.max_generate_count = self.max_generate_count.max(1);
        self.saving.jpg_quality = self.saving.jpg_quality.min(100);
        self.saving.png_compression = self.saving.png_compression.min(9);

        self
    }
}

impl BackgroundCapture {
    /// Create a new engine for the camera folder.
    ///
    /// A correctly sized background must already exist in the generate pool.
    pub(crate) fn new(
        paths: CameraPaths,
        video_wh: (u32, u32),
        generator: Arc<dyn BackgroundGenerator>,
        settings: EngineSettings
    ) -> Result<Self> {
        let settings = settings.validated();
        let capture_pool = paths.capture_pool();
        let generate_pool = paths.generate_pool();

        capture_pool.ensure_exists()?;
        generate_pool.ensure_exists()?;

        let background = generate_pool
            .load_newest()?
            .ok_or_else(|| Error::NoBackgroundFound(generate_pool.dir().to_path_buf()))?;
        check_background_size(&background, video_wh)?;

        let mut capture_slots = BoundedCounter::new(settings.max_capture_count, true);
        if let Some(slot) = capture_pool.newest_slot()? {
            capture_slots.set_count(slot);
        }
        let mut generate_slots = BoundedCounter::new(settings.max_generate_count, true);
        if let Some(slot) = generate_pool.newest_slot()? {
            generate_slots.set_count(slot);
        }

        let threaded = settings.saving.threaded_saving;

        let mut engine = Self {
            paths,
            video_wh,
            settings: settings.clone(),
            generator,
            capture_pool,
            generate_pool,
            capture_timer: PeriodicTimer::new(true),
            generate_trigger: BoundedCounter::new(settings.generate_every_n_captures, false),
            capture_slots,
            generate_slots,
            capture_saver: new_saver(threaded, "capture")?,
            report_saver: new_saver(threaded, "report")?,
            background: Arc::new(background),
            task: None,
            close_grace: CLOSE_GRACE_PERIOD,
            state: EngineState::Ready
        };
        engine.configure_triggers();

        info!(
            "Background capture ready for {:?} ({}x{}) using {} generation",
            engine.paths.root(),
            video_wh.0,
            video_wh.1,
            engine.generator.name()
        );

        Ok(engine)
    }

    /// Process one video frame.
    ///
    /// Always returns a usable background, with `updated` set when a newly generated background
    /// was adopted during this call.
    pub fn run(
        &mut self,
        frame: &RgbImage,
        frame_index: u64,
        epoch_ms: u64,
        datetime: DateTime<Utc>
    ) -> Result<BackgroundUpdate> {
        if self.state == EngineState::Closed {
            return Err(Error::EngineClosed);
        }
        self.state = EngineState::Running;

        let time = FrameTime {
            frame_index,
            epoch_ms,
            datetime
        };
        let frame_wh = frame.dimensions();

        // Pick up a generation which has finished since the last frame
        let mut updated = self.collect_generation(false, frame_wh, time)?;

        if !self.settings.saving.resource_saving {
            return Ok(self.update(updated));
        }

        let captured = self.capture_timer.check_trigger(epoch_ms);
        if captured {
            updated |= self.collect_generation(true, frame_wh, time)?;
            self.save_capture(frame);
        }

        if captured && self.generate_trigger.update_count() {
            updated |= self.collect_generation(true, frame_wh, time)?;
            self.launch_generation(frame_wh);

            if !self.settings.saving.threaded_saving {
                updated |= self.collect_generation(true, frame_wh, time)?;
            }
        }

        Ok(self.update(updated))
    }

    /// Forget all trigger timing, used whenever the video jumps around in time.
    pub fn reset(&mut self) {
        self.capture_timer.reset_timer();
        self.generate_trigger.reset();
        debug!("Background capture triggers reset");
    }

    /// Finish up, waiting a limited time for any in-flight generation and flushing all saves.
    pub fn close(&mut self, frame_index: u64, epoch_ms: u64, datetime: DateTime<Utc>) -> Result<()> {
        if self.state == EngineState::Closed {
            return Ok(());
        }
        info!("Closing background capture");

        let time = FrameTime {
            frame_index,
            epoch_ms,
            datetime
        };

        if let Some(task) = self.task.take() {
            match task.join_timeout(self.close_grace) {
                Ok(outcome) => {
                    self.adopt_outcome(outcome, self.video_wh, time)?;
                },
                Err(task) => {
                    warn!(
                        "Background generation still running after {:?}, abandoning it",
                        task.elapsed()
                    );
                }
            }
        }

        self.state = EngineState::Closed;

        self.capture_saver.close()?;
        self.report_saver.close()
    }

    /// Current configuration.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Replace the configuration.
    ///
    /// Savers are swapped if the threading mode changed, and the triggers are reset since their
    /// timing no longer matches the new settings.
    pub fn apply_settings(&mut self, settings: EngineSettings) -> Result<()> {
        let settings = settings.validated();

        if settings.saving.threaded_saving != self.capture_saver.is_threaded() {
            let threaded = settings.saving.threaded_saving;
            let mut capture_saver = new_saver(threaded, "capture")?;
            let mut report_saver = new_saver(threaded, "report")?;

            std::mem::swap(&mut self.capture_saver, &mut capture_saver);
            std::mem::swap(&mut self.report_saver, &mut report_saver);
            capture_saver.close()?;
            report_saver.close()?;
        }

        self.settings = settings;
        self.configure_triggers();
        self.reset();

        Ok(())
    }

    pub fn set_capture_period(&mut self, hours: u64, minutes: u64, seconds: u64) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.capture_period_ms = period_ms(hours, minutes, seconds, 0);
        self.apply_settings(settings)
    }

    pub fn set_generate_trigger(&mut self, every_n_captures: usize) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.generate_every_n_captures = every_n_captures;
        self.apply_settings(settings)
    }

    pub fn set_max_capture_count(&mut self, max_capture_count: usize) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.max_capture_count = max_capture_count;
        self.apply_settings(settings)
    }

    pub fn set_max_generate_count(&mut self, max_generate_count: usize) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.max_generate_count = max_generate_count;
        self.apply_settings(settings)
    }

    pub fn toggle_report_saving(&mut self, enable: bool) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.saving.report_saving = enable;
        self.apply_settings(settings)
    }

    pub fn toggle_resource_saving(&mut self, enable: bool) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.saving.resource_saving = enable;
        self.apply_settings(settings)
    }

    pub fn toggle_threaded_saving(&mut self, enable: bool) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.saving.threaded_saving = enable;
        self.apply_settings(settings)
    }

    pub fn set_jpg_quality(&mut self, quality_0_to_100: u8) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.saving.jpg_quality = quality_0_to_100;
        self.apply_settings(settings)
    }

    pub fn set_png_compression(&mut self, compression_0_to_9: u8) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.saving.png_compression = compression_0_to_9;
        self.apply_settings(settings)
    }

    /// Delete all captures and generated backgrounds, keeping the current background in memory.
    ///
    /// Waits for any in-flight generation first so it can't write into the fresh pools.
    pub fn clear_resources(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.join();
        }
        self.capture_saver.flush()?;

        self.capture_pool.reset()?;
        self.generate_pool.reset()?;
        self.capture_slots.reset();
        self.generate_slots.reset();
        self.reset();

        info!("Cleared background resources in {:?}", self.paths.root());

        Ok(())
    }

    /// Set how long [`close`](Self::close) waits for an in-flight generation before abandoning
    /// it, [`CLOSE_GRACE_PERIOD`] by default.
    pub fn set_close_grace_period(&mut self, grace: Duration) {
        self.close_grace = grace;
    }

    pub fn background(&self) -> Arc<RgbImage> {
        Arc::clone(&self.background)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn paths(&self) -> &CameraPaths {
        &self.paths
    }

    pub fn video_wh(&self) -> (u32, u32) {
        self.video_wh
    }

    /// True while a generation worker is running or waiting to be collected.
    pub fn is_generating(&self) -> bool {
        self.task.is_some()
    }

    fn configure_triggers(&mut self) {
        self.capture_timer.set_period_ms(self.settings.capture_period_ms);
        match self.settings.capture_jitter_sec {
            Some(jitter) if jitter > 0 => self.capture_timer.enable_randomness(jitter),
            _ => self.capture_timer.disable_randomness()
        }

        self.generate_trigger.set_count_reset_value(self.settings.generate_every_n_captures);
        self.capture_slots.set_count_reset_value(self.settings.max_capture_count);
        self.generate_slots.set_count_reset_value(self.settings.max_generate_count);
    }

    fn update(&self, updated: bool) -> BackgroundUpdate {
        BackgroundUpdate {
            image: Arc::clone(&self.background),
            updated
        }
    }

    fn save_capture(&mut self, frame: &RgbImage) {
        self.capture_slots.update_count();
        let slot = self.capture_slots.get_current_count();

        let job = SaveJob::Png {
            path: self.capture_pool.slot_path(slot),
            image: frame.clone(),
            compression_0_to_9: self.settings.saving.png_compression
        };

        match self.capture_saver.save(job) {
            Ok(()) => debug!("Captured frame into slot {}", slot),
            Err(e) => error!("Failed to save capture into slot {}: {}", slot, e)
        }
    }

    fn launch_generation(&mut self, target_wh: (u32, u32)) {
        // The worker reads the capture pool, so the capture that triggered it must be on disk
        if let Err(e) = self.capture_saver.flush() {
            error!("Failed to flush captures before generation: {}", e);
        }

        let job = GenerationJob {
            generator: Arc::clone(&self.generator),
            capture_pool: self.capture_pool.clone().with_newest_slot(
                self.capture_slots.get_current_count(),
                self.settings.max_capture_count
            ),
            generate_pool: self.generate_pool.clone().with_newest_slot(
                self.generate_slots.get_current_count(),
                self.settings.max_generate_count
            ),
            target_wh,
            slot: self.generate_slots.peek_next_count(),
            png_compression: self.settings.saving.png_compression
        };

        match GenerationTask::launch(job) {
            Ok(task) => {
                info!("Started {} background generation", self.generator.name());
                self.task = Some(task);
            },
            Err(e) => error!("Could not start background generation: {}", e)
        }
    }

    /// Collect the in-flight generation if it has finished, or wait for it if `block` is set.
    ///
    /// Returns true if a new background was adopted.
    fn collect_generation(&mut self, block: bool, frame_wh: (u32, u32), time: FrameTime) -> Result<bool> {
        let task = match self.task.take() {
            Some(t) => t,
            None => return Ok(false)
        };

        if !block && !task.is_finished() {
            self.task = Some(task);
            return Ok(false);
        }

        if !task.is_finished() {
            debug!("Waiting on in-flight background generation for slot {}", task.slot());
        }

        self.adopt_outcome(task.join(), frame_wh, time)
    }

    fn adopt_outcome(
        &mut self,
        outcome: GenerationOutcome,
        expected_wh: (u32, u32),
        time: FrameTime
    ) -> Result<bool> {
        match outcome {
            GenerationOutcome::Saved(slot) => {
                self.generate_slots.set_count(slot);

                let background = self
                    .generate_pool
                    .clone()
                    .with_newest_slot(slot, self.settings.max_generate_count)
                    .require_newest()?;
                check_background_size(&background, expected_wh)?;

                self.background = Arc::new(background);
                info!("New background adopted (frame {})", time.frame_index);

                if self.settings.saving.report_saving {
                    self.save_report(time);
                }

                Ok(true)
            },
            GenerationOutcome::NoImage => {
                debug!("Background generation produced no image, keeping current background");
                Ok(false)
            },
            GenerationOutcome::Failed(reason) => {
                error!("Background generation failed: {}", reason);
                Ok(false)
            }
        }
    }

    fn save_report(&mut self, time: FrameTime) {
        let name = format!("bggen-{}", time.epoch_ms);
        let metadata = ReportMetadata {
            name: name.clone(),
            datetime_isoformat: time.datetime.to_rfc3339(),
            frame_index: time.frame_index,
            epoch_ms: time.epoch_ms,
            video_wh: self.video_wh,
            strategy: self.generator.name()
        };

        let image_job = SaveJob::Jpg {
            path: self.paths.report_images_dir().join(format!("{}.jpg", name)),
            image: self.background.as_ref().clone(),
            quality_0_to_100: self.settings.saving.jpg_quality
        };
        if let Err(e) = self.report_saver.save(image_job) {
            error!("Failed to save report image {}: {}", name, e);
        }

        let data = match serde_json::to_value(&metadata) {
            Ok(d) => d,
            Err(e) => {
                error!("Failed to serialise report metadata {}: {}", name, e);
                return;
            }
        };
        let meta_job = SaveJob::Json {
            path: self.paths.report_metadata_dir().join(format!("{}.json", name)),
            data
        };
        if let Err(e) = self.report_saver.save(meta_job) {
            error!("Failed to save report metadata {}: {}", name, e);
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn check_background_size(background: &RgbImage, expected_wh: (u32, u32)) -> Result<()> {
    if background.dimensions() != expected_wh {
        return Err(Error::BackgroundSizeMismatch {
            expected: expected_wh,
            found: background.dimensions()
        });
    }

    Ok(())
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use crate::strategy::Strategy;
    use image::Rgb;

    const WH: (u32, u32) = (8, 6);

    fn seeded_paths(dir: &std::path::Path) -> CameraPaths {
        let paths = CameraPaths::new(dir);
        paths
            .generate_pool()
            .save(0, &RgbImage::from_pixel(WH.0, WH.1, Rgb([5, 5, 5])), 0)
            .unwrap();
        paths
    }

    fn sync_settings() -> EngineSettings {
        let mut settings = EngineSettings::default();
        settings.capture_period_ms = 1000;
        settings.generate_every_n_captures = 1;
        settings.saving.threaded_saving = false;
        settings
    }

    #[test]
    fn test_requires_background() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CameraPaths::new(dir.path());

        let result = BackgroundCapture::new(paths, WH, Arc::new(Strategy::Reference), sync_settings());
        assert!(matches!(result, Err(Error::NoBackgroundFound(_))));
    }

    #[test]
    fn test_rejects_wrong_size_background() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path());

        let result = BackgroundCapture::new(
            paths,
            (WH.0 + 1, WH.1),
            Arc::new(Strategy::Reference),
            sync_settings()
        );
        assert!(matches!(result, Err(Error::BackgroundSizeMismatch { .. })));
    }

    /// With resource saving off nothing is captured and the seed is returned untouched
    #[test]
    fn test_resource_saving_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path());
        let mut settings = sync_settings();
        settings.saving.resource_saving = false;

        let mut engine =
            BackgroundCapture::new(paths.clone(), WH, Arc::new(Strategy::Reference), settings).unwrap();
        let frame = RgbImage::from_pixel(WH.0, WH.1, Rgb([200, 200, 200]));

        for i in 0..5 {
            let update = engine.run(&frame, i, i * 1000, Utc::now()).unwrap();
            assert!(!update.updated);
            assert_eq!(update.image.get_pixel(0, 0), &Rgb([5, 5, 5]));
        }

        assert_eq!(paths.capture_pool().count().unwrap(), 0);
        assert_eq!(engine.state(), EngineState::Running);
    }

    /// Synchronous saving adopts the new background within the same call
    #[test]
    fn test_sync_generation_updates_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path());

        let mut engine =
            BackgroundCapture::new(paths.clone(), WH, Arc::new(Strategy::Reference), sync_settings())
                .unwrap();
        let frame = RgbImage::from_pixel(WH.0, WH.1, Rgb([1, 1, 1]));

        let update = engine.run(&frame, 0, 0, Utc::now()).unwrap();
        assert!(update.updated);
        assert!(!engine.is_generating());

        // Slot 0 held the seed, so the first generated background goes into slot 1
        assert!(paths.generate_pool().slot_path(1).exists());
        assert_eq!(paths.report_images_dir().read_dir().unwrap().count(), 1);
        assert_eq!(paths.report_metadata_dir().read_dir().unwrap().count(), 1);

        let update = engine.run(&frame, 1, 500, Utc::now()).unwrap();
        assert!(!update.updated);
    }

    #[test]
    fn test_report_saving_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path());
        let mut settings = sync_settings();
        settings.saving.report_saving = false;

        let mut engine =
            BackgroundCapture::new(paths.clone(), WH, Arc::new(Strategy::Reference), settings).unwrap();
        let frame = RgbImage::from_pixel(WH.0, WH.1, Rgb([1, 1, 1]));

        assert!(engine.run(&frame, 0, 0, Utc::now()).unwrap().updated);
        assert!(!paths.report_images_dir().exists());
    }

    /// Reset makes the capture timer fire again straight away
    #[test]
    fn test_reset_restarts_capture_timing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path());
        let mut settings = sync_settings();
        settings.generate_every_n_captures = 100;

        let mut engine =
            BackgroundCapture::new(paths.clone(), WH, Arc::new(Strategy::Passthrough), settings).unwrap();
        let frame = RgbImage::from_pixel(WH.0, WH.1, Rgb([1, 1, 1]));

        engine.run(&frame, 0, 50_000, Utc::now()).unwrap();
        engine.run(&frame, 1, 50_100, Utc::now()).unwrap();
        assert_eq!(paths.capture_pool().count().unwrap(), 1);

        // Seeking backwards would never fire without a reset
        engine.reset();
        engine.run(&frame, 0, 0, Utc::now()).unwrap();
        assert_eq!(paths.capture_pool().count().unwrap(), 2);
    }

    #[test]
    fn test_setters_apply() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path());

        let mut engine =
            BackgroundCapture::new(paths, WH, Arc::new(Strategy::Passthrough), sync_settings()).unwrap();

        engine.set_capture_period(0, 1, 30).unwrap();
        engine.set_generate_trigger(0).unwrap();
        engine.set_max_capture_count(3).unwrap();
        engine.set_max_generate_count(2).unwrap();
        engine.set_jpg_quality(250).unwrap();
        engine.set_png_compression(4).unwrap();
        engine.toggle_report_saving(false).unwrap();
        engine.toggle_threaded_saving(true).unwrap();

        let settings = engine.settings();
        assert_eq!(settings.capture_period_ms, 90_000);
        assert_eq!(settings.generate_every_n_captures, 1);
        assert_eq!(settings.max_capture_count, 3);
        assert_eq!(settings.max_generate_count, 2);
        assert_eq!(settings.saving.jpg_quality, 100);
        assert_eq!(settings.saving.png_compression, 4);
        assert!(!settings.saving.report_saving);
        assert!(settings.saving.threaded_saving);
    }

    #[test]
    fn test_closed_engine_rejects_frames() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path());

        let mut engine =
            BackgroundCapture::new(paths, WH, Arc::new(Strategy::Reference), sync_settings()).unwrap();
        engine.close(0, 0, Utc::now()).unwrap();

        let frame = RgbImage::from_pixel(WH.0, WH.1, Rgb([1, 1, 1]));
        assert!(matches!(engine.run(&frame, 1, 1, Utc::now()), Err(Error::EngineClosed)));
        assert_eq!(engine.state(), EngineState::Closed);
        engine.close(0, 0, Utc::now()).unwrap();
    }
}
