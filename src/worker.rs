//! # Generation Worker Module
//!
//! Runs a background generation out-of-line, on its own thread, so that pixel-heavy strategies
//! never stall frame ingestion. The worker only talks to the engine through the generate pool
//! and its join handle.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::store::ImagePool;
use crate::strategy::BackgroundGenerator;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Everything a worker needs, cloned out of the engine at launch.
pub struct GenerationJob {
    pub generator: Arc<dyn BackgroundGenerator>,

    pub capture_pool: ImagePool,
    pub generate_pool: ImagePool,

    /// Size (w, h) the new background must have
    pub target_wh: (u32, u32),

    /// Generate pool slot the new background is written to
    pub slot: usize,

    pub png_compression: u8
}

/// Handle to an in-flight generation.
pub struct GenerationTask {
    handle: JoinHandle<Result<Option<usize>>>,
    slot: usize,
    started: Instant
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// How a finished generation ended.
#[derive(Debug)]
pub enum GenerationOutcome {
    /// A new background was written to the given generate pool slot
    Saved(usize),

    /// The strategy produced nothing usable, the current background stays
    NoImage,

    /// The worker errored or panicked
    Failed(String)
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl GenerationJob {
    /// Run the generation on the current thread.
    ///
    /// Returns the slot written, or `None` when the strategy produced no image or an image of
    /// the wrong size. In both cases the generate pool is left untouched.
    pub fn run(self) -> Result<Option<usize>> {
        let captures = self.capture_pool.iterate(true)?;
        let generates = self.generate_pool.iterate(true)?;
        let (width, height) = self.target_wh;

        let image = match self.generator.generate(captures, generates, width, height) {
            Some(img) => img,
            None => return Ok(None)
        };

        if image.dimensions() != self.target_wh {
            warn!(
                "{} generated a {:?} background for a {:?} video, discarding it",
                self.generator.name(),
                image.dimensions(),
                self.target_wh
            );
            return Ok(None);
        }

        self.generate_pool.save(self.slot, &image, self.png_compression)?;
        debug!("Generated background written to slot {}", self.slot);

        Ok(Some(self.slot))
    }
}

impl GenerationTask {
    /// Start the job on a new worker thread.
    pub fn launch(job: GenerationJob) -> Result<Self> {
        let slot = job.slot;

        let handle = thread::Builder::new()
            .name(String::from("bg-generate"))
            .spawn(move || job.run())
            .map_err(|e| Error::WorkerSpawnError(e))?;

        Ok(Self {
            handle,
            slot,
            started: Instant::now()
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Block until the worker finishes.
    pub fn join(self) -> GenerationOutcome {
        match self.handle.join() {
            Ok(Ok(Some(slot))) => GenerationOutcome::Saved(slot),
            Ok(Ok(None)) => GenerationOutcome::NoImage,
            Ok(Err(e)) => GenerationOutcome::Failed(e.to_string()),
            Err(_) => GenerationOutcome::Failed(String::from("generation worker panicked"))
        }
    }

    /// Wait at most `timeout` for the worker.
    ///
    /// Gives the task back if it is still running, there is no way to cancel it.
    pub fn join_timeout(self, timeout: Duration) -> std::result::Result<GenerationOutcome, Self> {
        let deadline = Instant::now() + timeout;

        while !self.is_finished() {
            if Instant::now() >= deadline {
                return Err(self);
            }
            thread::sleep(Duration::from_millis(10));
        }

        Ok(self.join())
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
