//! # Background Generation Strategies
//!
//! This module provides the algorithms used to compute a new background image from the capture
//! and generate pools. Strategies run on the generation worker, so they only ever see snapshots
//! of the pools and communicate solely through their return value.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use derive_more::Display;
use image::{Rgb, RgbImage};
use log::{debug, warn};
use ndarray::{Array2, ArrayView1, Axis};
use rand::Rng;
use serde::Deserialize;

use crate::store::PoolImages;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Capability shared by everything which can produce a new background.
pub trait BackgroundGenerator: Send + Sync {
    /// Compute a new background of the target size.
    ///
    /// `captures` and `generates` yield the pool contents newest first. Returning `None` signals
    /// that no new background could be made and the current one should be kept.
    fn generate(
        &self,
        captures: PoolImages,
        generates: PoolImages,
        target_width: u32,
        target_height: u32
    ) -> Option<RgbImage>;

    /// Name used in logs and report metadata.
    fn name(&self) -> String {
        String::from("custom")
    }
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Parameters for the median strategy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MedianParams {
    /// Generation is skipped until at least this many captures are available
    pub min_captures_to_use: usize,

    /// At most this many of the newest captures are combined
    pub max_captures_to_use: usize
}

/// Parameters for the rolling average strategy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RollingAverageParams {
    /// Weight of the newest capture, the previous background gets `1 - update_weighting`
    pub update_weighting: f64
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// The available background generation strategies, each owning its tunable parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Uniform random noise, only useful for checking the capture/generate plumbing
    Reference,

    /// Per-pixel median over the newest captures
    Median(MedianParams),

    /// Weighted blend of the newest capture into the newest background
    RollingAverage(RollingAverageParams),

    /// Never regenerates, the initial background is kept indefinitely
    Passthrough
}

/// Parameter-free identifier of a [`Strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StrategyKind {
    #[display(fmt = "reference")]
    Reference,

    #[display(fmt = "median")]
    Median,

    #[display(fmt = "rolling_average")]
    RollingAverage,

    #[display(fmt = "passthrough")]
    Passthrough
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for MedianParams {
    fn default() -> Self {
        Self {
            min_captures_to_use: 7,
            max_captures_to_use: 25
        }
    }
}

impl Default for RollingAverageParams {
    fn default() -> Self {
        Self {
            update_weighting: 0.15
        }
    }
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Reference => StrategyKind::Reference,
            Strategy::Median(_) => StrategyKind::Median,
            Strategy::RollingAverage(_) => StrategyKind::RollingAverage,
            Strategy::Passthrough => StrategyKind::Passthrough
        }
    }
}

impl BackgroundGenerator for Strategy {
    fn generate(
        &self,
        captures: PoolImages,
        generates: PoolImages,
        target_width: u32,
        target_height: u32
    ) -> Option<RgbImage> {
        match self {
            Strategy::Reference => Some(random_noise(target_width, target_height)),
            Strategy::Median(p) => median_from_captures(p, captures, target_width, target_height),
            Strategy::RollingAverage(p) => {
                rolling_average(p, captures, generates, target_width, target_height)
            },
            Strategy::Passthrough => None
        }
    }

    fn name(&self) -> String {
        self.kind().to_string()
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Per-pixel median of a set of equally sized frames.
///
/// For an even number of frames the two middle values are averaged and rounded half to even.
/// Returns `None` for an empty set or mismatched frame sizes.
pub fn median_of(frames: &[RgbImage]) -> Option<RgbImage> {
    let (width, height) = frames.first()?.dimensions();
    if frames.iter().any(|f| f.dimensions() != (width, height)) {
        return None;
    }

    let num_values = frames[0].as_raw().len();
    let mut data = Vec::with_capacity(num_values * frames.len());
    for frame in frames {
        data.extend_from_slice(frame.as_raw());
    }

    let stack = Array2::from_shape_vec((frames.len(), num_values), data).ok()?;

    let mut lane_values = Vec::with_capacity(frames.len());
    let medians = stack.map_axis(Axis(0), |lane| {
        lane_values.clear();
        lane_values.extend(lane.iter().copied());
        lane_values.sort_unstable();
        median_of_sorted(&lane_values)
    });

    RgbImage::from_raw(width, height, medians.iter().copied().collect())
}

/// `weighting * newest + (1 - weighting) * previous`, rounded to the nearest pixel value.
pub fn weighted_blend(newest: &RgbImage, previous: &RgbImage, weighting: f64) -> Option<RgbImage> {
    if newest.dimensions() != previous.dimensions() {
        return None;
    }

    let weighting = weighting.max(0.0).min(1.0);
    let newest_values = ArrayView1::from(newest.as_raw().as_slice()).mapv(f64::from);
    let previous_values = ArrayView1::from(previous.as_raw().as_slice()).mapv(f64::from);

    let blended = newest_values * weighting + previous_values * (1.0 - weighting);

    let (width, height) = newest.dimensions();
    RgbImage::from_raw(
        width,
        height,
        blended.iter().map(|v| v.round().max(0.0).min(255.0) as u8).collect()
    )
}

/// Uniform random noise of the given size.
pub fn random_noise(width: u32, height: u32) -> RgbImage {
    let mut rng = rand::thread_rng();

    RgbImage::from_fn(width, height, |_, _| Rgb(rng.gen::<[u8; 3]>()))
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn median_from_captures(
    params: &MedianParams,
    captures: PoolImages,
    target_width: u32,
    target_height: u32
) -> Option<RgbImage> {
    let available = captures.len();
    if available < params.min_captures_to_use {
        debug!(
            "Not enough captures for a median background ({} of {})",
            available, params.min_captures_to_use
        );
        return None;
    }

    let frames = load_valid_captures(
        captures,
        params.max_captures_to_use.max(1),
        target_width,
        target_height
    );
    if frames.len() < params.min_captures_to_use {
        warn!(
            "Only {} of {} captures are usable for a median background",
            frames.len(), available
        );
        return None;
    }

    median_of(&frames)
}

fn rolling_average(
    params: &RollingAverageParams,
    mut captures: PoolImages,
    mut generates: PoolImages,
    target_width: u32,
    target_height: u32
) -> Option<RgbImage> {
    let target = (target_width, target_height);

    let newest_capture = match captures.next() {
        Some(img) if img.dimensions() == target => img,
        Some(_) => {
            warn!("Newest capture doesn't match the video size, skipping rolling average");
            return None;
        },
        None => {
            debug!("No capture available for rolling average background");
            return None;
        }
    };

    let newest_generate = match generates.next() {
        Some(img) if img.dimensions() == target => img,
        Some(_) => {
            warn!("Newest background doesn't match the video size, skipping rolling average");
            return None;
        },
        None => {
            debug!("No previous background available for rolling average");
            return None;
        }
    };

    weighted_blend(&newest_capture, &newest_generate, params.update_weighting)
}

/// Take up to `max_count` captures of the target size, newest first.
fn load_valid_captures(
    captures: PoolImages,
    max_count: usize,
    target_width: u32,
    target_height: u32
) -> Vec<RgbImage> {
    captures
        .filter(|img| img.dimensions() == (target_width, target_height))
        .take(max_count)
        .collect()
}

fn median_of_sorted(values: &[u8]) -> u8 {
    let mid = values.len() / 2;

    if values.len() % 2 == 1 {
        return values[mid];
    }

    let sum = u16::from(values[mid - 1]) + u16::from(values[mid]);
    let half = sum / 2;

    // Exact .5 cases round to the even neighbour
    if sum % 2 == 1 && half % 2 == 1 {
        (half + 1) as u8
    }
    else {
        half as u8
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
