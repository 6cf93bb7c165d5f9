//! # Configuration Module
//!
//! Turns a user facing configuration, a strategy name plus a bag of numeric slider controls,
//! into the [`Strategy`] and [`EngineSettings`] the engine runs with.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::collections::HashMap;

use log::{debug, warn};
use serde::Deserialize;

use crate::engine::{EngineSettings, SavingSettings};
use crate::error::{Error, Result};
use crate::strategy::{MedianParams, RollingAverageParams, Strategy};
use crate::timer::period_ms;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Shortest capture period that can come out of the controls.
const MIN_CAPTURE_PERIOD_MS: u64 = 1000;

/// Capture timing controls read by every strategy.
const CAPTURE_CONTROLS: &[&str] = &[
    "capture_period_hr",
    "capture_period_min",
    "capture_period_sec",
    "capture_jitter_sec"
];

/// Every available strategy, by configuration name.
static STRATEGY_REGISTRY: &[RegisteredStrategy] = &[
    RegisteredStrategy {
        name: "reference",
        factory: setup_reference,
        controls: &[]
    },
    RegisteredStrategy {
        name: "median",
        factory: setup_median,
        controls: &["generate_every_n_captures", "min_captures_to_use", "max_captures_to_use"]
    },
    RegisteredStrategy {
        name: "rolling_average",
        factory: setup_rolling_average,
        controls: &["update_weighting"]
    },
    RegisteredStrategy {
        name: "passthrough",
        factory: setup_passthrough,
        controls: &[]
    }
];

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Function deriving a full setup from the raw controls.
pub type StrategyFactory = fn(&Controls, SavingSettings) -> StrategySetup;

/// Contents of a background capture configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundCaptureConfig {
    /// Registry name of the strategy, e.g. `"median"`
    pub strategy: String,

    #[serde(default)]
    pub controls: Controls,

    #[serde(default)]
    pub saving: SavingSettings
}

/// Raw numeric control values keyed by control name.
///
/// Missing controls fall back to the strategy's default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Controls(HashMap<String, f64>);

/// Registry entry, the controls listed are the ones its factory reads besides
/// [`CAPTURE_CONTROLS`].
struct RegisteredStrategy {
    name: &'static str,
    factory: StrategyFactory,
    controls: &'static [&'static str]
}

/// A strategy along with the engine settings it wants to be run with.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySetup {
    pub strategy: Strategy,
    pub settings: EngineSettings
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl BackgroundCaptureConfig {
    /// Config for the named strategy using all its default controls.
    pub fn new(strategy: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            controls: Controls::default(),
            saving: SavingSettings::default()
        }
    }

    /// Resolve the strategy and derive its setup.
    ///
    /// Controls the strategy doesn't read are ignored with a warning.
    pub fn setup(&self) -> Result<StrategySetup> {
        let entry = find_strategy(&self.strategy)?;

        for key in self.controls.unknown_keys(&strategy_controls(entry)) {
            warn!("Control {:?} is not used by the {} strategy, ignoring it", key, entry.name);
        }

        let setup = (entry.factory)(&self.controls, self.saving);

        debug!("Configured {} strategy: {:?}", self.strategy, setup);

        Ok(setup)
    }
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);

        self
    }

    /// Get a float control clamped into `[min, max]`.
    pub fn float(&self, name: &str, default: f64, min: f64, max: f64) -> f64 {
        match self.0.get(name) {
            Some(v) if v.is_finite() => v.max(min).min(max),
            _ => default
        }
    }

    /// Names of the set controls which aren't in `known`, sorted.
    pub fn unknown_keys(&self, known: &[&str]) -> Vec<String> {
        let mut keys: Vec<String> = self
            .0
            .keys()
            .filter(|k| !known.contains(&k.as_str()))
            .cloned()
            .collect();
        keys.sort();

        keys
    }

    /// Get an integer control clamped into `[min, max]`, rounding any fractional value.
    pub fn int(&self, name: &str, default: usize, min: usize, max: usize) -> usize {
        self.float(name, default as f64, min as f64, max as f64).round() as usize
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Find the factory for a strategy name.
pub fn lookup_strategy(name: &str) -> Result<StrategyFactory> {
    find_strategy(name).map(|entry| entry.factory)
}

/// Names of every control the named strategy reads.
pub fn controls_for(name: &str) -> Result<Vec<&'static str>> {
    find_strategy(name).map(strategy_controls)
}

/// Names of every registered strategy.
pub fn strategy_names() -> Vec<&'static str> {
    STRATEGY_REGISTRY.iter().map(|entry| entry.name).collect()
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn find_strategy(name: &str) -> Result<&'static RegisteredStrategy> {
    STRATEGY_REGISTRY
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| Error::UnknownStrategy(name.to_string()))
}

fn strategy_controls(entry: &RegisteredStrategy) -> Vec<&'static str> {
    CAPTURE_CONTROLS.iter().chain(entry.controls.iter()).copied().collect()
}

fn setup_reference(controls: &Controls, saving: SavingSettings) -> StrategySetup {
    StrategySetup {
        strategy: Strategy::Reference,
        settings: EngineSettings {
            capture_period_ms: capture_period_ms(controls, 1.0),
            capture_jitter_sec: capture_jitter_sec(controls),
            generate_every_n_captures: 1,
            max_capture_count: 10,
            max_generate_count: 5,
            saving
        }
    }
}

fn setup_median(controls: &Controls, saving: SavingSettings) -> StrategySetup {
    let defaults = MedianParams::default();

    let min_captures_to_use = controls.int("min_captures_to_use", defaults.min_captures_to_use, 3, 50);
    let max_captures_to_use = controls
        .int("max_captures_to_use", defaults.max_captures_to_use, 3, 50)
        .max(min_captures_to_use);

    StrategySetup {
        strategy: Strategy::Median(MedianParams {
            min_captures_to_use,
            max_captures_to_use
        }),
        settings: EngineSettings {
            capture_period_ms: capture_period_ms(controls, 15.0),
            capture_jitter_sec: capture_jitter_sec(controls),
            generate_every_n_captures: controls.int("generate_every_n_captures", 4, 1, 100),
            max_capture_count: max_captures_to_use,
            max_generate_count: 15,
            saving
        }
    }
}

fn setup_rolling_average(controls: &Controls, saving: SavingSettings) -> StrategySetup {
    let defaults = RollingAverageParams::default();

    StrategySetup {
        strategy: Strategy::RollingAverage(RollingAverageParams {
            update_weighting: controls.float("update_weighting", defaults.update_weighting, 0.01, 1.0)
        }),
        settings: EngineSettings {
            capture_period_ms: capture_period_ms(controls, 10.0),
            capture_jitter_sec: capture_jitter_sec(controls),
            generate_every_n_captures: 1,
            max_capture_count: 3,
            max_generate_count: 3,
            saving
        }
    }
}

fn setup_passthrough(controls: &Controls, saving: SavingSettings) -> StrategySetup {
    StrategySetup {
        strategy: Strategy::Passthrough,
        settings: EngineSettings {
            capture_period_ms: capture_period_ms(controls, 60.0),
            capture_jitter_sec: capture_jitter_sec(controls),
            generate_every_n_captures: 1,
            max_capture_count: 10,
            max_generate_count: 5,
            saving
        }
    }
}

/// Capture period from the hour, minute and second controls, never shorter than a second.
fn capture_period_ms(controls: &Controls, default_min: f64) -> u64 {
    let hours = controls.int("capture_period_hr", 0, 0, 24) as u64;
    let minutes = controls.float("capture_period_min", default_min, 0.0, 60.0);
    let seconds = controls.float("capture_period_sec", 0.0, 0.0, 60.0);

    let sub_hour_ms = ((minutes * 60.0 + seconds) * 1000.0).round() as u64;

    period_ms(hours, 0, 0, sub_hour_ms).max(MIN_CAPTURE_PERIOD_MS)
}

fn capture_jitter_sec(controls: &Controls) -> Option<u64> {
    match controls.int("capture_jitter_sec", 0, 0, 3600) {
        0 => None,
        j => Some(j as u64)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use crate::strategy::StrategyKind;

    #[test]
    fn test_registry() {
        assert_eq!(strategy_names(), vec!["reference", "median", "rolling_average", "passthrough"]);

        for name in strategy_names() {
            let setup = BackgroundCaptureConfig::new(name).setup().unwrap();
            assert_eq!(setup.strategy.kind().to_string(), name);
        }

        assert!(matches!(lookup_strategy("mean"), Err(Error::UnknownStrategy(_))));
    }

    #[test]
    fn test_median_defaults() {
        let setup = BackgroundCaptureConfig::new("median").setup().unwrap();

        assert_eq!(setup.strategy, Strategy::Median(MedianParams::default()));
        assert_eq!(setup.settings.capture_period_ms, 15 * 60 * 1000);
        assert_eq!(setup.settings.generate_every_n_captures, 4);
        assert_eq!(setup.settings.max_capture_count, 25);
        assert_eq!(setup.settings.max_generate_count, 15);
        assert_eq!(setup.settings.capture_jitter_sec, None);
        assert_eq!(setup.settings.saving, SavingSettings::default());
    }

    /// Out of range controls are clamped, never rejected
    #[test]
    fn test_controls_clamped() {
        let mut config = BackgroundCaptureConfig::new("median");
        config.controls = Controls::new()
            .set("min_captures_to_use", 1.0)
            .set("max_captures_to_use", 400.0)
            .set("capture_period_min", 0.0)
            .set("capture_jitter_sec", 30.0);

        let setup = config.setup().unwrap();
        match setup.strategy {
            Strategy::Median(p) => {
                assert_eq!(p.min_captures_to_use, 3);
                assert_eq!(p.max_captures_to_use, 50);
            },
            other => panic!("unexpected strategy {:?}", other)
        }
        assert_eq!(setup.settings.capture_period_ms, 1000);
        assert_eq!(setup.settings.capture_jitter_sec, Some(30));

        let mut config = BackgroundCaptureConfig::new("rolling_average");
        config.controls = Controls::new().set("update_weighting", 5.0);
        let setup = config.setup().unwrap();
        assert_eq!(setup.strategy.kind(), StrategyKind::RollingAverage);
        assert_eq!(
            setup.strategy,
            Strategy::RollingAverage(RollingAverageParams { update_weighting: 1.0 })
        );
        assert_eq!(setup.settings.max_capture_count, 3);
    }

    #[test]
    fn test_deserialise() {
        let text = r#"{
            "strategy": "rolling_average",
            "controls": { "capture_period_min": 0.5 },
            "saving": { "threaded_saving": false, "jpg_quality": 80 }
        }"#;

        let config: BackgroundCaptureConfig = serde_json::from_str(text).unwrap();
        let setup = config.setup().unwrap();

        assert_eq!(setup.settings.capture_period_ms, 30_000);
        assert!(!setup.settings.saving.threaded_saving);
        assert!(setup.settings.saving.report_saving);
        assert_eq!(setup.settings.saving.jpg_quality, 80);
    }

    #[test]
    fn test_capture_period_units() {
        let mut config = BackgroundCaptureConfig::new("rolling_average");
        config.controls = Controls::new()
            .set("capture_period_hr", 2.0)
            .set("capture_period_min", 0.0);
        assert_eq!(config.setup().unwrap().settings.capture_period_ms, 2 * 60 * 60 * 1000);

        config.controls = Controls::new()
            .set("capture_period_hr", 1.0)
            .set("capture_period_min", 30.0)
            .set("capture_period_sec", 15.0);
        assert_eq!(config.setup().unwrap().settings.capture_period_ms, 5_415_000);

        // Seconds alone, still floored at a second
        config.controls = Controls::new()
            .set("capture_period_min", 0.0)
            .set("capture_period_sec", 45.0);
        assert_eq!(config.setup().unwrap().settings.capture_period_ms, 45_000);

        config.controls = Controls::new()
            .set("capture_period_min", 0.0)
            .set("capture_period_sec", 0.2);
        assert_eq!(config.setup().unwrap().settings.capture_period_ms, 1000);

        // Out of range units are clamped
        config.controls = Controls::new()
            .set("capture_period_hr", 100.0)
            .set("capture_period_min", 0.0);
        assert_eq!(config.setup().unwrap().settings.capture_period_ms, 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_unknown_controls() {
        let controls = Controls::new()
            .set("capture_period_hour", 1.0)
            .set("update_weighting", 0.5)
            .set("min_captures_to_use", 5.0)
            .set("capture_period_sec", 10.0);

        let median = controls_for("median").unwrap();
        assert!(median.contains(&"capture_period_hr"));
        assert!(median.contains(&"max_captures_to_use"));
        assert!(!median.contains(&"update_weighting"));
        assert_eq!(controls.unknown_keys(&median), vec!["capture_period_hour", "update_weighting"]);

        let reference = controls_for("reference").unwrap();
        assert_eq!(
            controls.unknown_keys(&reference),
            vec!["capture_period_hour", "min_captures_to_use", "update_weighting"]
        );

        assert!(matches!(controls_for("mean"), Err(Error::UnknownStrategy(_))));

        // Unused controls are only warned about
        let mut config = BackgroundCaptureConfig::new("median");
        config.controls = controls;
        let setup = config.setup().unwrap();
        assert_eq!(setup.settings.capture_period_ms, 15 * 60 * 1000 + 10_000);
    }
}
