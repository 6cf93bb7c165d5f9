//! # Periodic Timer Module
//!
//! A polled interval timer. The caller supplies the current time on every check, which keeps the
//! timer usable with both wall-clock (streams) and video-relative (files) timestamps.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rand::Rng;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Smallest allowed period, a zero period would fire on every check.
pub const MIN_PERIOD_MS: u64 = 1;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Fires whenever the time since the last firing exceeds the configured period.
///
/// Optionally a random jitter, redrawn after each firing, is added to the period so that many
/// cameras sharing a machine don't all capture (or generate) on the same frame.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period_ms: u64,

    last_trigger_ms: Option<u64>,

    trigger_on_first_check: bool,

    max_jitter_ms: Option<u64>,
    current_jitter_ms: u64
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl PeriodicTimer {
    /// Create a new timer with a one second period and no jitter.
    ///
    /// If `trigger_on_first_check` is true the very first check (and the first check after a
    /// reset) always fires, otherwise that check only records the reference time.
    pub fn new(trigger_on_first_check: bool) -> Self {
        Self {
            period_ms: MS_PER_SECOND,
            last_trigger_ms: None,
            trigger_on_first_check,
            max_jitter_ms: None,
            current_jitter_ms: 0
        }
    }

    /// Set the trigger period from its components.
    pub fn set_period(&mut self, hours: u64, minutes: u64, seconds: u64, milliseconds: u64) {
        self.set_period_ms(period_ms(hours, minutes, seconds, milliseconds));
    }

    /// Set the trigger period in milliseconds, floored to [`MIN_PERIOD_MS`].
    pub fn set_period_ms(&mut self, period_ms: u64) {
        self.period_ms = period_ms.max(MIN_PERIOD_MS);
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// The period the next firing will be judged against, including the current jitter.
    pub fn effective_period_ms(&self) -> u64 {
        self.period_ms.saturating_add(self.current_jitter_ms)
    }

    /// Add a random jitter in `[0, max_jitter_sec]` seconds to every period.
    pub fn enable_randomness(&mut self, max_jitter_sec: u64) {
        self.max_jitter_ms = Some(max_jitter_sec.saturating_mul(MS_PER_SECOND));
        self.draw_jitter();
    }

    pub fn disable_randomness(&mut self) {
        self.max_jitter_ms = None;
        self.current_jitter_ms = 0;
    }

    /// Forget the reference time, so the next check behaves like the first one.
    pub fn reset_timer(&mut self) {
        self.last_trigger_ms = None;
    }

    /// Check whether the timer should fire at `now_ms`.
    ///
    /// Firing records `now_ms` as the new reference time. Timestamps earlier than the reference
    /// (e.g. after a seek) never fire, call [`reset_timer`](Self::reset_timer) in that case.
    pub fn check_trigger(&mut self, now_ms: u64) -> bool {
        let last_trigger_ms = match self.last_trigger_ms {
            Some(t) => t,
            None => {
                self.last_trigger_ms = Some(now_ms);
                self.draw_jitter();
                return self.trigger_on_first_check;
            }
        };

        if now_ms.saturating_sub(last_trigger_ms) >= self.effective_period_ms() {
            self.last_trigger_ms = Some(now_ms);
            self.draw_jitter();
            true
        }
        else {
            false
        }
    }

    fn draw_jitter(&mut self) {
        self.current_jitter_ms = match self.max_jitter_ms {
            Some(0) | None => 0,
            Some(max) => rand::thread_rng().gen_range(0..=max)
        };
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Convert a period given as hours, minutes, seconds and milliseconds into milliseconds.
pub fn period_ms(hours: u64, minutes: u64, seconds: u64, milliseconds: u64) -> u64 {
    hours
        .saturating_mul(MS_PER_HOUR)
        .saturating_add(minutes.saturating_mul(MS_PER_MINUTE))
        .saturating_add(seconds.saturating_mul(MS_PER_SECOND))
        .saturating_add(milliseconds)
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
