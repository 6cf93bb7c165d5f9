//! # Bounded Counter Module
//!
//! Wraparound counter used both to index ring-buffer file slots and as an "every N events"
//! trigger.

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// An integer counter which wraps back to zero on reaching its reset value.
///
/// The count always lies in `[0, reset_value)`.
#[derive(Debug, Clone)]
pub struct BoundedCounter {
    count: usize,
    reset_value: usize,

    /// If set, the first update after creation or reset reports a wrap without counting.
    reset_on_first_check: bool,
    first_check_pending: bool
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl BoundedCounter {
    pub fn new(reset_value: usize, reset_on_first_check: bool) -> Self {
        Self {
            count: 0,
            reset_value: reset_value.max(1),
            reset_on_first_check,
            first_check_pending: true
        }
    }

    /// Set the wraparound bound, minimum 1. The current count is brought back into range.
    pub fn set_count_reset_value(&mut self, reset_value: usize) {
        self.reset_value = reset_value.max(1);
        self.count %= self.reset_value;
    }

    pub fn reset_value(&self) -> usize {
        self.reset_value
    }

    /// Advance the counter, returning true if it wrapped back to zero.
    pub fn update_count(&mut self) -> bool {
        if self.first_check_pending {
            self.first_check_pending = false;
            if self.reset_on_first_check {
                return true;
            }
        }

        self.count = (self.count + 1) % self.reset_value;

        self.count == 0
    }

    pub fn get_current_count(&self) -> usize {
        self.count
    }

    /// The count the next call to [`update_count`](Self::update_count) will produce.
    pub fn peek_next_count(&self) -> usize {
        if self.first_check_pending && self.reset_on_first_check {
            self.count
        }
        else {
            (self.count + 1) % self.reset_value
        }
    }

    /// Jump straight to a count, e.g. to resume slot numbering from files already on disk.
    pub fn set_count(&mut self, count: usize) {
        self.count = count % self.reset_value;
        self.first_check_pending = false;
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.first_check_pending = true;
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
