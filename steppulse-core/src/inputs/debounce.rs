//! Limit switch debounce window

/// Tick timer period used for debouncing, in milliseconds
pub const DEBOUNCE_TICK_MS: u16 = 16;

/// Number of ticks an input must stay quiet before it is sampled
pub const DEBOUNCE_TICKS: u8 = 3;

/// Countdown armed by input edges
///
/// Every edge re-arms the full window, so a bouncing switch is only
/// sampled once it has been quiet for [`DEBOUNCE_TICKS`] ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebounceWindow {
    remaining: u8,
}

impl DebounceWindow {
    pub const fn new() -> Self {
        Self { remaining: 0 }
    }

    /// Start (or restart) the window
    pub fn arm(&mut self) {
        self.remaining = DEBOUNCE_TICKS;
    }

    /// Check if a window is running
    pub fn is_armed(&self) -> bool {
        self.remaining > 0
    }

    /// Advance by one tick; returns `true` when the window expires
    pub fn tick(&mut self) -> bool {
        match self.remaining {
            0 => false,
            n => {
                self.remaining = n - 1;
                self.remaining == 0
            }
        }
    }

    /// Drop a running window without expiring it
    pub fn disarm(&mut self) {
        self.remaining = 0;
    }
}
