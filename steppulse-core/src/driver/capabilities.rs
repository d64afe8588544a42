//! Capability negotiation
//!
//! The external motion layer reads this record once at startup and adapts
//! to the board instead of compiling against a specific target.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Optional features and timing constants of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriverCapabilities {
    /// Spindle direction output present
    pub spindle_dir: bool,
    /// Spindle speed is PWM controlled
    pub variable_spindle: bool,
    /// Mist coolant output present
    pub mist_control: bool,
    /// Limit edges are debounced in software
    pub software_debounce: bool,
    /// Direction-to-step delay supported by the pulse timer
    pub step_pulse_delay: bool,
    /// Rate adaptation level; 0 means the driver prescales the rate timer
    pub amass_level: u8,
    /// Control inputs have internal pull-ups
    pub control_pull_up: bool,
    /// Limit inputs have internal pull-ups
    pub limits_pull_up: bool,
    /// Probe input has an internal pull-up
    pub probe_pull_up: bool,
    /// Rate timer input clock
    pub step_timer_hz: u32,
    /// Pulse timer ticks per microsecond
    pub pulse_ticks_per_us: u16,
    /// Spindle PWM timer input clock
    pub pwm_clock_hz: u32,
}

impl DriverCapabilities {
    /// Check if the planner handles rate adaptation itself
    pub fn has_amass(&self) -> bool {
        self.amass_level > 0
    }
}

impl Default for DriverCapabilities {
    /// Reference board: 24 MHz step timer, 5 MHz pulse timer, 3.125 MHz PWM
    fn default() -> Self {
        Self {
            spindle_dir: true,
            variable_spindle: true,
            mist_control: true,
            software_debounce: true,
            step_pulse_delay: true,
            amass_level: 3,
            control_pull_up: true,
            limits_pull_up: true,
            probe_pull_up: true,
            step_timer_hz: 24_000_000,
            pulse_ticks_per_us: 5,
            pwm_clock_hz: 3_125_000,
        }
    }
}
