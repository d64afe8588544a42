//! Rate timer programming
//!
//! The planner asks for the next tick `cycles` step-timer clocks away.
//! A 16-bit countdown can only represent up to 65535 clocks, so longer
//! intervals are either capped (the planner does its own multi-rate
//! smoothing) or reached by switching the timer input divider.

use steppulse_hal::Prescaler;

/// Largest value the rate timer countdown register holds
pub const MAX_PERIOD: u16 = u16::MAX;

const DIV8_LIMIT: u32 = 1 << 19;
const DIV1_LIMIT: u32 = 1 << 16;

/// Rate adaptation policy, fixed at driver setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RateMode {
    /// Planner smooths slow rates itself; the timer always runs at full clock
    Amass,
    /// The driver selects a clock divider from the interval magnitude
    Prescaled,
}

impl RateMode {
    /// Select the policy for a negotiated AMASS level
    pub fn for_level(amass_level: u8) -> Self {
        if amass_level == 0 {
            RateMode::Prescaled
        } else {
            RateMode::Amass
        }
    }
}

/// Register values for one rate timer period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerProgram {
    pub prescaler: Prescaler,
    pub period: u16,
}

impl TimerProgram {
    /// Longest possible period at full clock, used to prime the timer
    pub const SLOWEST: TimerProgram = TimerProgram {
        prescaler: Prescaler::Div1,
        period: MAX_PERIOD,
    };

    /// Interval in step-timer clocks actually produced by this program
    pub fn cycles(&self) -> u32 {
        (self.period as u32) << self.prescaler.shift()
    }
}

fn clamp(cycles: u32) -> u16 {
    cycles.min(MAX_PERIOD as u32) as u16
}

/// Compute the rate timer program for an interval
pub fn timer_program(mode: RateMode, cycles: u32) -> TimerProgram {
    let prescaler = match mode {
        RateMode::Amass => Prescaler::Div1,
        RateMode::Prescaled if cycles < DIV1_LIMIT => Prescaler::Div1,
        RateMode::Prescaled if cycles < DIV8_LIMIT => Prescaler::Div8,
        RateMode::Prescaled => Prescaler::Div64,
    };

    TimerProgram {
        prescaler,
        period: clamp(cycles >> prescaler.shift()),
    }
}
