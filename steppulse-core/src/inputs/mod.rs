//! Discrete inputs: limit switches, control buttons and the probe
//!
//! All inputs share the same configuration rule: a pin gets a pull-up
//! unless its pull-up is disabled, and its edge interrupt fires on the
//! rising edge when `!(disable_pullup ^ invert)` is set for it, on the
//! falling edge otherwise.

mod control;
mod debounce;
mod limits;
mod probe;

pub use control::{ControlInputs, N_CONTROL};
pub use debounce::{DebounceWindow, DEBOUNCE_TICKS, DEBOUNCE_TICK_MS};
pub use limits::LimitInputs;
pub use probe::Probe;

/// Logical pull-up and rising-edge selections for a group of inputs
///
/// Returns `(pull_up, rising)` restricted to `all`.
pub(crate) fn input_polarity(disable_pullup: u8, invert: u8, all: u8) -> (u8, u8) {
    (!disable_pullup & all, !(disable_pullup ^ invert) & all)
}
