//! Touch probe input

use steppulse_hal::InputPort;

use crate::config::DriverConfig;

/// Probe input with a cycle-dependent polarity
///
/// The invert mask depends on both the probe pin setting and the probing
/// direction, so it is set by the motion layer at the start of every
/// probing cycle rather than derived from settings alone.
pub struct Probe<I> {
    port: I,
    pin: u32,
    invert: u32,
}

impl<I: InputPort> Probe<I> {
    pub fn new(port: I, pin: u32) -> Self {
        Self {
            port,
            pin,
            invert: pin,
        }
    }

    /// Configure the probe pin with a pull-up when the board has one
    pub fn configure(&mut self, pull_up: bool) {
        self.port
            .configure_inputs(self.pin, if pull_up { self.pin } else { 0 }, 0);
    }

    /// Select polarity for the next probing cycle
    ///
    /// A normally-high probe (the default) reads triggered when the pin is
    /// pulled low. Probing away from the workpiece flips the sense.
    pub fn configure_invert_mask(&mut self, is_probe_away: bool, cfg: &DriverConfig) {
        self.invert = if cfg.flags.invert_probe_pin { 0 } else { self.pin };
        if is_probe_away {
            self.invert ^= self.pin;
        }
    }

    /// Probe state, `true` = triggered
    pub fn get_state(&self) -> bool {
        (self.port.read_bits() & self.pin) ^ self.invert != 0
    }
}
