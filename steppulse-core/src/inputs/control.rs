//! Control button inputs (reset, feed hold, cycle start, safety door)
//!
//! Control edges are never debounced: the realtime command layer needs
//! reset and feed hold with the lowest possible latency.
//!
//! Only the highest-priority asserted signal is reported per sample, in
//! the order reset, safety door, feed hold, cycle start. The polarity mask
//! is applied after that selection.

use steppulse_hal::InputPort;

use super::input_polarity;
use crate::config::DriverConfig;
use crate::polarity::InputMap;
use crate::signals::ControlSignals;

/// Number of control inputs
pub const N_CONTROL: usize = 4;

/// Control input group
pub struct ControlInputs<I> {
    port: I,
    /// Pins for RESET, FEED_HOLD, CYCLE_START, SAFETY_DOOR in bit order
    map: InputMap<N_CONTROL>,
}

impl<I: InputPort> ControlInputs<I> {
    pub fn new(port: I, map: InputMap<N_CONTROL>) -> Self {
        Self { port, map }
    }

    /// Apply pull and edge selection and (re-)enable the edge interrupt
    ///
    /// Edges flagged while reconfiguring are discarded.
    pub fn configure(&mut self, cfg: &DriverConfig) {
        let mask = self.map.mask();
        let (pull_up, rising) = input_polarity(
            cfg.control_disable_pullup.bits(),
            cfg.invert.control.bits(),
            ControlSignals::all().bits(),
        );

        self.port.enable_interrupts(mask, false);
        self.port
            .configure_inputs(mask, self.map.scatter(pull_up), self.map.scatter(rising));
        self.port.take_pending(mask);
        self.port.enable_interrupts(mask, true);
    }

    /// Current control state
    pub fn get_state(&self, cfg: &DriverConfig) -> ControlSignals {
        let raw = ControlSignals::from_bits_truncate(self.map.gather(self.port.read_bits()));
        raw.highest_priority() ^ cfg.invert.control
    }

    /// Edge interrupt body
    ///
    /// Returns the freshly sampled state if any control edge was pending.
    pub fn on_edge(&mut self, cfg: &DriverConfig) -> Option<ControlSignals> {
        (self.port.take_pending(self.map.mask()) != 0).then(|| self.get_state(cfg))
    }
}
