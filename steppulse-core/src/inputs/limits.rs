//! Limit switch inputs
//!
//! Limit edges either report immediately or, with software debounce,
//! arm a [`DebounceWindow`] on the tick timer and report the settled
//! state once the window expires. A window that settles to "no limit
//! active" is discarded silently.

use steppulse_hal::{InputPort, TickTimer};

use super::debounce::{DebounceWindow, DEBOUNCE_TICK_MS};
use super::input_polarity;
use crate::config::DriverConfig;
use crate::polarity::InputMap;
use crate::signals::{AxisSignals, N_AXIS};

/// Limit switch input group
pub struct LimitInputs<I, T> {
    port: I,
    timer: T,
    map: InputMap<N_AXIS>,
    window: DebounceWindow,
    software_debounce: bool,
}

impl<I: InputPort, T: TickTimer> LimitInputs<I, T> {
    pub fn new(port: I, timer: T, map: InputMap<N_AXIS>, software_debounce: bool) -> Self {
        Self {
            port,
            timer,
            map,
            window: DebounceWindow::new(),
            software_debounce,
        }
    }

    /// Apply pull and edge selection from the configuration
    pub fn configure(&mut self, cfg: &DriverConfig) {
        let (pull_up, rising) = input_polarity(
            cfg.limit_disable_pullup.bits(),
            cfg.invert.limit.bits(),
            AxisSignals::all().bits(),
        );

        self.port.configure_inputs(
            self.map.mask(),
            self.map.scatter(pull_up),
            self.map.scatter(rising),
        );
    }

    /// Current limit state, asserted = triggered
    pub fn get_state(&self, cfg: &DriverConfig) -> AxisSignals {
        AxisSignals::from_bits_truncate(self.map.gather(self.port.read_bits())) ^ cfg.invert.limit
    }

    /// Enable or disable the hard limit edge interrupt
    ///
    /// Stays disabled unless hard limits are enabled in the configuration.
    /// Disabling drops a running debounce window.
    pub fn enable(&mut self, on: bool, cfg: &DriverConfig) {
        let on = on && cfg.flags.hard_limit_enable;
        self.port.enable_interrupts(self.map.mask(), on);

        if !on && self.window.is_armed() {
            self.window.disarm();
            self.timer.stop();
        }
    }

    /// Check if a debounce window is running
    pub fn is_debouncing(&self) -> bool {
        self.window.is_armed()
    }

    /// Edge interrupt body
    ///
    /// Returns the state to report now, or `None` when nothing is pending
    /// or the report is deferred to the debounce window.
    pub fn on_edge(&mut self, cfg: &DriverConfig) -> Option<AxisSignals> {
        if self.port.take_pending(self.map.mask()) == 0 {
            return None;
        }

        if self.software_debounce {
            self.window.arm();
            self.timer.start(DEBOUNCE_TICK_MS);
            None
        } else {
            Some(self.get_state(cfg))
        }
    }

    /// Debounce tick interrupt body
    ///
    /// Returns the settled state when the window expires with a limit
    /// still active.
    pub fn on_debounce_tick(&mut self, cfg: &DriverConfig) -> Option<AxisSignals> {
        if !self.window.tick() {
            return None;
        }

        self.timer.stop();
        let state = self.get_state(cfg);
        (!state.is_empty()).then_some(state)
    }
}
