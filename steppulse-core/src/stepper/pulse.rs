//! Step pulse one-shot
//!
//! The step outputs and the pulse timer live apart from the rest of the
//! driver in a [`PulseChannel`]. The pulse interrupts only need this
//! channel, so a board can run them above the rate tick: the rate tick
//! holds the channel lock just long enough to assert the step bits and arm
//! the one-shot.
//!
//! Settings that the interrupt paths need (step inversion, width, delay)
//! are cached by [`StepPulse::configure`], so the handlers never read the
//! configuration snapshot.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use steppulse_hal::{OutputPort, PulseTimer};

use crate::config::DriverConfig;
use crate::polarity::{write_field, PortField};
use crate::signals::AxisSignals;

/// Step pulse one-shot state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulsePhase {
    /// Step lines idle
    Clear,
    /// Step lines asserted, waiting for the width timeout
    Pending,
    /// Direction written, step bits latched until the delay compare
    Delayed,
}

/// Step outputs plus the pulse timer
pub struct StepPulse<O, U> {
    port: O,
    timer: U,
    field: PortField,
    invert: u8,
    width_ticks: u16,
    delay_ticks: Option<u16>,
    phase: PulsePhase,
    latched: AxisSignals,
}

impl<O: OutputPort, U: PulseTimer> StepPulse<O, U> {
    pub fn new(port: O, timer: U, field: PortField) -> Self {
        Self {
            port,
            timer,
            field,
            invert: 0,
            width_ticks: 0,
            delay_ticks: None,
            phase: PulsePhase::Clear,
            latched: AxisSignals::empty(),
        }
    }

    /// Configure the step pins as outputs
    pub fn setup(&mut self) {
        self.port.configure_outputs(self.field.mask);
    }

    /// Take over pulse timing from a new configuration
    ///
    /// Selects immediate or delayed pulses and returns the step lines to
    /// idle.
    pub fn configure(&mut self, cfg: &DriverConfig) {
        self.invert = cfg.invert.step.bits();
        self.width_ticks = cfg.pulse.width_ticks;
        self.delay_ticks = cfg.pulse.delay_ticks;

        self.timer.set_delay(self.delay_ticks);
        self.timer
            .set_timeout(self.delay_ticks.unwrap_or(0) + self.width_ticks);
        self.set_outputs(AxisSignals::empty());
    }

    pub fn phase(&self) -> PulsePhase {
        self.phase
    }

    /// Pulses start through the delay compare
    pub fn is_delayed(&self) -> bool {
        self.delay_ticks.is_some()
    }

    /// Drive the step outputs
    pub fn set_outputs(&mut self, step: AxisSignals) {
        write_field(&mut self.port, self.field, step.bits(), self.invert);
    }

    /// Output a step using the configured pulse variant
    ///
    /// Direction must already be on the pins.
    pub fn start(&mut self, step: AxisSignals) {
        match self.delay_ticks {
            Some(delay) => self.start_delayed(step, delay),
            None => self.start_now(step),
        }
    }

    /// Assert the step outputs and arm the width timeout
    pub fn start_now(&mut self, step: AxisSignals) {
        self.set_outputs(step);
        self.timer.set_timeout(self.width_ticks);
        self.timer.start();
        self.phase = PulsePhase::Pending;
    }

    /// Latch the step bits until the delay compare fires
    pub fn start_delayed(&mut self, step: AxisSignals, delay: u16) {
        self.latched = step;
        self.timer.set_timeout(delay + self.width_ticks);
        self.timer.start();
        self.phase = PulsePhase::Delayed;
    }

    /// Delay compare: assert the latched step bits
    pub fn on_delay(&mut self) {
        if self.phase == PulsePhase::Delayed {
            self.set_outputs(self.latched);
            self.timer.extend_timeout(self.width_ticks);
            self.phase = PulsePhase::Pending;
        }
    }

    /// Width timeout: return the step lines to idle
    pub fn on_timeout(&mut self) {
        self.set_outputs(AxisSignals::empty());
        self.timer.stop();
        self.phase = PulsePhase::Clear;
    }
}

/// Lock around a [`StepPulse`] shared by the rate path and the pulse
/// interrupts
///
/// `M` is the lock held while the pulse is touched. It must keep the pulse
/// interrupts out while held, and nothing else needs to be blocked.
pub struct PulseChannel<M: RawMutex, O, U> {
    inner: Mutex<M, RefCell<Option<StepPulse<O, U>>>>,
}

impl<M: RawMutex, O, U> Default for PulseChannel<M, O, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, O, U> PulseChannel<M, O, U> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }
}

impl<M: RawMutex, O: OutputPort, U: PulseTimer> PulseChannel<M, O, U> {
    /// Hand the step outputs and pulse timer to the channel
    pub fn install(&self, pulse: StepPulse<O, U>) {
        self.inner.lock(|cell| cell.replace(Some(pulse)));
    }

    /// Run `f` on the pulse under the channel lock
    ///
    /// Returns `None` before [`install`](Self::install).
    pub fn with<R>(&self, f: impl FnOnce(&mut StepPulse<O, U>) -> R) -> Option<R> {
        self.inner.lock(|cell| {
            let mut pulse = cell.try_borrow_mut().ok()?;
            pulse.as_mut().map(f)
        })
    }

    /// Current phase, [`PulsePhase::Clear`] before install
    pub fn phase(&self) -> PulsePhase {
        self.with(|pulse| pulse.phase()).unwrap_or(PulsePhase::Clear)
    }

    /// Pulse timer compare 0 interrupt
    pub fn on_timeout(&self) {
        self.with(StepPulse::on_timeout);
    }

    /// Pulse timer compare 1 interrupt
    pub fn on_delay(&self) {
        self.with(StepPulse::on_delay);
    }
}
