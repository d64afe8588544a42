//! Driver dispatch interface
//!
//! This is the stable boundary between the motion layer and the board
//! driver. Everything a planner or interpreter needs from the hardware
//! goes through these methods; optional features are discovered through
//! [`capabilities`](StepperHal::capabilities) at startup.

use portable_atomic::AtomicU16;

use crate::atomic;
use crate::delay::DelayCallback;
use crate::driver::DriverCapabilities;
use crate::error::DriverError;
use crate::settings::Settings;
use crate::signals::{AxisSignals, ControlSignals, CoolantState, SpindleState};
use crate::spindle::SpindleDuty;
use crate::stepper::StepSegment;
use crate::traits::MotionEvents;

/// Operations exposed by a stepper driver
pub trait StepperHal {
    /// Optional features of this board
    fn capabilities(&self) -> &DriverCapabilities;

    /// Recompute derived constants and reprogram peripherals
    fn settings_changed(&mut self, settings: &Settings) -> Result<(), DriverError>;

    /// Wait for `ms` milliseconds
    ///
    /// With a callback this returns immediately and the callback runs from
    /// the tick interrupt. Without one it waits, polling
    /// [`MotionEvents::is_blocking_allowed`], and returns `false` if the
    /// wait was abandoned.
    fn delay_ms<E: MotionEvents>(
        &mut self,
        ms: u16,
        callback: Option<DelayCallback>,
        events: &mut E,
    ) -> bool;

    // Stepper

    /// Energize all drivers, start the rate timer and pull the first segment
    fn stepper_wake_up<E: MotionEvents>(&mut self, events: &mut E);

    /// Stop the rate timer
    fn stepper_go_idle(&mut self);

    /// Energize the drivers of `axes`, release the others
    fn stepper_enable(&mut self, axes: AxisSignals);

    /// Program the interval until the next rate tick
    fn stepper_cycles_per_tick(&mut self, cycles: u32);

    /// Output one step, syncing the spindle duty first
    fn stepper_pulse_start(&mut self, segment: &StepSegment);

    fn stepper_set_step_outputs(&mut self, step: AxisSignals);

    fn stepper_set_dir_outputs(&mut self, dir: AxisSignals);

    // Limits and control

    /// Enable or disable the hard limit interrupt
    fn limits_enable(&mut self, on: bool);

    fn limits_get_state(&self) -> AxisSignals;

    fn control_get_state(&self) -> ControlSignals;

    // Spindle

    /// Start, stop or reverse the spindle
    ///
    /// Returns the applied duty and the speed it corresponds to, or `None`
    /// for an on/off spindle.
    fn spindle_set_state(
        &mut self,
        state: SpindleState,
        rpm: f32,
        override_percent: u8,
    ) -> Option<SpindleDuty>;

    fn spindle_get_state(&self) -> SpindleState;

    /// Apply a PWM duty value, returning it
    fn spindle_set_speed(&mut self, duty: u16) -> u16;

    fn spindle_compute_duty(&self, rpm: f32, override_percent: u8) -> SpindleDuty;

    /// Duty value that turns the spindle off
    fn spindle_pwm_off(&self) -> u16;

    // Coolant and probe

    fn coolant_set_state(&mut self, state: CoolantState);

    fn coolant_get_state(&self) -> CoolantState;

    /// Probe state, `true` = triggered
    fn probe_get_state(&self) -> bool;

    fn probe_configure_invert_mask(&mut self, is_probe_away: bool);

    // Shared flag words

    fn set_bits_atomic(&self, word: &AtomicU16, bits: u16) {
        atomic::set_bits(word, bits);
    }

    fn clear_bits_atomic(&self, word: &AtomicU16, bits: u16) -> u16 {
        atomic::clear_bits(word, bits)
    }

    fn set_value_atomic(&self, word: &AtomicU16, value: u16) -> u16 {
        atomic::set_value(word, value)
    }
}
