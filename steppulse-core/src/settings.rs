//! User settings consumed by the driver
//!
//! Storage of these values is owned by the external settings layer; the
//! driver only receives a fresh copy through
//! [`StepperHal::settings_changed`](crate::traits::StepperHal::settings_changed)
//! and derives its timer and PWM constants from it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::signals::{AxisSignals, ControlSignals, CoolantState, SpindleState};

/// Settings flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SettingsFlags {
    /// Limit switch edges raise a hard limit alarm
    pub hard_limit_enable: bool,
    /// Drop the spindle enable line when the commanded speed is zero
    pub spindle_disable_with_zero_speed: bool,
    /// Probe input is active-high
    pub invert_probe_pin: bool,
}

/// Driver-relevant subset of the controller settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Settings {
    /// Settings layout version
    pub version: u8,
    /// Step outputs that idle high
    pub step_invert: AxisSignals,
    /// Direction outputs that are inverted
    pub dir_invert: AxisSignals,
    /// Stepper enable outputs that are active-high
    pub stepper_enable_invert: AxisSignals,
    /// Axes whose drivers stay energized while idle
    pub stepper_deenergize: AxisSignals,
    /// Limit inputs that are active-high
    pub limit_invert: AxisSignals,
    /// Control inputs that are active-high
    pub control_invert: ControlSignals,
    /// Inverted spindle outputs
    pub spindle_invert: SpindleState,
    /// Inverted coolant outputs
    pub coolant_invert: CoolantState,
    /// Limit inputs without internal pull-up
    pub limit_disable_pullup: AxisSignals,
    /// Control inputs without internal pull-up
    pub control_disable_pullup: ControlSignals,
    /// Step pulse width in microseconds
    pub pulse_microseconds: u8,
    /// Delay between direction and step edges in microseconds (0 = none)
    pub pulse_delay_microseconds: u8,
    /// Spindle PWM frequency in Hz
    pub spindle_pwm_freq: f32,
    /// Spindle PWM duty when off, in percent
    pub spindle_pwm_off_value: f32,
    /// Spindle PWM duty at `rpm_min`, in percent
    pub spindle_pwm_min_value: f32,
    /// Spindle PWM duty at `rpm_max`, in percent
    pub spindle_pwm_max_value: f32,
    /// Spindle speed at minimum PWM duty
    pub rpm_min: f32,
    /// Spindle speed at maximum PWM duty
    pub rpm_max: f32,
    /// Flag bits
    pub flags: SettingsFlags,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: crate::driver::SETTINGS_VERSION,
            step_invert: AxisSignals::empty(),
            dir_invert: AxisSignals::empty(),
            stepper_enable_invert: AxisSignals::empty(),
            stepper_deenergize: AxisSignals::empty(),
            limit_invert: AxisSignals::empty(),
            control_invert: ControlSignals::empty(),
            spindle_invert: SpindleState::empty(),
            coolant_invert: CoolantState::empty(),
            limit_disable_pullup: AxisSignals::empty(),
            control_disable_pullup: ControlSignals::empty(),
            pulse_microseconds: 10,
            pulse_delay_microseconds: 0,
            spindle_pwm_freq: 5000.0,
            spindle_pwm_off_value: 0.0,
            spindle_pwm_min_value: 0.0,
            spindle_pwm_max_value: 100.0,
            rpm_min: 0.0,
            rpm_max: 1000.0,
            flags: SettingsFlags::default(),
        }
    }
}
