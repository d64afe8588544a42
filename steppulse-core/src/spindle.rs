//! Spindle PWM rate controller
//!
//! Converts a commanded spindle speed (with override) into a PWM duty
//! value using a linear model between the configured minimum and maximum
//! speeds, and drives the enable/direction outputs.
//!
//! # Duty policy
//!
//! | Scaled speed                        | Duty              | Reported rpm |
//! |-------------------------------------|-------------------|--------------|
//! | `rpm_min >= rpm_max` or `>= rpm_max` | `max_value - 1`   | `rpm_max`    |
//! | exactly 0                           | `off_value`       | 0            |
//! | `<= rpm_min`                        | `min_value`       | `rpm_min`    |
//! | otherwise                           | linear, `< max_value` | scaled   |
//!
//! The top duty value is never used so that a full-scale compare can not
//! be mistaken for a disabled output.

use steppulse_hal::{OutputPort, PwmTimer};

use crate::error::DriverError;
use crate::settings::Settings;
use crate::signals::SpindleState;

/// PWM constants derived from settings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpindlePwmConfig {
    /// PWM period in timer ticks
    pub period: u16,
    /// Duty value that turns the spindle off
    pub off_value: u16,
    /// Duty value at `rpm_min`
    pub min_value: u16,
    /// Duty value at `rpm_max` (exclusive upper bound)
    pub max_value: u16,
    /// Duty ticks per rpm in the linear region
    pub pwm_gradient: f32,
    /// Spindle speed at `min_value`
    pub rpm_min: f32,
    /// Spindle speed at `max_value`
    pub rpm_max: f32,
}

/// Result of a speed to duty conversion
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpindleDuty {
    /// Value for the PWM compare register
    pub value: u16,
    /// Spindle speed the duty value corresponds to
    pub rpm: f32,
}

impl SpindlePwmConfig {
    /// Derive PWM constants from settings
    ///
    /// # Arguments
    /// - `settings`: user settings (frequency, duty percentages, rpm range)
    /// - `pwm_clock_hz`: PWM timer input clock
    pub fn new(settings: &Settings, pwm_clock_hz: u32) -> Result<Self, DriverError> {
        if !(settings.spindle_pwm_freq > 0.0) {
            return Err(DriverError::PwmFrequencyOutOfRange);
        }

        let period = (pwm_clock_hz as f32 / settings.spindle_pwm_freq) as u32;
        if period < 2 || period > u16::MAX as u32 {
            return Err(DriverError::PwmFrequencyOutOfRange);
        }

        let scale = |percent: f32| (period as f32 * percent / 100.0) as u16;
        let off_value = scale(settings.spindle_pwm_off_value);
        let min_value = scale(settings.spindle_pwm_min_value);
        let max_value = scale(settings.spindle_pwm_max_value);

        let pwm_gradient = if settings.rpm_max > settings.rpm_min {
            (max_value as f32 - min_value as f32) / (settings.rpm_max - settings.rpm_min)
        } else {
            0.0
        };

        Ok(Self {
            period: period as u16,
            off_value,
            min_value,
            max_value,
            pwm_gradient,
            rpm_min: settings.rpm_min,
            rpm_max: settings.rpm_max,
        })
    }

    /// Highest duty value ever programmed
    pub fn top_value(&self) -> u16 {
        self.max_value.saturating_sub(1)
    }

    /// Convert a commanded speed to a PWM duty value
    ///
    /// # Arguments
    /// - `rpm`: programmed spindle speed
    /// - `override_percent`: speed override (100 = as programmed)
    pub fn compute_duty(&self, rpm: f32, override_percent: u8) -> SpindleDuty {
        let rpm = rpm * (0.01 * override_percent as f32);

        if self.rpm_min >= self.rpm_max || rpm >= self.rpm_max {
            // No linear range possible, behave as a plain on/off spindle
            SpindleDuty {
                value: self.top_value(),
                rpm: self.rpm_max,
            }
        } else if rpm <= self.rpm_min {
            if rpm == 0.0 {
                SpindleDuty {
                    value: self.off_value,
                    rpm: 0.0,
                }
            } else {
                SpindleDuty {
                    value: self.min_value,
                    rpm: self.rpm_min,
                }
            }
        } else {
            // Operand is non-negative here, so truncation is floor
            let linear = ((rpm - self.rpm_min) * self.pwm_gradient) as u32 + self.min_value as u32;
            SpindleDuty {
                value: linear.min(self.top_value() as u32) as u16,
                rpm,
            }
        }
    }
}

/// Physical pins of the spindle outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpindlePins {
    /// Spindle enable output
    pub enable: u32,
    /// Spindle direction output (0 if not wired)
    pub direction: u32,
}

/// Spindle output controller
///
/// Owns the enable/direction port and the PWM timer. All methods run in
/// the calling context; interrupt handlers only reach [`set_speed`] through
/// the step pulse path.
///
/// [`set_speed`]: Spindle::set_speed
pub struct Spindle<P, W> {
    port: P,
    pwm: W,
    pins: SpindlePins,
    /// Variable speed (PWM) output available
    variable: bool,
    /// Direction output available
    has_direction: bool,
    /// PWM compare output currently driving the pin
    pwm_enabled: bool,
}

impl<P: OutputPort, W: PwmTimer> Spindle<P, W> {
    /// Create a new spindle controller
    pub fn new(port: P, pwm: W, pins: SpindlePins, variable: bool, has_direction: bool) -> Self {
        Self {
            port,
            pwm,
            pins,
            variable,
            has_direction: has_direction && pins.direction != 0,
            pwm_enabled: false,
        }
    }

    /// Configure output pins
    pub fn setup(&mut self) {
        self.port
            .configure_outputs(self.pins.enable | self.pins.direction);
    }

    /// Reprogram the PWM period after a settings change
    ///
    /// The compare output is left disconnected until the next speed command.
    pub fn configure(&mut self, cfg: &SpindlePwmConfig) {
        if self.variable {
            self.pwm.set_period(cfg.period);
            self.pwm.set_output(false);
            self.pwm.start();
            self.pwm_enabled = false;
        }
    }

    /// Check if the PWM output is currently active
    pub fn is_pwm_enabled(&self) -> bool {
        self.pwm_enabled
    }

    /// Check if this spindle has a variable speed output
    pub fn is_variable(&self) -> bool {
        self.variable
    }

    fn write_enable(&mut self, on: bool, invert: SpindleState) {
        let level = on != invert.contains(SpindleState::ON);
        self.port
            .write_bits(self.pins.enable, if level { self.pins.enable } else { 0 });
    }

    fn write_direction(&mut self, ccw: bool, invert: SpindleState) {
        if self.has_direction {
            let level = ccw != invert.contains(SpindleState::CCW);
            self.port
                .write_bits(self.pins.direction, if level { self.pins.direction } else { 0 });
        }
    }

    /// Apply a PWM duty value
    ///
    /// The off value disconnects the PWM output and, when configured,
    /// also drops the enable line. Any other value turns the enable line
    /// on and programs the compare register. Returns the applied value.
    pub fn set_speed(
        &mut self,
        duty: u16,
        cfg: &SpindlePwmConfig,
        invert: SpindleState,
        disable_with_zero_speed: bool,
    ) -> u16 {
        if duty == cfg.off_value {
            self.pwm_enabled = false;
            if disable_with_zero_speed {
                self.write_enable(false, invert);
            }
            self.pwm.set_output(false);
        } else {
            if !self.pwm_enabled {
                self.write_enable(true, invert);
            }
            self.pwm_enabled = true;
            self.pwm.set_compare(duty);
            self.pwm.set_output(true);
        }

        duty
    }

    /// Start or stop the spindle
    ///
    /// Turning on sets the direction before the speed. A direction change
    /// while the spindle is running stops it first so the motor is never
    /// reversed under power. Returns the applied duty, or `None` for an
    /// on/off spindle.
    pub fn set_state(
        &mut self,
        state: SpindleState,
        rpm: f32,
        override_percent: u8,
        cfg: &SpindlePwmConfig,
        invert: SpindleState,
        disable_with_zero_speed: bool,
    ) -> Option<SpindleDuty> {
        let off = !state.is_on() || (self.variable && rpm == 0.0);

        if off {
            if self.variable {
                self.set_speed(cfg.off_value, cfg, invert, disable_with_zero_speed);
            }
            self.write_enable(false, invert);
            return self.variable.then_some(SpindleDuty {
                value: cfg.off_value,
                rpm: 0.0,
            });
        }

        let current = self.get_state(invert);
        if current.is_on() && self.has_direction && current.is_ccw() != state.is_ccw() {
            if self.variable {
                self.set_speed(cfg.off_value, cfg, invert, disable_with_zero_speed);
            }
            self.write_enable(false, invert);
        }

        self.write_direction(state.is_ccw(), invert);

        if self.variable {
            let duty = cfg.compute_duty(rpm, override_percent);
            self.set_speed(duty.value, cfg, invert, disable_with_zero_speed);
            Some(duty)
        } else {
            self.write_enable(true, invert);
            None
        }
    }

    /// Read back the logical spindle state
    ///
    /// A running PWM output counts as on even when the enable line is not
    /// observable.
    pub fn get_state(&self, invert: SpindleState) -> SpindleState {
        let levels = self.port.read_bits();
        let mut state = SpindleState::empty();

        let enable_level = levels & self.pins.enable != 0;
        if self.pwm_enabled || enable_level != invert.contains(SpindleState::ON) {
            state |= SpindleState::ON;
        }

        if self.has_direction {
            let dir_level = levels & self.pins.direction != 0;
            if dir_level != invert.contains(SpindleState::CCW) {
                state |= SpindleState::CCW;
            }
        }

        state
    }
}
