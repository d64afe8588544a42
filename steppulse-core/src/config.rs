//! Derived driver configuration
//!
//! [`DriverConfig`] is everything the interrupt paths need from the user
//! settings, precomputed into timer ticks and register masks. It is built
//! once per settings change and published as an immutable snapshot through
//! [`ConfigCell`](crate::snapshot::ConfigCell).

use crate::driver::DriverCapabilities;
use crate::error::DriverError;
use crate::settings::{Settings, SettingsFlags};
use crate::signals::{AxisSignals, ControlSignals, CoolantState, SpindleState};
use crate::spindle::SpindlePwmConfig;

/// Number of 32-bit words in a packed [`DriverConfig`]
pub const CONFIG_WORDS: usize = 9;

/// Polarity masks applied at the register boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InversionMasks {
    pub step: AxisSignals,
    pub dir: AxisSignals,
    pub stepper_enable: AxisSignals,
    pub limit: AxisSignals,
    pub control: ControlSignals,
    pub spindle: SpindleState,
    pub coolant: CoolantState,
}

impl InversionMasks {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            step: settings.step_invert,
            dir: settings.dir_invert,
            stepper_enable: settings.stepper_enable_invert,
            limit: settings.limit_invert,
            control: settings.control_invert,
            spindle: settings.spindle_invert,
            coolant: settings.coolant_invert,
        }
    }
}

/// Step pulse timing in pulse timer ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseConfig {
    /// Step line assertion time
    pub width_ticks: u16,
    /// Direction-to-step delay, `None` for immediate pulses
    pub delay_ticks: Option<u16>,
}

impl PulseConfig {
    /// Convert pulse settings to timer ticks
    ///
    /// The delay is only used when the board supports it.
    pub fn new(settings: &Settings, caps: &DriverCapabilities) -> Result<Self, DriverError> {
        let per_us = caps.pulse_ticks_per_us as u32;
        let width = (settings.pulse_microseconds as u32 * per_us)
            .checked_sub(1)
            .filter(|ticks| *ticks <= u16::MAX as u32)
            .ok_or(DriverError::PulseWidthOutOfRange)?;

        let delay_ticks = if settings.pulse_delay_microseconds > 0 && caps.step_pulse_delay {
            let delay = settings.pulse_delay_microseconds as u32 * per_us;
            if delay + width > u16::MAX as u32 {
                return Err(DriverError::PulseDelayOutOfRange);
            }
            Some(delay as u16)
        } else {
            None
        };

        Ok(Self {
            width_ticks: width as u16,
            delay_ticks,
        })
    }
}

/// Immutable snapshot of all settings-derived driver constants
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    pub invert: InversionMasks,
    /// Axes whose drivers stay energized while idle
    pub stepper_deenergize: AxisSignals,
    pub limit_disable_pullup: AxisSignals,
    pub control_disable_pullup: ControlSignals,
    pub pulse: PulseConfig,
    pub spindle: SpindlePwmConfig,
    pub flags: SettingsFlags,
}

impl DriverConfig {
    /// Derive and validate a configuration from settings
    pub fn derive(settings: &Settings, caps: &DriverCapabilities) -> Result<Self, DriverError> {
        let pulse = PulseConfig::new(settings, caps)?;
        let spindle = if caps.variable_spindle {
            SpindlePwmConfig::new(settings, caps.pwm_clock_hz)?
        } else {
            SpindlePwmConfig::default()
        };

        Ok(Self {
            invert: InversionMasks::from_settings(settings),
            stepper_deenergize: settings.stepper_deenergize,
            limit_disable_pullup: settings.limit_disable_pullup,
            control_disable_pullup: settings.control_disable_pullup,
            pulse,
            spindle,
            flags: settings.flags,
        })
    }

    /// Flatten into words for [`ConfigCell`](crate::snapshot::ConfigCell)
    pub(crate) fn to_words(&self) -> [u32; CONFIG_WORDS] {
        let invert = &self.invert;
        let flags = self.flags.hard_limit_enable as u32
            | (self.flags.spindle_disable_with_zero_speed as u32) << 1
            | (self.flags.invert_probe_pin as u32) << 2
            | (self.pulse.delay_ticks.is_some() as u32) << 3;

        [
            invert.step.bits() as u32
                | (invert.dir.bits() as u32) << 8
                | (invert.stepper_enable.bits() as u32) << 16
                | (invert.limit.bits() as u32) << 24,
            invert.control.bits() as u32
                | (invert.spindle.bits() as u32) << 8
                | (invert.coolant.bits() as u32) << 16
                | (self.stepper_deenergize.bits() as u32) << 24,
            self.limit_disable_pullup.bits() as u32
                | (self.control_disable_pullup.bits() as u32) << 8
                | flags << 16,
            self.pulse.width_ticks as u32 | (self.pulse.delay_ticks.unwrap_or(0) as u32) << 16,
            self.spindle.period as u32 | (self.spindle.off_value as u32) << 16,
            self.spindle.min_value as u32 | (self.spindle.max_value as u32) << 16,
            self.spindle.pwm_gradient.to_bits(),
            self.spindle.rpm_min.to_bits(),
            self.spindle.rpm_max.to_bits(),
        ]
    }

    /// Rebuild from words written by [`to_words`](Self::to_words)
    pub(crate) fn from_words(words: &[u32; CONFIG_WORDS]) -> Self {
        let byte = |word: u32, index: u32| (word >> (index * 8)) as u8;
        let low = |word: u32| word as u16;
        let high = |word: u32| (word >> 16) as u16;
        let flags = byte(words[2], 2);

        Self {
            invert: InversionMasks {
                step: AxisSignals::from_bits_retain(byte(words[0], 0)),
                dir: AxisSignals::from_bits_retain(byte(words[0], 1)),
                stepper_enable: AxisSignals::from_bits_retain(byte(words[0], 2)),
                limit: AxisSignals::from_bits_retain(byte(words[0], 3)),
                control: ControlSignals::from_bits_retain(byte(words[1], 0)),
                spindle: SpindleState::from_bits_retain(byte(words[1], 1)),
                coolant: CoolantState::from_bits_retain(byte(words[1], 2)),
            },
            stepper_deenergize: AxisSignals::from_bits_retain(byte(words[1], 3)),
            limit_disable_pullup: AxisSignals::from_bits_retain(byte(words[2], 0)),
            control_disable_pullup: ControlSignals::from_bits_retain(byte(words[2], 1)),
            pulse: PulseConfig {
                width_ticks: low(words[3]),
                delay_ticks: (flags & 0b1000 != 0).then_some(high(words[3])),
            },
            spindle: SpindlePwmConfig {
                period: low(words[4]),
                off_value: high(words[4]),
                min_value: low(words[5]),
                max_value: high(words[5]),
                pwm_gradient: f32::from_bits(words[6]),
                rpm_min: f32::from_bits(words[7]),
                rpm_max: f32::from_bits(words[8]),
            },
            flags: SettingsFlags {
                hard_limit_enable: flags & 0b001 != 0,
                spindle_disable_with_zero_speed: flags & 0b010 != 0,
                invert_probe_pin: flags & 0b100 != 0,
            },
        }
    }
}
