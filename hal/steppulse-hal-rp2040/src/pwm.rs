//! Spindle PWM output
//!
//! Channel A of a PWM slice, clocked at 125 MHz / 40 = 3.125 MHz. A
//! disconnected output is modelled as a zero compare so the pin idles low.

use embassy_rp::pwm::{Config, Pwm};
use fixed::types::U12F4;
use steppulse_hal::PwmTimer;

use crate::SYS_CLOCK_HZ;

const DIVIDER: u16 = 40;

/// PWM counter clock
pub const PWM_CLOCK_HZ: u32 = SYS_CLOCK_HZ / DIVIDER as u32;

/// Spindle speed output on a PWM slice
pub struct SpindlePwm<'d> {
    pwm: Pwm<'d>,
    config: Config,
    compare: u16,
    connected: bool,
}

impl<'d> SpindlePwm<'d> {
    /// Wrap a slice driving the spindle pin on channel A
    pub fn new(pwm: Pwm<'d>) -> Self {
        let mut config = Config::default();
        config.divider = U12F4::from_num(DIVIDER);
        config.compare_a = 0;
        config.enable = false;

        let mut output = Self {
            pwm,
            config,
            compare: 0,
            connected: false,
        };
        output.apply();
        output
    }

    fn apply(&mut self) {
        self.config.compare_a = if self.connected { self.compare } else { 0 };
        self.pwm.set_config(&self.config);
    }
}

impl PwmTimer for SpindlePwm<'_> {
    fn set_period(&mut self, ticks: u16) {
        self.config.top = ticks.saturating_sub(1);
        self.apply();
    }

    fn set_compare(&mut self, ticks: u16) {
        self.compare = ticks;
        if self.connected {
            self.apply();
        }
    }

    fn set_output(&mut self, enabled: bool) {
        if self.connected != enabled {
            self.connected = enabled;
            self.apply();
        }
    }

    fn start(&mut self) {
        self.config.enable = true;
        self.apply();
    }
}
