//! Rate timer on a PWM slice
//!
//! The slice runs free with its output unconnected and raises
//! `PWM_IRQ_WRAP` each time the counter wraps at `top`.
//!
//! `TOP` is double-buffered while the slice runs, so a plain write would
//! only shape the period after the one in progress. [`PwmRateTimer`]
//! pauses the slice for the write instead: a stopped slice latches `TOP`
//! directly, and the counter is kept so the period in progress still
//! counts from the last wrap.
//!
//! The prescaler
//! multiplies a base divider of 2.5, which gives a 50 MHz step timer clock
//! at the default system clock and keeps the Div64 divider (160) inside the
//! 8.4 bit hardware range.

use embassy_rp::pac;
use embassy_rp::pwm::{Config, Pwm};
use fixed::types::U12F4;
use steppulse_hal::{Prescaler, RateTimer};

use crate::SYS_CLOCK_HZ;

/// Base clock divider at Div1, in sixteenths
const BASE_DIVIDER_X16: u32 = 40;

/// Step timer clock at Div1
pub const STEP_TIMER_HZ: u32 = SYS_CLOCK_HZ * 16 / BASE_DIVIDER_X16;

fn divider(prescaler: Prescaler) -> U12F4 {
    U12F4::from_bits((BASE_DIVIDER_X16 * prescaler.divisor()) as u16)
}

/// Counter value to resume from after `top` changed under a running count
///
/// A counter already past the new top would otherwise run on to 0xffff
/// before wrapping; parking it on `top` wraps on the next tick instead.
fn resume_count(ctr: u16, top: u16) -> u16 {
    ctr.min(top)
}

/// Acknowledge a wrap of `slice`, returning whether it was pending
///
/// Called first thing in the `PWM_IRQ_WRAP` handler.
pub fn take_wrap(slice: usize) -> bool {
    let pending = pac::PWM.ints().read().0 & (1 << slice) != 0;
    if pending {
        pac::PWM.intr().write(|w| w.0 = 1 << slice);
    }
    pending
}

/// Periodic interrupt source for the stepper rate
pub struct PwmRateTimer<'d> {
    pwm: Pwm<'d>,
    slice: usize,
    config: Config,
}

impl<'d> PwmRateTimer<'d> {
    /// Wrap a free-running slice
    ///
    /// `slice` is the number of the PWM slice `pwm` was created on.
    pub fn new(pwm: Pwm<'d>, slice: usize) -> Self {
        let mut config = Config::default();
        config.divider = divider(Prescaler::Div1);
        config.top = u16::MAX;
        config.enable = false;

        let mut timer = Self { pwm, slice, config };
        timer.apply();
        timer
    }

    fn apply(&mut self) {
        self.pwm.set_config(&self.config);
    }

    fn set_irq(&self, enable: bool) {
        pac::PWM.inte().modify(|w| w.0 = (w.0 & !(1 << self.slice)) | ((enable as u32) << self.slice));
    }
}

impl RateTimer for PwmRateTimer<'_> {
    fn set_prescaler(&mut self, prescaler: Prescaler) {
        let divider = divider(prescaler);
        if divider != self.config.divider {
            self.config.divider = divider;
            self.apply();
        }
    }

    fn set_period(&mut self, ticks: u16) {
        // Counter counts 0..=top
        self.config.top = ticks.saturating_sub(1);
        if !self.config.enable {
            self.apply();
            return;
        }

        self.config.enable = false;
        self.apply();

        self.pwm
            .set_counter(resume_count(self.pwm.counter(), self.config.top));

        self.config.enable = true;
        self.apply();
    }

    fn start(&mut self) {
        self.pwm.set_counter(0);
        pac::PWM.intr().write(|w| w.0 = 1 << self.slice);
        self.set_irq(true);
        self.config.enable = true;
        self.apply();
    }

    fn stop(&mut self) {
        self.set_irq(false);
        self.config.enable = false;
        self.apply();
    }

    fn is_running(&self) -> bool {
        self.config.enable
    }
}
