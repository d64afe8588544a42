//! RP2040 implementation of the steppulse hardware traits
//!
//! Peripheral mapping:
//!
//! - GPIO bank 0 through SIO for all step, direction and switch pins
//!   ([`port::SioPort`]); edges are latched by the IO bank and collected
//!   by polling
//! - a PWM slice wrap interrupt as the rate timer ([`rate::PwmRateTimer`])
//! - TIMER alarms 1 and 2 as the step pulse one-shot ([`pulse::AlarmPulseTimer`]);
//!   alarm 0 belongs to the embassy time driver
//! - a PWM slice output for the spindle ([`pwm::SpindlePwm`])
//! - embassy-time driven tick slots for debounce and delays ([`tick::TickSlot`])

#![no_std]

pub mod port;
pub mod pulse;
pub mod pwm;
pub mod rate;
pub mod tick;

use core::marker::PhantomData;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use steppulse_core::driver::Board;

pub use port::SioPort;
pub use pulse::AlarmPulseTimer;
pub use pwm::SpindlePwm;
pub use rate::PwmRateTimer;
pub use tick::{SlotTimer, TickSlot};

/// System clock the timer dividers are computed for
pub const SYS_CLOCK_HZ: u32 = 125_000_000;

/// Peripheral types of an RP2040 board
pub struct Rp2040Board<'d> {
    _pins: PhantomData<&'d ()>,
}

impl<'d> Board for Rp2040Board<'d> {
    type Output = SioPort<'d>;
    type Input = SioPort<'d>;
    type Rate = PwmRateTimer<'d>;
    type Pulse = AlarmPulseTimer;
    type Pwm = SpindlePwm<'d>;
    type Tick = SlotTimer;
    type PulseMutex = CriticalSectionRawMutex;
}
