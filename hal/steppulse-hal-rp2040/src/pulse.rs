//! Step pulse one-shot on TIMER alarms
//!
//! The microsecond timer gives one pulse tick per microsecond. Alarm 1
//! ends the pulse (`TIMER_IRQ_1`), alarm 2 starts a delayed pulse
//! (`TIMER_IRQ_2`). Alarms compare against the low 32 bits of the
//! free-running counter, so targets are computed with wrapping adds.
//!
//! An alarm fires on the tick where the counter equals its target, while
//! pulse compare values fire one tick after the count reaches them. Targets
//! are therefore placed one tick past the compare value. An alarm whose
//! target already passed would only fire after the counter wraps; such an
//! alarm is disarmed and its interrupt forced instead.

use embassy_rp::pac;
use steppulse_hal::PulseTimer;

/// Pulse timer ticks per microsecond
pub const PULSE_TICKS_PER_US: u16 = 1;

/// Alarm ending the pulse
pub const TIMEOUT_ALARM: usize = 1;

/// Alarm starting a delayed pulse
pub const DELAY_ALARM: usize = 2;

/// Acknowledge an alarm interrupt, raised or forced
pub fn ack(alarm: usize) {
    pac::TIMER.intr().write(|w| w.set_alarm(alarm, true));
    pac::TIMER.intf().modify(|w| w.set_alarm(alarm, false));
}

/// Ticks from `from` until a compare at `compare` fires
fn lead(compare: u16) -> u32 {
    compare as u32 + 1
}

/// Check if the counter at `now` already reached an alarm `lead` ticks
/// after `from`
fn is_overdue(from: u32, now: u32, lead: u32) -> bool {
    now.wrapping_sub(from) >= lead
}

fn now() -> u32 {
    pac::TIMER.timerawl().read()
}

fn is_armed(alarm: usize) -> bool {
    pac::TIMER.armed().read().armed() & (1 << alarm) != 0
}

fn arm(alarm: usize, from: u32, compare: u16) {
    let lead = lead(compare);
    pac::TIMER.alarm(alarm).write_value(from.wrapping_add(lead));

    if is_overdue(from, now(), lead) && is_armed(alarm) {
        pac::TIMER.armed().write(|w| w.set_armed(1 << alarm));
        pac::TIMER.intf().modify(|w| w.set_alarm(alarm, true));
    }
}

fn disarm(alarm: usize) {
    pac::TIMER.armed().write(|w| w.set_armed(1 << alarm));
    ack(alarm);
}

/// One-shot built from two alarms of the system timer
pub struct AlarmPulseTimer {
    timeout: u16,
    delay: Option<u16>,
}

impl AlarmPulseTimer {
    /// Claim alarms 1 and 2 and enable their interrupts
    pub fn new() -> Self {
        for alarm in [TIMEOUT_ALARM, DELAY_ALARM] {
            disarm(alarm);
            pac::TIMER.inte().modify(|w| w.set_alarm(alarm, true));
        }

        Self {
            timeout: 0,
            delay: None,
        }
    }
}

impl Default for AlarmPulseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseTimer for AlarmPulseTimer {
    fn set_timeout(&mut self, ticks: u16) {
        self.timeout = ticks;
    }

    fn set_delay(&mut self, ticks: Option<u16>) {
        self.delay = ticks;
        if ticks.is_none() {
            disarm(DELAY_ALARM);
        }
    }

    fn extend_timeout(&mut self, ticks: u16) {
        arm(TIMEOUT_ALARM, now(), ticks);
    }

    fn start(&mut self) {
        let start = now();
        if let Some(delay) = self.delay {
            arm(DELAY_ALARM, start, delay);
        }
        arm(TIMEOUT_ALARM, start, self.timeout);
    }

    fn stop(&mut self) {
        disarm(TIMEOUT_ALARM);
        disarm(DELAY_ALARM);
    }
}
