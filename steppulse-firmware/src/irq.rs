//! Interrupt handlers and driver ownership
//!
//! Two locks split the motion interrupts:
//!
//! - the step pulse lives in [`PULSE`] behind a critical-section mutex that
//!   is only held while the step bits are written and an alarm is armed
//! - the driver and the segment queue live behind a [`RateTickMutex`],
//!   which masks the rate tick interrupt and nothing else
//!
//! The pulse alarms run at a higher priority than the rate tick and never
//! touch the driver, so a step pulse ends on time even while the rate tick
//! is still pulling the next segment from the planner.

use core::cell::RefCell;

use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use steppulse_core::stepper::PulseChannel;
use steppulse_core::SharedState;
use steppulse_hal_rp2040::pulse::{self, DELAY_ALARM, TIMEOUT_ALARM};
use steppulse_hal_rp2040::rate;

use crate::board::{BoardDriver, BoardPulse, RATE_SLICE};
use crate::planner::SegmentQueue;

/// Configuration snapshot, tick guard and delay flag
pub static SHARED: SharedState = SharedState::new();

/// Step outputs and pulse alarms, shared by the rate tick and the alarms
pub static PULSE: BoardPulse = PulseChannel::new();

static DRIVER: Mutex<RateTickMutex, RefCell<Option<BoardDriver>>> =
    Mutex::new(RefCell::new(None));

static PLANNER: Mutex<RateTickMutex, RefCell<SegmentQueue>> =
    Mutex::new(RefCell::new(SegmentQueue::new()));

/// Mutex that keeps the rate tick interrupt out while held
///
/// Only valid between thread mode and `PWM_IRQ_WRAP` on a single core.
/// Other interrupts stay live, so nothing they run may lock it.
pub struct RateTickMutex(());

// SAFETY: every user of the lock is either thread mode or PWM_IRQ_WRAP on
// core 0. Masking PWM_IRQ_WRAP in the NVIC excludes the handler from a
// thread-mode section, and the handler cannot be preempted by thread mode.
unsafe impl RawMutex for RateTickMutex {
    const INIT: Self = Self(());

    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let irq = interrupt::PWM_IRQ_WRAP;
        let was_enabled = irq.is_enabled();
        irq.disable();
        // The disable must land before the section starts
        cortex_m::asm::dsb();
        cortex_m::asm::isb();

        let result = f();

        if was_enabled {
            // SAFETY: restores the mask state found on entry
            unsafe { irq.enable() };
        }
        result
    }
}

/// Hand the configured driver to the interrupt handlers
pub fn install(driver: BoardDriver) {
    DRIVER.lock(|cell| cell.replace(Some(driver)));
}

/// Run `f` with exclusive access to the driver and planner
///
/// Returns `None` until a driver is installed.
pub fn with_driver<R>(f: impl FnOnce(&mut BoardDriver, &mut SegmentQueue) -> R) -> Option<R> {
    DRIVER.lock(|driver| {
        PLANNER.lock(|planner| {
            let mut driver = driver.borrow_mut();
            let driver = driver.as_mut()?;
            Some(f(driver, &mut planner.borrow_mut()))
        })
    })
}

/// Run `f` with exclusive access to the planner only
pub fn with_planner<R>(f: impl FnOnce(&mut SegmentQueue) -> R) -> R {
    PLANNER.lock(|planner| f(&mut planner.borrow_mut()))
}

/// Set priorities and unmask the motion interrupts
pub fn enable() {
    interrupt::TIMER_IRQ_1.set_priority(Priority::P0);
    interrupt::TIMER_IRQ_2.set_priority(Priority::P0);
    interrupt::PWM_IRQ_WRAP.set_priority(Priority::P1);

    // SAFETY: the alarm handlers only reach the pulse channel, the rate
    // handler only reaches state guarded by RateTickMutex
    unsafe {
        interrupt::TIMER_IRQ_1.enable();
        interrupt::TIMER_IRQ_2.enable();
        interrupt::PWM_IRQ_WRAP.enable();
    }
}

#[interrupt]
fn PWM_IRQ_WRAP() {
    if rate::take_wrap(RATE_SLICE) {
        with_driver(|driver, planner| driver.on_rate_tick(planner));
    }
}

#[interrupt]
fn TIMER_IRQ_1() {
    pulse::ack(TIMEOUT_ALARM);
    PULSE.on_timeout();
}

#[interrupt]
fn TIMER_IRQ_2() {
    pulse::ack(DELAY_ALARM);
    PULSE.on_delay();
}
