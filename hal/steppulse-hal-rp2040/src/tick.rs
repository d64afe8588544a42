//! Millisecond tick timers on embassy-time
//!
//! Debounce and delay ticks are slow enough to run from executor tasks.
//! A [`TickSlot`] lives in a `static`; the driver programs it through a
//! [`SlotTimer`] handle and a task waits on [`TickSlot::wait_tick`] and
//! forwards each tick to the driver.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};
use portable_atomic::{AtomicU16, Ordering};
use steppulse_hal::TickTimer;

/// Shared tick period, 0 = stopped
pub struct TickSlot {
    period_ms: AtomicU16,
    changed: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for TickSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSlot {
    pub const fn new() -> Self {
        Self {
            period_ms: AtomicU16::new(0),
            changed: Signal::new(),
        }
    }

    /// Timer handle for the driver
    pub fn timer(&'static self) -> SlotTimer {
        SlotTimer { slot: self }
    }

    fn set(&self, period_ms: u16) {
        self.period_ms.store(period_ms, Ordering::Release);
        self.changed.signal(());
    }

    /// Check if the slot is ticking
    pub fn is_running(&self) -> bool {
        self.period_ms.load(Ordering::Acquire) != 0
    }

    /// Wait for the next tick
    ///
    /// Restarting the slot restarts the period; ticks are not delivered
    /// while it is stopped.
    pub async fn wait_tick(&self) {
        loop {
            let period = self.period_ms.load(Ordering::Acquire);
            if period == 0 {
                self.changed.wait().await;
                continue;
            }

            let mut ticker = Ticker::every(Duration::from_millis(period as u64));
            loop {
                match select(ticker.next(), self.changed.wait()).await {
                    Either::First(()) => return,
                    Either::Second(()) => break,
                }
            }
        }
    }
}

/// Driver-side handle of a [`TickSlot`]
pub struct SlotTimer {
    slot: &'static TickSlot,
}

impl TickTimer for SlotTimer {
    fn start(&mut self, period_ms: u16) {
        self.slot.set(period_ms);
    }

    fn stop(&mut self) {
        self.slot.set(0);
    }
}
