//! Millisecond delay service
//!
//! A delay arms the tick timer and either returns at once with a
//! completion callback registered, or waits for the timer without a
//! callback. The pending flag lives in [`SharedState`] so that it can be
//! observed while the driver itself is borrowed by the waiting caller.
//!
//! [`SharedState`]: crate::driver::SharedState

use portable_atomic::{AtomicBool, Ordering};
use steppulse_hal::TickTimer;

/// Completion callback run from the tick interrupt
pub type DelayCallback = fn();

/// Result of arming a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DelayStart {
    /// Zero-length delay; the callback (if any) has already run
    Elapsed,
    /// Timer armed, callback registered
    Armed,
    /// Timer armed, caller has to wait for the pending flag to clear
    MustWait,
}

/// One-shot delay on a tick timer
pub struct Delay<'a, T> {
    timer: T,
    pending: &'a AtomicBool,
    callback: Option<DelayCallback>,
}

impl<'a, T: TickTimer> Delay<'a, T> {
    pub fn new(timer: T, pending: &'a AtomicBool) -> Self {
        Self {
            timer,
            pending,
            callback: None,
        }
    }

    /// Arm the timer for `ms` milliseconds
    pub fn start(&mut self, ms: u16, callback: Option<DelayCallback>) -> DelayStart {
        if ms == 0 {
            self.pending.store(false, Ordering::Release);
            if let Some(callback) = callback {
                callback();
            }
            return DelayStart::Elapsed;
        }

        self.callback = callback;
        self.pending.store(true, Ordering::Release);
        self.timer.start(ms);

        if self.callback.is_some() {
            DelayStart::Armed
        } else {
            DelayStart::MustWait
        }
    }

    /// Check if the delay has not elapsed yet
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Abandon a running delay without running its callback
    pub fn cancel(&mut self) {
        self.timer.stop();
        self.callback = None;
        self.pending.store(false, Ordering::Release);
    }

    /// Tick interrupt body
    pub fn on_tick(&mut self) {
        self.pending.store(false, Ordering::Release);
        self.timer.stop();
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimTimer, SimTimerState};
    use portable_atomic::AtomicU32;

    static CALLS: AtomicU32 = AtomicU32::new(0);

    fn count_call() {
        CALLS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_delay_lifecycle() {
        let timer = SimTimerState::new();
        let pending = AtomicBool::new(false);
        let mut delay = Delay::new(SimTimer::new(&timer), &pending);
        let before = CALLS.load(Ordering::Relaxed);

        // Zero length runs the callback synchronously
        assert_eq!(delay.start(0, Some(count_call)), DelayStart::Elapsed);
        assert_eq!(CALLS.load(Ordering::Relaxed), before + 1);
        assert!(!timer.is_running());

        // Callback runs once, from the tick
        assert_eq!(delay.start(5, Some(count_call)), DelayStart::Armed);
        assert!(delay.is_pending());
        assert_eq!(timer.interval_ms(), 5);
        delay.on_tick();
        assert!(!delay.is_pending());
        assert!(!timer.is_running());
        assert_eq!(CALLS.load(Ordering::Relaxed), before + 2);
        delay.on_tick();
        assert_eq!(CALLS.load(Ordering::Relaxed), before + 2);

        // Without callback the caller waits on the flag
        assert_eq!(delay.start(2, None), DelayStart::MustWait);
        assert!(delay.is_pending());
        delay.cancel();
        assert!(!delay.is_pending());
        assert!(!timer.is_running());
    }
}
