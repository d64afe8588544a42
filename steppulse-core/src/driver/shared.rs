//! State shared between the driver and interrupt handlers

use portable_atomic::{AtomicBool, Ordering};

use crate::snapshot::ConfigCell;
use crate::stepper::TickGuard;

/// Driver state that must be reachable without borrowing the driver
///
/// Boards keep one of these in a `static` and hand a reference to
/// [`Driver::new`](super::Driver::new).
pub struct SharedState {
    /// Current settings-derived configuration
    pub config: ConfigCell,
    /// Rate tick reentrancy guard
    pub tick: TickGuard,
    delay_pending: AtomicBool,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            config: ConfigCell::new(),
            tick: TickGuard::new(),
            delay_pending: AtomicBool::new(false),
        }
    }

    pub(crate) fn delay_flag(&self) -> &AtomicBool {
        &self.delay_pending
    }

    /// Check if a millisecond delay is running
    pub fn is_delay_pending(&self) -> bool {
        self.delay_pending.load(Ordering::Acquire)
    }

    /// Mark the running delay as elapsed
    ///
    /// For delay tick handlers that fire while the driver is busy waiting.
    /// The driver stops the timer itself once the wait returns.
    pub fn expire_delay(&self) {
        self.delay_pending.store(false, Ordering::Release);
    }
}
