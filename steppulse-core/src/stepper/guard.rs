//! Rate tick reentrancy guard
//!
//! The planner callback may run long enough for the next rate tick to
//! arrive while it is still executing. A nested tick must not call the
//! planner again; it is dropped and counted instead.

use portable_atomic::{AtomicU32, AtomicU8, Ordering};

/// Rate tick handler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickState {
    /// No tick in progress
    Ready,
    /// A tick is pulling the next segment from the planner
    Busy,
}

const READY: u8 = 0;
const BUSY: u8 = 1;

/// Non-reentrant entry into the rate tick handler
pub struct TickGuard {
    state: AtomicU8,
    overruns: AtomicU32,
}

impl Default for TickGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl TickGuard {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(READY),
            overruns: AtomicU32::new(0),
        }
    }

    /// Current handler state
    pub fn state(&self) -> TickState {
        match self.state.load(Ordering::Acquire) {
            READY => TickState::Ready,
            _ => TickState::Busy,
        }
    }

    /// Enter the handler
    ///
    /// Returns `false` and records an overrun if a tick is already in
    /// progress. A successful entry must be paired with [`leave`].
    ///
    /// [`leave`]: TickGuard::leave
    pub fn enter(&self) -> bool {
        let entered = self
            .state
            .compare_exchange(READY, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !entered {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        entered
    }

    /// Leave the handler
    pub fn leave(&self) {
        self.state.store(READY, Ordering::Release);
    }

    /// Ticks dropped because the previous one had not finished
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }
}
