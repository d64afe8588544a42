//! Signals from interrupt context to the async tasks
//!
//! Driver callbacks run inside interrupt handlers and must not block, so
//! anything that needs a decision is handed to the supervisor task here.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use steppulse_core::{AxisSignals, ControlSignals};

/// A limit switch fired (latest state wins)
pub static LIMIT_TRIGGERED: Signal<CriticalSectionRawMutex, AxisSignals> = Signal::new();

/// A control input changed (latest state wins)
pub static CONTROL_CHANGED: Signal<CriticalSectionRawMutex, ControlSignals> = Signal::new();

/// The planner queue ran dry and the stepper went idle
pub static MOTION_DONE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
