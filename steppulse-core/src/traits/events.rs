//! Callbacks into the motion layer

use crate::signals::{AxisSignals, ControlSignals};
use crate::stepper::StepSegment;

/// Callbacks invoked by the driver
///
/// Except for [`is_blocking_allowed`](MotionEvents::is_blocking_allowed)
/// every callback runs in interrupt context and must not block.
pub trait MotionEvents {
    /// Rate tick: provide the next step segment
    ///
    /// Returning `None` ends the motion; the driver stops the rate timer.
    fn on_stepper_tick(&mut self) -> Option<StepSegment>;

    /// A limit switch was hit (already debounced when the board debounces)
    fn on_limit_triggered(&mut self, limits: AxisSignals);

    /// A control input changed
    fn on_control_triggered(&mut self, control: ControlSignals);

    /// Polled while the driver busy-waits for a delay
    ///
    /// Returning `false` abandons the wait.
    fn is_blocking_allowed(&mut self) -> bool {
        true
    }
}
