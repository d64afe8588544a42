//! Interfaces to the external motion layer
//!
//! [`MotionEvents`] is implemented by the planner/realtime layer and called
//! by the driver; [`StepperHal`] is implemented by the driver and called by
//! the planner.

pub mod events;
pub mod hal;

pub use events::MotionEvents;
pub use hal::StepperHal;
