//! Board-agnostic stepper pulse subsystem for grbl-style controllers
//!
//! This crate contains the driver logic that does not depend on a
//! particular microcontroller:
//!
//! - Step/direction pulse generation and rate timer programming
//! - Spindle on/off, direction and PWM duty mapping
//! - Coolant outputs and the probe input
//! - Limit and control inputs with software debounce
//! - Settings-derived configuration published to interrupt handlers
//! - The [`StepperHal`] dispatch interface and [`MotionEvents`] callbacks
//!
//! Boards provide peripheral handles through the `steppulse-hal` traits.
//! The `sim` feature adds in-memory peripherals for host testing.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod atomic;
pub mod config;
pub mod coolant;
pub mod delay;
pub mod driver;
pub mod error;
pub mod inputs;
pub mod polarity;
pub mod settings;
pub mod signals;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod snapshot;
pub mod spindle;
pub mod stepper;
pub mod traits;

pub use driver::{Driver, DriverCapabilities, PinLayout, Peripherals, SharedState};
pub use error::DriverError;
pub use settings::Settings;
pub use signals::{AxisSignals, ControlSignals, CoolantState, SpindleState};
pub use stepper::StepSegment;
pub use traits::{MotionEvents, StepperHal};
