//! Steppulse Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits consumed by the
//! board-agnostic pulse subsystem in `steppulse-core`. Chip-specific crates
//! implement them on top of real registers; the core crate ships a
//! simulated implementation for host testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Motion planner / interpreter (extern)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  steppulse-core (driver + dispatch)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  steppulse-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ steppulse-hal-│       │  simulated    │
//! │    rp2040     │       │  board (host) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`port::PortAccess`], [`port::OutputPort`], [`port::InputPort`] - Register-wide digital I/O
//! - [`timer::RateTimer`] - Periodic stepper rate timer with prescaler
//! - [`timer::PulseTimer`] - One-shot step pulse timer with a delay compare channel
//! - [`timer::PwmTimer`] - Edge-aligned PWM output for the spindle
//! - [`timer::TickTimer`] - Low-priority periodic tick (debounce, delays)

#![no_std]
#![deny(unsafe_code)]

pub mod port;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use port::{InputPort, OutputPort, PortAccess};
pub use timer::{Prescaler, PulseTimer, PwmTimer, RateTimer, TickTimer};
