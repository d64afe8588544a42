//! Driver error types
//!
//! Nothing on the pulse path can fail at runtime. Errors are only raised
//! while turning settings into timer constants; the caller treats them as
//! fatal configuration faults.

/// Errors raised by driver setup and settings application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// Step pulse width is zero or does not fit the pulse timer
    PulseWidthOutOfRange,
    /// Step pulse delay plus width does not fit the pulse timer
    PulseDelayOutOfRange,
    /// Spindle PWM frequency gives a period outside the PWM timer range
    PwmFrequencyOutOfRange,
    /// Settings layout or HAL interface version not supported
    VersionMismatch,
}
