//! Hardware timer abstractions
//!
//! Four timers cooperate to generate motion:
//!
//! - the **rate timer** fires once per stepper tick and is reprogrammed
//!   on every tick with the interval supplied by the planner
//! - the **pulse timer** is a one-shot that ends the step pulse, with an
//!   optional second compare channel that starts it after a delay
//! - the **PWM timer** drives the spindle speed output
//! - **tick timers** provide slow periodic interrupts for switch debouncing
//!   and millisecond delays

/// Rate timer input clock divider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// Timer runs at the step timer clock
    #[default]
    Div1,
    /// Timer runs at 1/8 of the step timer clock
    Div8,
    /// Timer runs at 1/64 of the step timer clock
    Div64,
}

impl Prescaler {
    /// Division ratio
    pub const fn divisor(self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div8 => 8,
            Prescaler::Div64 => 64,
        }
    }

    /// Right shift equivalent to dividing by this prescaler
    pub const fn shift(self) -> u32 {
        match self {
            Prescaler::Div1 => 0,
            Prescaler::Div8 => 3,
            Prescaler::Div64 => 6,
        }
    }
}

/// Periodic stepper rate timer (16-bit countdown)
pub trait RateTimer {
    /// Select the input clock divider
    fn set_prescaler(&mut self, prescaler: Prescaler);

    /// Set the number of (prescaled) timer ticks between interrupts
    ///
    /// Applies to the period in progress: the next interrupt follows the
    /// previous one by `ticks`, or comes at once if that point has passed.
    fn set_period(&mut self, ticks: u16);

    /// Start counting and enable the period interrupt
    fn start(&mut self);

    /// Stop counting; no further period interrupts are raised
    fn stop(&mut self);

    /// Check if the timer is counting
    fn is_running(&self) -> bool;
}

/// One-shot step pulse timer with two compare channels
///
/// Compare channel 0 ends the pulse (timeout); compare channel 1, when
/// enabled, fires earlier to start a delayed pulse.
///
/// Compare values count from zero: a compare at `n` fires `n + 1` ticks
/// after start, the tick after the counter reads `n`.
pub trait PulseTimer {
    /// Set compare channel 0, in ticks from start
    fn set_timeout(&mut self, ticks: u16);

    /// Enable compare channel 1 at `ticks` from start, or disable it
    fn set_delay(&mut self, ticks: Option<u16>);

    /// Move compare channel 0 to `ticks` after the current count
    fn extend_timeout(&mut self, ticks: u16);

    /// Clear the counter and start the one-shot
    fn start(&mut self);

    /// Stop the one-shot
    fn stop(&mut self);
}

/// Edge-aligned PWM output
pub trait PwmTimer {
    /// Set the PWM period in timer ticks
    fn set_period(&mut self, ticks: u16);

    /// Set the compare value (on-time in ticks)
    fn set_compare(&mut self, ticks: u16);

    /// Connect or disconnect the compare output from the pin
    ///
    /// A disconnected output idles low.
    fn set_output(&mut self, enabled: bool);

    /// Start the PWM counter
    fn start(&mut self);
}

/// Low-priority periodic timer
pub trait TickTimer {
    /// Start raising an interrupt every `period_ms` milliseconds
    fn start(&mut self, period_ms: u16);

    /// Stop the timer
    fn stop(&mut self);
}
