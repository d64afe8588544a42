//! Logical signal bitsets
//!
//! Every bitset here uses "asserted = 1" semantics. Polarity inversion is
//! applied at the register boundary (see [`crate::polarity`]), never stored
//! in these types.

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of motion axes driven by this subsystem
pub const N_AXIS: usize = 3;

/// Motion axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in bit order
    pub const ALL: [Axis; N_AXIS] = [Axis::X, Axis::Y, Axis::Z];

    /// Bit index of this axis in an [`AxisSignals`] set
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-axis signal set
    pub const fn signal(self) -> AxisSignals {
        AxisSignals::from_bits_truncate(1 << self as u8)
    }
}

bitflags! {
    /// Per-axis signal set (step request, direction, limit triggered, enable)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct AxisSignals: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
    }
}

bitflags! {
    /// Discrete control inputs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct ControlSignals: u8 {
        const RESET = 1 << 0;
        const FEED_HOLD = 1 << 1;
        const CYCLE_START = 1 << 2;
        const SAFETY_DOOR = 1 << 3;
    }
}

impl ControlSignals {
    /// Signals in reporting priority order, highest first
    pub const PRIORITY: [ControlSignals; 4] = [
        ControlSignals::RESET,
        ControlSignals::SAFETY_DOOR,
        ControlSignals::FEED_HOLD,
        ControlSignals::CYCLE_START,
    ];

    /// Keep only the highest-priority asserted signal
    pub fn highest_priority(self) -> ControlSignals {
        Self::PRIORITY
            .into_iter()
            .find(|signal| self.contains(*signal))
            .unwrap_or(ControlSignals::empty())
    }
}

bitflags! {
    /// Spindle on/direction state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct SpindleState: u8 {
        const ON = 1 << 0;
        const CCW = 1 << 1;
    }
}

impl SpindleState {
    /// Spindle on, clockwise
    pub const CW: SpindleState = SpindleState::ON;

    /// Check if the spindle is commanded on
    pub fn is_on(self) -> bool {
        self.contains(SpindleState::ON)
    }

    /// Check if counter-clockwise rotation is commanded
    pub fn is_ccw(self) -> bool {
        self.contains(SpindleState::CCW)
    }
}

bitflags! {
    /// Coolant outputs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct CoolantState: u8 {
        const FLOOD = 1 << 0;
        const MIST = 1 << 1;
    }
}

#[cfg(feature = "defmt")]
mod format {
    use super::*;

    impl defmt::Format for AxisSignals {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "AxisSignals({=u8:#05b})", self.bits())
        }
    }

    impl defmt::Format for ControlSignals {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "ControlSignals({=u8:#06b})", self.bits())
        }
    }

    impl defmt::Format for SpindleState {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "SpindleState(on={}, ccw={})", self.is_on(), self.is_ccw())
        }
    }

    impl defmt::Format for CoolantState {
        fn format(&self, f: defmt::Formatter) {
            defmt::write!(f, "CoolantState({=u8:#04b})", self.bits())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_signal_bits() {
        assert_eq!(Axis::X.signal(), AxisSignals::X);
        assert_eq!(Axis::Z.signal().bits(), 0b100);
        assert_eq!(AxisSignals::all().bits(), 0b111);
    }

    #[test]
    fn test_control_priority_order() {
        let all = ControlSignals::all();
        assert_eq!(all.highest_priority(), ControlSignals::RESET);

        let door_and_hold = ControlSignals::SAFETY_DOOR | ControlSignals::FEED_HOLD;
        assert_eq!(door_and_hold.highest_priority(), ControlSignals::SAFETY_DOOR);

        let hold_and_start = ControlSignals::FEED_HOLD | ControlSignals::CYCLE_START;
        assert_eq!(hold_and_start.highest_priority(), ControlSignals::FEED_HOLD);

        assert_eq!(
            ControlSignals::empty().highest_priority(),
            ControlSignals::empty()
        );
    }
}
