//! Register-wide digital I/O abstractions
//!
//! Motion outputs are written as whole bit fields rather than individual
//! pins so that every axis sees its step edge at the same instant. A port
//! is a 32-bit wide view of a GPIO bank; bit positions are physical pin
//! positions within that bank.

/// Raw read/modify/write access to a GPIO bank
///
/// Implementations must perform `write_bits` as a single register update
/// (or an atomic set/clear pair) so that bits outside `mask` are never
/// disturbed.
pub trait PortAccess {
    /// Read the current pin levels
    fn read_bits(&self) -> u32;

    /// Drive the bits selected by `mask` to the corresponding bits of `value`
    fn write_bits(&mut self, mask: u32, value: u32);

    /// Drive all bits in `bits` high
    fn set_bits(&mut self, bits: u32) {
        self.write_bits(bits, bits);
    }

    /// Drive all bits in `bits` low
    fn clear_bits(&mut self, bits: u32) {
        self.write_bits(bits, 0);
    }

    /// Check whether every bit in `bits` reads high
    fn is_set(&self, bits: u32) -> bool {
        self.read_bits() & bits == bits
    }
}

/// Port whose pins are driven by the MCU
pub trait OutputPort: PortAccess {
    /// Switch the pins in `mask` to output mode
    fn configure_outputs(&mut self, mask: u32);
}

/// Port whose pins are sampled by the MCU and can raise edge interrupts
pub trait InputPort: PortAccess {
    /// Switch the pins in `mask` to input mode
    ///
    /// - `pull_up`: pins with the bit set get a pull-up, the rest a pull-down
    /// - `rising`: pins with the bit set interrupt on the rising edge,
    ///   the rest on the falling edge
    fn configure_inputs(&mut self, mask: u32, pull_up: u32, rising: u32);

    /// Enable or disable the edge interrupt for the pins in `mask`
    fn enable_interrupts(&mut self, mask: u32, enable: bool);

    /// Read and clear the pending edge flags selected by `mask`
    ///
    /// Must be atomic with respect to new edges: an edge arriving while
    /// this runs is either returned or left pending, never lost.
    fn take_pending(&mut self, mask: u32) -> u32;
}
