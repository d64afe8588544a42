//! Pin/polarity mapping
//!
//! Translates logical signal bitsets into physical register patterns and
//! back, applying the user-configured inversion mask exactly once at the
//! register boundary.

use steppulse_hal::PortAccess;

/// Location of a contiguous logical bitset inside a port register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortField {
    /// Physical bits occupied by the field
    pub mask: u32,
    /// Physical bit position of logical bit 0
    pub shift: u8,
}

impl PortField {
    /// Field of `width` consecutive pins starting at physical bit `shift`
    pub const fn new(shift: u8, width: u8) -> Self {
        Self {
            mask: ((1u32 << width) - 1) << shift,
            shift,
        }
    }

    /// Physical pattern for a logical value with polarity applied
    pub const fn encode(&self, logical: u8, invert: u8) -> u32 {
        (((logical ^ invert) as u32) << self.shift) & self.mask
    }

    /// Logical value for a physical register pattern with polarity applied
    pub const fn decode(&self, register: u32, invert: u8) -> u8 {
        (((register & self.mask) >> self.shift) as u8) ^ invert
    }
}

/// Register value after writing a logical field with polarity applied
///
/// `(register & !mask) | ((logical ^ invert) << shift)`
pub const fn apply_field(register: u32, field: PortField, logical: u8, invert: u8) -> u32 {
    (register & !field.mask) | field.encode(logical, invert)
}

/// Write a logical field to a port with a single register update
pub fn write_field<P: PortAccess>(port: &mut P, field: PortField, logical: u8, invert: u8) {
    port.write_bits(field.mask, field.encode(logical, invert));
}

/// Mapping from scattered physical input pins to logical bits
///
/// Entry `i` holds the physical pin mask of logical bit `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputMap<const N: usize> {
    pins: [u32; N],
}

impl<const N: usize> InputMap<N> {
    /// Create a mapping from per-bit pin masks
    pub const fn new(pins: [u32; N]) -> Self {
        Self { pins }
    }

    /// Union of all mapped physical pins
    pub fn mask(&self) -> u32 {
        self.pins.iter().fold(0, |acc, pin| acc | pin)
    }

    /// Physical pin mask of logical bit `index`
    pub fn pin(&self, index: usize) -> u32 {
        self.pins[index]
    }

    /// Collect raw pin levels into logical bits (no inversion)
    pub fn gather(&self, raw: u32) -> u8 {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| **pin != 0 && raw & **pin == **pin)
            .fold(0u8, |acc, (bit, _)| acc | (1 << bit))
    }

    /// Spread logical bits onto their physical pins
    pub fn scatter(&self, logical: u8) -> u32 {
        self.pins
            .iter()
            .enumerate()
            .filter(|(bit, _)| logical & (1 << bit) != 0)
            .fold(0, |acc, (_, pin)| acc | pin)
    }
}
