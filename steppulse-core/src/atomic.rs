//! Interrupt-safe bit operations on shared flag words
//!
//! These are the only general-purpose primitive for state shared between
//! interrupt handlers and the main flow. On cores without native atomic
//! read-modify-write (thumbv6m) `portable-atomic` falls back to a critical
//! section; the firmware enables its `critical-section` feature.

use portable_atomic::{AtomicU16, Ordering};

/// Set `bits` in `word`
pub fn set_bits(word: &AtomicU16, bits: u16) {
    word.fetch_or(bits, Ordering::AcqRel);
}

/// Clear `bits` in `word`, returning the previous value
pub fn clear_bits(word: &AtomicU16, bits: u16) -> u16 {
    word.fetch_and(!bits, Ordering::AcqRel)
}

/// Replace `word` with `value`, returning the previous value
pub fn set_value(word: &AtomicU16, value: u16) -> u16 {
    word.swap(value, Ordering::AcqRel)
}
