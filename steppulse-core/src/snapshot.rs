//! Lock-free configuration snapshot
//!
//! Single writer (settings change, main flow), many readers (interrupt
//! handlers). The writer fills the inactive slot and publishes it with one
//! atomic index store. Each slot carries a generation counter that is odd
//! while the slot is being written; a reader that raced a writer (only
//! possible when the reader runs at lower priority than the writer) sees a
//! changed or odd generation and retries. Readers in interrupt context
//! never spin: the writer only ever touches the slot they are not reading.

use portable_atomic::{fence, AtomicU32, AtomicU8, Ordering};

use crate::config::{DriverConfig, CONFIG_WORDS};

struct Slot {
    generation: AtomicU32,
    words: [AtomicU32; CONFIG_WORDS],
}

impl Slot {
    const fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
            words: [const { AtomicU32::new(0) }; CONFIG_WORDS],
        }
    }
}

/// Double-buffered [`DriverConfig`] shared between contexts
pub struct ConfigCell {
    slots: [Slot; 2],
    active: AtomicU8,
}

impl Default for ConfigCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigCell {
    /// Create a cell holding an all-zero configuration
    pub const fn new() -> Self {
        Self {
            slots: [Slot::new(), Slot::new()],
            active: AtomicU8::new(0),
        }
    }

    /// Publish a new configuration
    ///
    /// Must only be called from one context at a time.
    pub fn store(&self, config: &DriverConfig) {
        let next = (self.active.load(Ordering::Relaxed) ^ 1) as usize;
        let slot = &self.slots[next];

        slot.generation.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);

        for (word, value) in slot.words.iter().zip(config.to_words()) {
            word.store(value, Ordering::Relaxed);
        }

        slot.generation.fetch_add(1, Ordering::Release);
        self.active.store(next as u8, Ordering::Release);
    }

    /// Read the current configuration
    pub fn load(&self) -> DriverConfig {
        loop {
            let slot = &self.slots[self.active.load(Ordering::Acquire) as usize & 1];

            let before = slot.generation.load(Ordering::Acquire);
            if before & 1 != 0 {
                continue;
            }

            let mut words = [0u32; CONFIG_WORDS];
            for (value, word) in words.iter_mut().zip(slot.words.iter()) {
                *value = word.load(Ordering::Relaxed);
            }

            fence(Ordering::Acquire);
            if slot.generation.load(Ordering::Relaxed) == before {
                return DriverConfig::from_words(&words);
            }
        }
    }

    /// Number of configurations published so far
    pub fn revision(&self) -> u32 {
        self.slots
            .iter()
            .map(|slot| slot.generation.load(Ordering::Acquire) / 2)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverCapabilities;
    use crate::settings::Settings;
    use crate::signals::AxisSignals;

    #[test]
    fn test_initial_config_is_zero() {
        let cell = ConfigCell::new();
        assert_eq!(cell.load(), DriverConfig::from_words(&[0; CONFIG_WORDS]));
        assert_eq!(cell.revision(), 0);
    }

    #[test]
    fn test_store_then_load() {
        let cell = ConfigCell::new();
        let caps = DriverCapabilities::default();

        let first = DriverConfig::derive(&Settings::default(), &caps).unwrap();
        cell.store(&first);
        assert_eq!(cell.load(), first);

        let settings = Settings {
            step_invert: AxisSignals::Y,
            pulse_microseconds: 4,
            ..Settings::default()
        };
        let second = DriverConfig::derive(&settings, &caps).unwrap();
        cell.store(&second);
        assert_eq!(cell.load(), second);
        assert_eq!(cell.revision(), 2);
    }

    #[test]
    fn test_slots_alternate() {
        let cell = ConfigCell::new();
        let config = DriverConfig::default();

        cell.store(&config);
        assert_eq!(cell.active.load(Ordering::Relaxed), 1);
        cell.store(&config);
        assert_eq!(cell.active.load(Ordering::Relaxed), 0);
        assert_eq!(cell.slots[0].generation.load(Ordering::Relaxed), 2);
        assert_eq!(cell.slots[1].generation.load(Ordering::Relaxed), 2);
    }
}
