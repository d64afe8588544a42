//! Flood and mist coolant outputs

use steppulse_hal::OutputPort;

use crate::config::DriverConfig;
use crate::signals::CoolantState;

/// Physical pins of the coolant outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoolantPins {
    pub flood: u32,
    /// Mist output (0 if not wired)
    pub mist: u32,
}

/// Coolant output controller
pub struct Coolant<P> {
    port: P,
    pins: CoolantPins,
    mist_control: bool,
}

impl<P: OutputPort> Coolant<P> {
    pub fn new(port: P, pins: CoolantPins, mist_control: bool) -> Self {
        Self {
            port,
            pins,
            mist_control: mist_control && pins.mist != 0,
        }
    }

    fn mask(&self) -> u32 {
        if self.mist_control {
            self.pins.flood | self.pins.mist
        } else {
            self.pins.flood
        }
    }

    /// Configure output pins
    pub fn setup(&mut self) {
        let mask = self.mask();
        self.port.configure_outputs(mask);
    }

    /// Drive the coolant outputs
    pub fn set_state(&mut self, state: CoolantState, cfg: &DriverConfig) {
        let levels = state ^ cfg.invert.coolant;
        let mut value = 0;
        if levels.contains(CoolantState::FLOOD) {
            value |= self.pins.flood;
        }
        if levels.contains(CoolantState::MIST) {
            value |= self.pins.mist;
        }

        let mask = self.mask();
        self.port.write_bits(mask, value);
    }

    /// Read back the coolant outputs
    pub fn get_state(&self, cfg: &DriverConfig) -> CoolantState {
        let levels = self.port.read_bits();
        let mut state = CoolantState::empty();
        if levels & self.pins.flood != 0 {
            state |= CoolantState::FLOOD;
        }
        if self.mist_control && levels & self.pins.mist != 0 {
            state |= CoolantState::MIST;
        }

        let supported = if self.mist_control {
            CoolantState::all()
        } else {
            CoolantState::FLOOD
        };
        (state ^ cfg.invert.coolant) & supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimPins, SimPort};

    const PINS: CoolantPins = CoolantPins {
        flood: 1 << 6,
        mist: 1 << 7,
    };

    #[test]
    fn test_set_and_read_back() {
        let pins = SimPins::new();
        let mut coolant = Coolant::new(SimPort::new(&pins), PINS, true);
        coolant.setup();
        let cfg = DriverConfig::default();

        coolant.set_state(CoolantState::MIST, &cfg);
        assert_eq!(pins.outputs() & (PINS.flood | PINS.mist), PINS.mist);
        assert_eq!(coolant.get_state(&cfg), CoolantState::MIST);

        coolant.set_state(CoolantState::empty(), &cfg);
        assert!(coolant.get_state(&cfg).is_empty());
    }

    #[test]
    fn test_inverted_flood() {
        let pins = SimPins::new();
        let mut coolant = Coolant::new(SimPort::new(&pins), PINS, true);
        coolant.setup();
        let mut cfg = DriverConfig::default();
        cfg.invert.coolant = CoolantState::FLOOD;

        coolant.set_state(CoolantState::empty(), &cfg);
        assert!(pins.output_high(PINS.flood));
        assert!(coolant.get_state(&cfg).is_empty());

        coolant.set_state(CoolantState::FLOOD, &cfg);
        assert!(!pins.output_high(PINS.flood));
        assert_eq!(coolant.get_state(&cfg), CoolantState::FLOOD);
    }

    #[test]
    fn test_mist_ignored_without_capability() {
        let pins = SimPins::new();
        let mut coolant = Coolant::new(SimPort::new(&pins), PINS, false);
        coolant.setup();
        let cfg = DriverConfig::default();

        coolant.set_state(CoolantState::all(), &cfg);
        assert!(!pins.output_high(PINS.mist));
        assert_eq!(coolant.get_state(&cfg), CoolantState::FLOOD);
    }
}
