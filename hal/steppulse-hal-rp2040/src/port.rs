//! SIO-backed GPIO ports
//!
//! Bit positions are GPIO numbers of bank 0. Outputs are updated through
//! the SIO set/clear aliases so that bits outside the mask are never
//! touched. Input edges are latched by the IO bank raw interrupt status
//! whether or not the processor interrupt is enabled, which lets a polling
//! task collect them without losing any.

use core::marker::PhantomData;

use embassy_rp::gpio::{AnyPin, Pin};
use embassy_rp::{pac, Peri};
use steppulse_hal::{InputPort, OutputPort, PortAccess};

/// GPIO function select value for SIO
const FUNCSEL_SIO: u8 = 5;

/// User GPIOs in bank 0
const BANK0_PINS: u32 = 30;

fn pins(mask: u32) -> impl Iterator<Item = usize> {
    (0..BANK0_PINS as usize).filter(move |pin| mask & (1 << pin) != 0)
}

/// A set of bank 0 pins driven through SIO
///
/// Owns the pins it was created from; writes outside that set are
/// ignored.
pub struct SioPort<'d> {
    owned: u32,
    /// Pins whose edges are reported by `take_pending`
    enabled: u32,
    /// Pins sensing rising edges, the rest sense falling edges
    rising: u32,
    _pins: PhantomData<&'d mut AnyPin>,
}

impl<'d> SioPort<'d> {
    /// Take ownership of `pins`
    pub fn new<const N: usize>(pins: [Peri<'d, AnyPin>; N]) -> Self {
        let owned = pins.iter().fold(0, |acc, pin| acc | 1 << pin.pin());
        Self {
            owned,
            enabled: 0,
            rising: 0,
            _pins: PhantomData,
        }
    }

    /// Pins owned by this port
    pub fn mask(&self) -> u32 {
        self.owned
    }

    fn select_sio(mask: u32) {
        for pin in pins(mask) {
            pac::IO_BANK0
                .gpio(pin)
                .ctrl()
                .write(|w| w.set_funcsel(FUNCSEL_SIO));
        }
    }
}

impl PortAccess for SioPort<'_> {
    fn read_bits(&self) -> u32 {
        pac::SIO.gpio_in(0).read() & self.owned
    }

    fn write_bits(&mut self, mask: u32, value: u32) {
        let mask = mask & self.owned;
        pac::SIO.gpio_out(0).value_set().write_value(value & mask);
        pac::SIO.gpio_out(0).value_clr().write_value(!value & mask);
    }
}

impl OutputPort for SioPort<'_> {
    fn configure_outputs(&mut self, mask: u32) {
        let mask = mask & self.owned;
        for pin in pins(mask) {
            pac::PADS_BANK0.gpio(pin).write(|w| {
                w.set_ie(true);
                w.set_od(false);
            });
        }
        Self::select_sio(mask);
        pac::SIO.gpio_oe(0).value_set().write_value(mask);
    }
}

impl InputPort for SioPort<'_> {
    fn configure_inputs(&mut self, mask: u32, pull_up: u32, rising: u32) {
        let mask = mask & self.owned;
        pac::SIO.gpio_oe(0).value_clr().write_value(mask);
        for pin in pins(mask) {
            let up = pull_up & (1 << pin) != 0;
            pac::PADS_BANK0.gpio(pin).write(|w| {
                w.set_ie(true);
                w.set_schmitt(true);
                w.set_pue(up);
                w.set_pde(!up);
            });
        }
        Self::select_sio(mask);
        self.rising = (self.rising & !mask) | (rising & mask);
    }

    fn enable_interrupts(&mut self, mask: u32, enable: bool) {
        let mask = mask & self.owned;
        if enable {
            self.enabled |= mask;
        } else {
            self.enabled &= !mask;
        }
    }

    fn take_pending(&mut self, mask: u32) -> u32 {
        let mask = mask & self.owned;
        let mut pending = 0;

        for pin in pins(mask) {
            let reg = pac::IO_BANK0.intr(pin / 8);
            let slot = pin % 8;
            let status = reg.read();
            let edge = if self.rising & (1 << pin) != 0 {
                status.edge_high(slot)
            } else {
                status.edge_low(slot)
            };
            if edge {
                pending |= 1 << pin;
            }
            // Clear only what was seen; a newer edge stays latched
            reg.write(|w| {
                w.set_edge_high(slot, status.edge_high(slot));
                w.set_edge_low(slot, status.edge_low(slot));
            });
        }

        pending & self.enabled
    }
}
