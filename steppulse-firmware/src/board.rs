//! Board definition
//!
//! Pin assignments for a 3-axis RP2040 controller board. Step and
//! direction lines must each sit on consecutive GPIOs so they can be
//! written as one field.
//!
//! | Function            | GPIO      |
//! |---------------------|-----------|
//! | Step X, Y, Z        | 2, 3, 4   |
//! | Direction X, Y, Z   | 5, 6, 7   |
//! | Stepper enable      | 8 (shared)|
//! | Limit X, Y, Z       | 9, 10, 11 |
//! | Reset, hold, start, door | 12..=15 |
//! | Probe               | 16        |
//! | Spindle enable, dir | 17, 18    |
//! | Spindle PWM         | 20 (PWM2 A) |
//! | Coolant flood, mist | 21, 22    |
//!
//! The rate timer uses PWM slice 0 without an output pin.

use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::Peripherals as RpPeripherals;

use steppulse_core::coolant::CoolantPins;
use steppulse_core::polarity::{InputMap, PortField};
use steppulse_core::spindle::SpindlePins;
use steppulse_core::stepper::StepperPins;
use steppulse_core::{AxisSignals, Driver, DriverCapabilities, Peripherals, PinLayout, Settings};
use steppulse_hal_rp2040::pulse::PULSE_TICKS_PER_US;
use steppulse_hal_rp2040::pwm::PWM_CLOCK_HZ;
use steppulse_hal_rp2040::rate::STEP_TIMER_HZ;
use steppulse_hal_rp2040::{
    AlarmPulseTimer, PwmRateTimer, Rp2040Board, SioPort, SpindlePwm, TickSlot,
};

use crate::irq::{PULSE, SHARED};

/// PWM slice used as the rate timer
pub const RATE_SLICE: usize = 0;

pub type BoardDriver = Driver<'static, Rp2040Board<'static>>;

pub type BoardPulse = steppulse_core::driver::BoardPulse<Rp2040Board<'static>>;

/// Debounce tick source
pub static DEBOUNCE_SLOT: TickSlot = TickSlot::new();

/// Delay tick source
pub static DELAY_SLOT: TickSlot = TickSlot::new();

pub const LAYOUT: PinLayout = PinLayout {
    stepper: StepperPins {
        step: PortField::new(2, 3),
        dir: PortField::new(5, 3),
        enable: [1 << 8, 0, 0],
    },
    limits: InputMap::new([1 << 9, 1 << 10, 1 << 11]),
    control: InputMap::new([1 << 12, 1 << 13, 1 << 14, 1 << 15]),
    probe: 1 << 16,
    spindle: SpindlePins {
        enable: 1 << 17,
        direction: 1 << 18,
    },
    coolant: CoolantPins {
        flood: 1 << 21,
        mist: 1 << 22,
    },
};

pub fn capabilities() -> DriverCapabilities {
    DriverCapabilities {
        spindle_dir: true,
        variable_spindle: true,
        mist_control: true,
        software_debounce: true,
        step_pulse_delay: true,
        amass_level: 3,
        control_pull_up: true,
        limits_pull_up: true,
        probe_pull_up: true,
        step_timer_hz: STEP_TIMER_HZ,
        pulse_ticks_per_us: PULSE_TICKS_PER_US,
        pwm_clock_hz: PWM_CLOCK_HZ,
    }
}

/// Settings applied at boot
///
/// Stored settings are owned by the host-side controller; until it sends
/// its own these defaults keep the machine safe.
pub fn boot_settings() -> Settings {
    let mut settings = Settings {
        pulse_microseconds: 5,
        pulse_delay_microseconds: 2,
        // Drivers on this board enable on low
        stepper_enable_invert: AxisSignals::all(),
        rpm_max: 24_000.0,
        ..Settings::default()
    };
    settings.flags.hard_limit_enable = true;
    settings
}

/// Create the driver from the chip peripherals
pub fn driver(p: RpPeripherals) -> BoardDriver {
    let peripherals = Peripherals::<Rp2040Board<'static>> {
        step: SioPort::new([p.PIN_2.into(), p.PIN_3.into(), p.PIN_4.into()]),
        dir: SioPort::new([p.PIN_5.into(), p.PIN_6.into(), p.PIN_7.into()]),
        stepper_enable: SioPort::new([p.PIN_8.into()]),
        spindle: SioPort::new([p.PIN_17.into(), p.PIN_18.into()]),
        coolant: SioPort::new([p.PIN_21.into(), p.PIN_22.into()]),
        limits: SioPort::new([p.PIN_9.into(), p.PIN_10.into(), p.PIN_11.into()]),
        control: SioPort::new([
            p.PIN_12.into(),
            p.PIN_13.into(),
            p.PIN_14.into(),
            p.PIN_15.into(),
        ]),
        probe: SioPort::new([p.PIN_16.into()]),
        rate_timer: PwmRateTimer::new(
            Pwm::new_free(p.PWM_SLICE0, PwmConfig::default()),
            RATE_SLICE,
        ),
        pulse_timer: AlarmPulseTimer::new(),
        spindle_pwm: SpindlePwm::new(Pwm::new_output_a(
            p.PWM_SLICE2,
            p.PIN_20,
            PwmConfig::default(),
        )),
        debounce_timer: DEBOUNCE_SLOT.timer(),
        delay_timer: DELAY_SLOT.timer(),
    };

    Driver::new(peripherals, &LAYOUT, capabilities(), &SHARED, &PULSE)
}
