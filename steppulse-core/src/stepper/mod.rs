//! Step pulse generation
//!
//! Two halves cooperate on every rate tick:
//!
//! ```text
//!   rate timer  ──tick──▶ planner ──segment──▶ dir ▶ step ▶ pulse one-shot
//!                                                              │
//!                           step lines back to idle ◀──timeout─┘
//! ```
//!
//! [`Stepper`] owns the direction and driver-enable outputs plus the rate
//! timer. The step outputs and the one-shot sit in a [`PulseChannel`] so
//! that the pulse interrupts can preempt a running rate tick.
//!
//! With a direction-to-step delay configured the pulse one-shot uses its
//! second compare channel: direction is written immediately, the step bits
//! are latched and asserted when the delay compare fires, and the timeout
//! is moved out by one pulse width from there.

mod guard;
mod pulse;
mod rate;

pub use guard::{TickGuard, TickState};
pub use pulse::{PulseChannel, PulsePhase, StepPulse};
pub use rate::{timer_program, RateMode, TimerProgram, MAX_PERIOD};

use steppulse_hal::{OutputPort, RateTimer};

use crate::config::DriverConfig;
use crate::polarity::{write_field, PortField};
use crate::signals::{Axis, AxisSignals, N_AXIS};

/// Rate timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepperState {
    /// Rate timer stopped
    Idle,
    /// Rate timer running, reprogrammed on every tick
    Stepping,
}

/// One step interval as produced by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepSegment {
    /// Direction bits (set = negative direction)
    pub dir: AxisSignals,
    /// Axes that step on this tick
    pub step: AxisSignals,
    /// Spindle PWM duty to hold during this step
    pub spindle_pwm: u16,
    /// Step timer clocks until the next tick
    pub cycles_per_tick: u32,
}

/// Physical location of the stepper outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepperPins {
    /// Step outputs, X at the lowest bit
    pub step: PortField,
    /// Direction outputs, X at the lowest bit
    pub dir: PortField,
    /// Driver enable output per axis
    ///
    /// Axes sharing one enable line list it under the lowest axis only and
    /// use 0 for the others.
    pub enable: [u32; N_AXIS],
}

impl StepperPins {
    fn enable_mask(&self) -> u32 {
        self.enable.iter().fold(0, |acc, pin| acc | pin)
    }
}

/// Direction, driver-enable and rate timer controller
pub struct Stepper<O, R> {
    dir_port: O,
    enable_port: O,
    rate: R,
    pins: StepperPins,
    mode: RateMode,
    state: StepperState,
    program: TimerProgram,
}

impl<O: OutputPort, R: RateTimer> Stepper<O, R> {
    pub fn new(dir_port: O, enable_port: O, rate: R, pins: StepperPins, mode: RateMode) -> Self {
        Self {
            dir_port,
            enable_port,
            rate,
            pins,
            mode,
            state: StepperState::Idle,
            program: TimerProgram::SLOWEST,
        }
    }

    /// Configure output pins and put the rate timer at full clock
    pub fn setup(&mut self) {
        self.dir_port.configure_outputs(self.pins.dir.mask);
        self.enable_port.configure_outputs(self.pins.enable_mask());
        self.rate.set_prescaler(TimerProgram::SLOWEST.prescaler);
    }

    /// Apply a new configuration
    ///
    /// Drives the enable outputs from the de-energize mask.
    pub fn configure(&mut self, cfg: &DriverConfig) {
        self.enable(cfg.stepper_deenergize, cfg);
    }

    pub fn state(&self) -> StepperState {
        self.state
    }

    pub fn mode(&self) -> RateMode {
        self.mode
    }

    /// Last rate timer program
    pub fn program(&self) -> TimerProgram {
        self.program
    }

    /// Drive the direction outputs
    pub fn set_dir_outputs(&mut self, dir: AxisSignals, cfg: &DriverConfig) {
        write_field(
            &mut self.dir_port,
            self.pins.dir,
            dir.bits(),
            cfg.invert.dir.bits(),
        );
    }

    /// Energize the drivers of `axes`, release the others
    pub fn enable(&mut self, axes: AxisSignals, cfg: &DriverConfig) {
        let levels = axes ^ cfg.invert.stepper_enable;
        let value = Axis::ALL
            .iter()
            .filter(|axis| levels.contains(axis.signal()))
            .fold(0, |acc, axis| acc | self.pins.enable[axis.index()]);

        self.enable_port.write_bits(self.pins.enable_mask(), value);
    }

    /// Program the interval until the next rate tick
    pub fn set_cycles_per_tick(&mut self, cycles: u32) -> TimerProgram {
        let program = timer_program(self.mode, cycles);
        if self.mode == RateMode::Prescaled {
            self.rate.set_prescaler(program.prescaler);
        }
        self.rate.set_period(program.period);
        self.program = program;
        program
    }

    /// Energize all drivers and start the rate timer with the longest period
    pub fn wake_up(&mut self, cfg: &DriverConfig) {
        self.enable(AxisSignals::all(), cfg);

        self.rate.set_prescaler(TimerProgram::SLOWEST.prescaler);
        self.rate.set_period(TimerProgram::SLOWEST.period);
        self.program = TimerProgram::SLOWEST;
        self.rate.start();
        self.state = StepperState::Stepping;
    }

    /// Stop the rate timer
    ///
    /// A pulse in flight is left to time out on its own.
    pub fn go_idle(&mut self) {
        self.rate.stop();
        self.state = StepperState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimPins, SimPort, SimTimer, SimTimerState};
    use steppulse_hal::Prescaler;

    // Direction on pins 8..10, enables on 12 (X+Y) and 13 (Z)
    const PINS: StepperPins = StepperPins {
        step: PortField::new(1, 3),
        dir: PortField::new(8, 3),
        enable: [1 << 12, 0, 1 << 13],
    };

    struct Rig {
        pins: SimPins,
        rate: SimTimerState,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                pins: SimPins::new(),
                rate: SimTimerState::new(),
            }
        }

        fn stepper(&self, mode: RateMode) -> Stepper<SimPort<'_>, SimTimer<'_>> {
            let mut stepper = Stepper::new(
                SimPort::new(&self.pins),
                SimPort::new(&self.pins),
                SimTimer::new(&self.rate),
                PINS,
                mode,
            );
            stepper.setup();
            stepper
        }
    }

    #[test]
    fn test_setup_configures_outputs() {
        let rig = Rig::new();
        let _stepper = rig.stepper(RateMode::Amass);
        assert_eq!(rig.pins.output_enables(), 0b11_0111_0000_0000);
    }

    #[test]
    fn test_direction_with_inversion() {
        let rig = Rig::new();
        let mut stepper = rig.stepper(RateMode::Amass);
        let mut cfg = DriverConfig::default();
        cfg.invert.dir = AxisSignals::X;

        stepper.set_dir_outputs(AxisSignals::Z, &cfg);
        assert_eq!(rig.pins.outputs() & PINS.dir.mask, 0b101 << 8);

        stepper.set_dir_outputs(AxisSignals::empty(), &cfg);
        assert_eq!(rig.pins.outputs() & PINS.dir.mask, 0b001 << 8);
    }

    #[test]
    fn test_enable_shared_line() {
        let rig = Rig::new();
        let mut stepper = rig.stepper(RateMode::Amass);
        let mut cfg = DriverConfig::default();

        stepper.enable(AxisSignals::X, &cfg);
        assert_eq!(rig.pins.outputs() & (0b11 << 12), 1 << 12);

        cfg.invert.stepper_enable = AxisSignals::all();
        stepper.enable(AxisSignals::X, &cfg);
        assert_eq!(rig.pins.outputs() & (0b11 << 12), 1 << 13);
    }

    #[test]
    fn test_configure_keeps_listed_axes_energized() {
        let rig = Rig::new();
        let mut stepper = rig.stepper(RateMode::Amass);
        let cfg = DriverConfig {
            stepper_deenergize: AxisSignals::Z,
            ..DriverConfig::default()
        };

        stepper.configure(&cfg);
        assert_eq!(rig.pins.outputs() & (0b11 << 12), 1 << 13);
    }

    #[test]
    fn test_wake_up_and_idle() {
        let rig = Rig::new();
        let mut stepper = rig.stepper(RateMode::Prescaled);
        let cfg = DriverConfig::default();

        stepper.set_cycles_per_tick(600_000);
        assert_eq!(rig.rate.prescaler(), Prescaler::Div64);

        stepper.wake_up(&cfg);
        assert_eq!(stepper.state(), StepperState::Stepping);
        assert!(rig.rate.is_running());
        assert_eq!(rig.rate.period(), MAX_PERIOD);
        assert_eq!(rig.rate.prescaler(), Prescaler::Div1);
        assert_eq!(rig.pins.outputs() & (0b11 << 12), 0b11 << 12);

        stepper.go_idle();
        assert_eq!(stepper.state(), StepperState::Idle);
        assert!(!rig.rate.is_running());
    }

    #[test]
    fn test_amass_keeps_full_clock() {
        let rig = Rig::new();
        let mut stepper = rig.stepper(RateMode::Amass);

        let program = stepper.set_cycles_per_tick(200_000);
        assert_eq!(program, TimerProgram::SLOWEST);
        assert_eq!(rig.rate.prescaler(), Prescaler::Div1);
        assert_eq!(rig.rate.period(), MAX_PERIOD);

        stepper.set_cycles_per_tick(1234);
        assert_eq!(rig.rate.period(), 1234);
    }
}
