//! Driver behavior through the dispatch interface on the simulated board

use std::collections::VecDeque;

use steppulse_core::config::PulseConfig;
use steppulse_core::coolant::CoolantPins;
use steppulse_core::driver::HAL_VERSION;
use steppulse_core::polarity::{InputMap, PortField};
use steppulse_core::sim::{SimBoard, SimHardware, SimPulse};
use steppulse_core::spindle::SpindlePins;
use steppulse_core::stepper::{PulsePhase, StepperPins, StepperState, MAX_PERIOD};
use steppulse_core::{
    AxisSignals, ControlSignals, CoolantState, Driver, DriverCapabilities, DriverError,
    MotionEvents, PinLayout, Settings, SharedState, SpindleState, StepSegment, StepperHal,
};

const STEP: PortField = PortField::new(0, 3);
const DIR: PortField = PortField::new(3, 3);
const LIMIT_X: u32 = 1 << 9;
const LIMIT_Z: u32 = 1 << 11;
const RESET: u32 = 1 << 12;
const FEED_HOLD: u32 = 1 << 13;
const CYCLE_START: u32 = 1 << 14;
const SAFETY_DOOR: u32 = 1 << 15;
const PROBE: u32 = 1 << 16;
const SPINDLE_ENABLE: u32 = 1 << 17;
const SPINDLE_DIR: u32 = 1 << 18;
const FLOOD: u32 = 1 << 19;
const MIST: u32 = 1 << 20;

const LAYOUT: PinLayout = PinLayout {
    stepper: StepperPins {
        step: STEP,
        dir: DIR,
        enable: [1 << 6, 1 << 7, 1 << 8],
    },
    limits: InputMap::new([LIMIT_X, 1 << 10, LIMIT_Z]),
    control: InputMap::new([RESET, FEED_HOLD, CYCLE_START, SAFETY_DOOR]),
    probe: PROBE,
    spindle: SpindlePins {
        enable: SPINDLE_ENABLE,
        direction: SPINDLE_DIR,
    },
    coolant: CoolantPins {
        flood: FLOOD,
        mist: MIST,
    },
};

/// Scripted motion layer
struct Planner<'a> {
    shared: &'a SharedState,
    segments: VecDeque<StepSegment>,
    ticks: u32,
    limits: Vec<AxisSignals>,
    control: Vec<ControlSignals>,
    polls: u32,
    /// Polls before the wait ends
    wait_polls: u32,
    /// End the wait by refusing to block instead of expiring the delay
    abort_wait: bool,
    /// Pulse alarm firing while the planner runs
    alarm: Option<&'a SimPulse<'a>>,
    /// Pulse phase before and after each alarm
    alarm_phases: Vec<(PulsePhase, PulsePhase)>,
}

impl<'a> Planner<'a> {
    fn new(shared: &'a SharedState) -> Self {
        Self {
            shared,
            segments: VecDeque::new(),
            ticks: 0,
            limits: Vec::new(),
            control: Vec::new(),
            polls: 0,
            wait_polls: 3,
            abort_wait: false,
            alarm: None,
            alarm_phases: Vec::new(),
        }
    }

    fn with_segments(shared: &'a SharedState, segments: &[StepSegment]) -> Self {
        let mut planner = Self::new(shared);
        planner.segments.extend(segments.iter().copied());
        planner
    }
}

impl MotionEvents for Planner<'_> {
    fn on_stepper_tick(&mut self) -> Option<StepSegment> {
        self.ticks += 1;
        if let Some(pulse) = self.alarm {
            let before = pulse.phase();
            pulse.on_timeout();
            self.alarm_phases.push((before, pulse.phase()));
        }
        self.segments.pop_front()
    }

    fn on_limit_triggered(&mut self, limits: AxisSignals) {
        self.limits.push(limits);
    }

    fn on_control_triggered(&mut self, control: ControlSignals) {
        self.control.push(control);
    }

    fn is_blocking_allowed(&mut self) -> bool {
        self.polls += 1;
        if self.polls < self.wait_polls {
            return true;
        }
        if self.abort_wait {
            return false;
        }
        self.shared.expire_delay();
        true
    }
}

fn driver<'a>(
    hw: &'a SimHardware,
    shared: &'a SharedState,
    pulse: &'a SimPulse<'a>,
    caps: DriverCapabilities,
) -> Driver<'a, SimBoard<'a>> {
    Driver::new(hw.peripherals(), &LAYOUT, caps, shared, pulse)
}

fn ready_driver<'a>(
    hw: &'a SimHardware,
    shared: &'a SharedState,
    pulse: &'a SimPulse<'a>,
    settings: &Settings,
) -> Driver<'a, SimBoard<'a>> {
    let mut driver = driver(hw, shared, pulse, DriverCapabilities::default());
    driver.setup(settings).unwrap();
    driver
}

fn segment(step: AxisSignals, dir: AxisSignals, cycles: u32) -> StepSegment {
    StepSegment {
        dir,
        step,
        spindle_pwm: 0,
        cycles_per_tick: cycles,
    }
}

#[test]
fn test_setup_applies_settings() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let driver = ready_driver(&hw, &shared, &pulse, &Settings::default());

    assert!(driver.is_ready());
    assert_eq!(shared.config.revision(), 1);

    let cfg = driver.config();
    assert_eq!(
        cfg.pulse,
        PulseConfig {
            width_ticks: 49,
            delay_ticks: None
        }
    );
    assert_eq!(cfg.spindle.period, 625);
    assert_eq!(hw.pulse.timeout(), 49);
    assert_eq!(hw.pwm.period(), 625);
    assert!(!hw.pwm.output());

    assert_eq!(driver.stepper_state(), StepperState::Idle);
    assert_eq!(hw.pins.outputs() & (STEP.mask | DIR.mask), 0);
    assert_eq!(driver.spindle_get_state(), SpindleState::empty());
    assert_eq!(driver.coolant_get_state(), CoolantState::empty());
    assert_eq!(driver.capabilities().amass_level, 3);
}

#[test]
fn test_version_mismatch_is_rejected() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = driver(&hw, &shared, &pulse, DriverCapabilities::default());

    let settings = Settings {
        version: 12,
        ..Settings::default()
    };
    assert_eq!(driver.setup(&settings), Err(DriverError::VersionMismatch));
    assert!(!driver.is_ready());
    assert_eq!(shared.config.revision(), 0);
    assert_eq!(steppulse_core::driver::check_version(HAL_VERSION), Ok(()));
}

#[test]
fn test_wake_up_primes_once_and_runs_to_idle() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let mut planner = Planner::with_segments(
        &shared,
        &[
            segment(AxisSignals::X, AxisSignals::X, 2000),
            segment(AxisSignals::Y | AxisSignals::Z, AxisSignals::empty(), 3000),
        ],
    );

    driver.stepper_wake_up(&mut planner);
    assert_eq!(planner.ticks, 1);
    assert_eq!(driver.stepper_state(), StepperState::Stepping);
    assert!(hw.rate.is_running());
    assert_eq!(hw.rate.period(), 2000);
    assert_eq!(hw.pins.outputs() & STEP.mask, 0b001);
    assert_eq!(hw.pins.outputs() & DIR.mask, 0b001 << 3);
    assert_eq!(hw.pins.outputs() & (0b111 << 6), 0b111 << 6);
    assert_eq!(driver.pulse_phase(), PulsePhase::Pending);

    pulse.on_timeout();
    assert_eq!(hw.pins.outputs() & STEP.mask, 0);
    assert_eq!(driver.pulse_phase(), PulsePhase::Clear);

    driver.on_rate_tick(&mut planner);
    assert_eq!(planner.ticks, 2);
    assert_eq!(hw.rate.period(), 3000);
    assert_eq!(hw.pins.outputs() & STEP.mask, 0b110);
    assert_eq!(hw.pins.outputs() & DIR.mask, 0);

    driver.on_rate_tick(&mut planner);
    assert_eq!(planner.ticks, 3);
    assert_eq!(driver.stepper_state(), StepperState::Idle);
    assert!(!hw.rate.is_running());

    // Ticks after idle do not reach the planner
    driver.on_rate_tick(&mut planner);
    assert_eq!(planner.ticks, 3);
}

#[test]
fn test_pulse_ends_while_rate_tick_is_in_planner() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let mut planner = Planner::with_segments(
        &shared,
        &[
            segment(AxisSignals::X, AxisSignals::empty(), 1500),
            segment(AxisSignals::Y, AxisSignals::empty(), 1500),
        ],
    );

    driver.stepper_wake_up(&mut planner);
    assert_eq!(driver.pulse_phase(), PulsePhase::Pending);

    // The timeout alarm reaches the step lines while the driver is busy
    planner.alarm = Some(&pulse);
    driver.on_rate_tick(&mut planner);
    assert_eq!(
        planner.alarm_phases,
        vec![(PulsePhase::Pending, PulsePhase::Clear)]
    );
    assert_eq!(hw.pins.outputs() & STEP.mask, 0b010);
    assert_eq!(driver.pulse_phase(), PulsePhase::Pending);
}

#[test]
fn test_idle_then_wake_with_pulse_in_flight() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let mut planner = Planner::with_segments(
        &shared,
        &[segment(AxisSignals::X, AxisSignals::empty(), 1500); 3],
    );

    driver.stepper_wake_up(&mut planner);
    assert_eq!(driver.pulse_phase(), PulsePhase::Pending);

    // The step pulse outlives the rate timer
    driver.stepper_go_idle();
    assert_eq!(driver.stepper_state(), StepperState::Idle);
    assert_eq!(driver.pulse_phase(), PulsePhase::Pending);
    assert_eq!(hw.pins.outputs() & STEP.mask, 0b001);

    driver.stepper_wake_up(&mut planner);
    assert_eq!(planner.ticks, 2);
    assert_eq!(driver.stepper_state(), StepperState::Stepping);
    assert_eq!(driver.pulse_phase(), PulsePhase::Pending);
    assert_eq!(hw.pulse.starts(), 2);
    assert_eq!(hw.rate.period(), 1500);

    pulse.on_timeout();
    assert_eq!(hw.pins.outputs() & STEP.mask, 0);
    assert_eq!(driver.pulse_phase(), PulsePhase::Clear);
}

#[test]
fn test_wake_up_with_empty_planner_goes_idle() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let mut planner = Planner::new(&shared);

    driver.stepper_wake_up(&mut planner);
    assert_eq!(planner.ticks, 1);
    assert_eq!(driver.stepper_state(), StepperState::Idle);
    assert_eq!(hw.rate.period(), MAX_PERIOD);
}

#[test]
fn test_nested_rate_tick_is_dropped() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let mut planner = Planner::with_segments(
        &shared,
        &[segment(AxisSignals::X, AxisSignals::empty(), 1000); 4],
    );
    driver.stepper_wake_up(&mut planner);

    // Simulate a tick still in progress
    assert!(shared.tick.enter());
    driver.on_rate_tick(&mut planner);
    assert_eq!(planner.ticks, 1);
    assert_eq!(driver.tick_overruns(), 1);
    shared.tick.leave();

    driver.on_rate_tick(&mut planner);
    assert_eq!(planner.ticks, 2);
}

#[test]
fn test_delayed_pulse_through_driver() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let settings = Settings {
        pulse_delay_microseconds: 3,
        ..Settings::default()
    };
    let mut driver = ready_driver(&hw, &shared, &pulse, &settings);
    let mut planner =
        Planner::with_segments(&shared, &[segment(AxisSignals::Z, AxisSignals::Z, 500)]);

    driver.stepper_wake_up(&mut planner);
    assert_eq!(driver.pulse_phase(), PulsePhase::Delayed);
    assert_eq!(hw.pins.outputs() & STEP.mask, 0);
    assert_eq!(hw.pins.outputs() & DIR.mask, 0b100 << 3);
    assert_eq!(hw.pulse.timeout(), 15 + 49);

    pulse.on_delay();
    assert_eq!(hw.pins.outputs() & STEP.mask, 0b100);
    assert_eq!(hw.pulse.extended(), Some(49));

    pulse.on_timeout();
    assert_eq!(hw.pins.outputs() & STEP.mask, 0);
}

#[test]
fn test_delay_without_capability_uses_plain_pulse() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let caps = DriverCapabilities {
        step_pulse_delay: false,
        ..DriverCapabilities::default()
    };
    let mut driver = driver(&hw, &shared, &pulse, caps);
    let settings = Settings {
        pulse_delay_microseconds: 3,
        ..Settings::default()
    };
    driver.setup(&settings).unwrap();

    assert_eq!(driver.config().pulse.delay_ticks, None);
    driver.stepper_pulse_start(&segment(AxisSignals::X, AxisSignals::empty(), 0));
    assert_eq!(driver.pulse_phase(), PulsePhase::Pending);
}

#[test]
fn test_pulse_syncs_spindle_duty() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());

    let mut seg = segment(AxisSignals::X, AxisSignals::empty(), 1000);
    seg.spindle_pwm = 300;
    driver.stepper_pulse_start(&seg);
    assert!(hw.pwm.output());
    assert_eq!(hw.pwm.compare(), 300);
    assert!(hw.pins.output_high(SPINDLE_ENABLE));

    // Unchanged duty leaves the PWM alone
    let disconnects = hw.pwm.disconnects();
    pulse.on_timeout();
    driver.stepper_pulse_start(&seg);
    assert_eq!(hw.pwm.disconnects(), disconnects);

    seg.spindle_pwm = driver.spindle_pwm_off();
    pulse.on_timeout();
    driver.stepper_pulse_start(&seg);
    assert!(!hw.pwm.output());
}

#[test]
fn test_spindle_through_driver() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());

    let duty = driver.spindle_set_state(SpindleState::CW, 500.0, 100).unwrap();
    assert_eq!(duty.value, 312);
    assert_eq!(hw.pwm.compare(), 312);
    assert_eq!(driver.spindle_get_state(), SpindleState::ON);
    assert_eq!(driver.spindle_compute_duty(500.0, 100), duty);

    driver.spindle_set_state(SpindleState::ON | SpindleState::CCW, 500.0, 100);
    assert!(hw.pins.output_high(SPINDLE_DIR));
    assert_eq!(
        driver.spindle_get_state(),
        SpindleState::ON | SpindleState::CCW
    );

    let off = driver.spindle_set_state(SpindleState::empty(), 0.0, 100).unwrap();
    assert_eq!(off.value, driver.spindle_pwm_off());
    assert!(!hw.pins.output_high(SPINDLE_ENABLE));
    assert!(!driver.spindle_get_state().is_on());

    assert_eq!(driver.spindle_set_speed(100), 100);
    assert_eq!(hw.pwm.compare(), 100);
}

#[test]
fn test_on_off_spindle() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let caps = DriverCapabilities {
        variable_spindle: false,
        ..DriverCapabilities::default()
    };
    let mut driver = driver(&hw, &shared, &pulse, caps);
    // PWM settings are not validated without a PWM output
    let settings = Settings {
        spindle_pwm_freq: 0.0,
        ..Settings::default()
    };
    driver.setup(&settings).unwrap();

    assert_eq!(driver.spindle_set_state(SpindleState::CW, 0.0, 100), None);
    assert!(hw.pins.output_high(SPINDLE_ENABLE));
    assert!(!hw.pwm.is_running());
}

#[test]
fn test_settings_change_reprograms() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());

    let settings = Settings {
        pulse_microseconds: 20,
        step_invert: AxisSignals::Y,
        stepper_deenergize: AxisSignals::Z,
        ..Settings::default()
    };
    driver.settings_changed(&settings).unwrap();

    assert_eq!(shared.config.revision(), 2);
    assert_eq!(driver.config().pulse.width_ticks, 99);
    assert_eq!(hw.pulse.timeout(), 99);
    // Step lines idle at their inverted level
    assert_eq!(hw.pins.outputs() & STEP.mask, 0b010);
    // Only axes kept energized stay enabled
    assert_eq!(hw.pins.outputs() & (0b111 << 6), 1 << 8);
}

#[test]
fn test_invalid_settings_keep_previous_config() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let before = driver.config();

    let settings = Settings {
        pulse_microseconds: 0,
        ..Settings::default()
    };
    assert_eq!(
        driver.settings_changed(&settings),
        Err(DriverError::PulseWidthOutOfRange)
    );

    let settings = Settings {
        spindle_pwm_freq: 1.0,
        ..Settings::default()
    };
    assert_eq!(
        driver.settings_changed(&settings),
        Err(DriverError::PwmFrequencyOutOfRange)
    );

    assert_eq!(driver.config(), before);
    assert_eq!(shared.config.revision(), 1);
}

#[test]
fn test_debounced_limit_reports_once() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut settings = Settings::default();
    settings.flags.hard_limit_enable = true;
    let mut driver = ready_driver(&hw, &shared, &pulse, &settings);
    let mut planner = Planner::new(&shared);

    driver.limits_enable(true);
    assert_eq!(hw.pins.interrupts_enabled() & LIMIT_X, LIMIT_X);

    hw.pins.set_inputs(LIMIT_X, true);
    driver.on_limit_edge(&mut planner);
    assert!(driver.is_debouncing());
    assert!(hw.debounce.is_running());

    // A bounce re-arms the window
    hw.pins.set_inputs(LIMIT_X, false);
    driver.on_limit_edge(&mut planner);
    driver.on_debounce_tick(&mut planner);
    hw.pins.set_inputs(LIMIT_X, true);
    driver.on_limit_edge(&mut planner);

    for _ in 0..2 {
        driver.on_debounce_tick(&mut planner);
    }
    assert!(planner.limits.is_empty());

    driver.on_debounce_tick(&mut planner);
    assert_eq!(planner.limits, vec![AxisSignals::X]);
    assert!(!driver.is_debouncing());

    for _ in 0..5 {
        driver.on_debounce_tick(&mut planner);
    }
    assert_eq!(planner.limits.len(), 1);
    assert_eq!(driver.limits_get_state(), AxisSignals::X);
}

#[test]
fn test_limit_without_debounce_reports_immediately() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let caps = DriverCapabilities {
        software_debounce: false,
        ..DriverCapabilities::default()
    };
    let mut driver = driver(&hw, &shared, &pulse, caps);
    let mut settings = Settings::default();
    settings.flags.hard_limit_enable = true;
    driver.setup(&settings).unwrap();
    let mut planner = Planner::new(&shared);

    hw.pins.set_inputs(LIMIT_Z, true);
    driver.on_limit_edge(&mut planner);
    assert_eq!(planner.limits, vec![AxisSignals::Z]);
    assert!(!hw.debounce.is_running());
}

#[test]
fn test_control_priority_and_inversion() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let mut planner = Planner::new(&shared);

    hw.pins.set_inputs(CYCLE_START | SAFETY_DOOR, true);
    driver.on_control_edge(&mut planner);
    assert_eq!(planner.control, vec![ControlSignals::SAFETY_DOOR]);

    hw.pins.set_inputs(RESET, true);
    assert_eq!(driver.control_get_state(), ControlSignals::RESET);

    // Inversion is applied after the priority selection
    let settings = Settings {
        control_invert: ControlSignals::FEED_HOLD,
        ..Settings::default()
    };
    driver.settings_changed(&settings).unwrap();
    assert_eq!(
        driver.control_get_state(),
        ControlSignals::RESET | ControlSignals::FEED_HOLD
    );
}

#[test]
fn test_probe_and_coolant() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());

    hw.pins.set_inputs(PROBE, true);
    assert!(!driver.probe_get_state());
    driver.probe_configure_invert_mask(true);
    assert!(driver.probe_get_state());

    driver.coolant_set_state(CoolantState::FLOOD | CoolantState::MIST);
    assert!(hw.pins.output_high(FLOOD | MIST));
    assert_eq!(driver.coolant_get_state(), CoolantState::all());

    driver.coolant_set_state(CoolantState::MIST);
    assert!(!hw.pins.output_high(FLOOD));
    assert_eq!(driver.coolant_get_state(), CoolantState::MIST);
}

static DELAY_DONE: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

fn delay_done() {
    DELAY_DONE.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
}

#[test]
fn test_delay_with_callback() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());
    let mut planner = Planner::new(&shared);

    assert!(driver.delay_ms(20, Some(delay_done), &mut planner));
    assert!(shared.is_delay_pending());
    assert!(hw.delay.is_running());
    assert_eq!(hw.delay.interval_ms(), 20);
    assert_eq!(planner.polls, 0);

    driver.on_delay_tick();
    assert!(!shared.is_delay_pending());
    assert_eq!(DELAY_DONE.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[test]
fn test_blocking_delay() {
    let hw = SimHardware::new();
    let shared = SharedState::new();
    let pulse = SimPulse::new();
    let mut driver = ready_driver(&hw, &shared, &pulse, &Settings::default());

    let mut planner = Planner::new(&shared);
    assert!(driver.delay_ms(5, None, &mut planner));
    assert_eq!(planner.polls, 3);
    assert!(!shared.is_delay_pending());
    assert!(!hw.delay.is_running());

    let mut planner = Planner::new(&shared);
    planner.abort_wait = true;
    assert!(!driver.delay_ms(5, None, &mut planner));
    assert!(!shared.is_delay_pending());
    assert!(!hw.delay.is_running());

    let mut planner = Planner::new(&shared);
    assert!(driver.delay_ms(0, None, &mut planner));
    assert_eq!(planner.polls, 0);
}
