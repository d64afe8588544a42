//! Driver lifecycle and dispatch
//!
//! [`Driver`] owns every peripheral of the subsystem and implements
//! [`StepperHal`]. Board crates construct it from a [`Peripherals`] bundle
//! and a [`PinLayout`], call [`Driver::setup`] once settings are loaded and
//! route their interrupt sources to the `on_*` entry points:
//!
//! | Interrupt source          | Entry point                  |
//! |---------------------------|------------------------------|
//! | rate timer period         | [`Driver::on_rate_tick`]     |
//! | pulse timer compare 0     | [`PulseChannel::on_timeout`] |
//! | pulse timer compare 1     | [`PulseChannel::on_delay`]   |
//! | limit pin edge            | [`Driver::on_limit_edge`]    |
//! | debounce tick             | [`Driver::on_debounce_tick`] |
//! | control pin edge          | [`Driver::on_control_edge`]  |
//! | delay tick                | [`Driver::on_delay_tick`]    |
//!
//! The step outputs and pulse timer live in a [`PulseChannel`] owned by the
//! board, not in the driver. The pulse interrupts call the channel directly
//! and take only its lock, so they can preempt a rate tick that is still in
//! the planner. A board must not hold the driver lock across the pulse
//! interrupts, otherwise a slow planner callback stretches the step pulse.

mod capabilities;
mod shared;

pub use capabilities::DriverCapabilities;
pub use shared::SharedState;

use embassy_sync::blocking_mutex::raw::RawMutex;
use steppulse_hal::{InputPort, OutputPort, PulseTimer, PwmTimer, RateTimer, TickTimer};

use crate::config::DriverConfig;
use crate::coolant::{Coolant, CoolantPins};
use crate::delay::{Delay, DelayCallback, DelayStart};
use crate::error::DriverError;
use crate::inputs::{ControlInputs, LimitInputs, Probe, N_CONTROL};
use crate::polarity::InputMap;
use crate::settings::Settings;
use crate::signals::{AxisSignals, ControlSignals, CoolantState, SpindleState, N_AXIS};
use crate::spindle::{Spindle, SpindleDuty, SpindlePins};
use crate::stepper::{
    PulseChannel, PulsePhase, RateMode, StepPulse, StepSegment, Stepper, StepperPins,
    StepperState,
};
use crate::traits::{MotionEvents, StepperHal};

/// Driver interface version expected by the motion layer
pub const HAL_VERSION: u8 = 4;

/// Settings layout version this driver understands
pub const SETTINGS_VERSION: u8 = 13;

/// Check a motion layer's interface version against this driver
pub fn check_version(version: u8) -> Result<(), DriverError> {
    if version == HAL_VERSION {
        Ok(())
    } else {
        Err(DriverError::VersionMismatch)
    }
}

/// Peripheral types of a board
pub trait Board {
    type Output: OutputPort;
    type Input: InputPort;
    type Rate: RateTimer;
    type Pulse: PulseTimer;
    type Pwm: PwmTimer;
    type Tick: TickTimer;
    /// Lock guarding the [`PulseChannel`]
    ///
    /// Must keep the pulse timer interrupts out while held.
    type PulseMutex: RawMutex;
}

/// Step pulse channel of a board
pub type BoardPulse<B> =
    PulseChannel<<B as Board>::PulseMutex, <B as Board>::Output, <B as Board>::Pulse>;

/// Peripheral handles consumed by [`Driver::new`]
pub struct Peripherals<B: Board> {
    pub step: B::Output,
    pub dir: B::Output,
    pub stepper_enable: B::Output,
    pub spindle: B::Output,
    pub coolant: B::Output,
    pub limits: B::Input,
    pub control: B::Input,
    pub probe: B::Input,
    pub rate_timer: B::Rate,
    pub pulse_timer: B::Pulse,
    pub spindle_pwm: B::Pwm,
    pub debounce_timer: B::Tick,
    pub delay_timer: B::Tick,
}

/// Physical pin assignment of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinLayout {
    pub stepper: StepperPins,
    /// Limit inputs for X, Y, Z
    pub limits: InputMap<N_AXIS>,
    /// Control inputs for reset, feed hold, cycle start, safety door
    pub control: InputMap<N_CONTROL>,
    pub probe: u32,
    pub spindle: SpindlePins,
    pub coolant: CoolantPins,
}

/// Stepper pulse subsystem driver
pub struct Driver<'a, B: Board> {
    caps: DriverCapabilities,
    shared: &'a SharedState,
    stepper: Stepper<B::Output, B::Rate>,
    pulse: &'a BoardPulse<B>,
    limits: LimitInputs<B::Input, B::Tick>,
    control: ControlInputs<B::Input>,
    probe: Probe<B::Input>,
    spindle: Spindle<B::Output, B::Pwm>,
    coolant: Coolant<B::Output>,
    delay: Delay<'a, B::Tick>,
    /// Spindle duty last applied
    current_pwm: u16,
    /// Setup completed with a supported settings version
    ready: bool,
}

impl<'a, B: Board> Driver<'a, B> {
    /// Create a driver; no hardware is touched until [`setup`](Self::setup)
    ///
    /// The step outputs and pulse timer are installed into `pulse`.
    pub fn new(
        peripherals: Peripherals<B>,
        layout: &PinLayout,
        caps: DriverCapabilities,
        shared: &'a SharedState,
        pulse: &'a BoardPulse<B>,
    ) -> Self {
        let p = peripherals;
        pulse.install(StepPulse::new(p.step, p.pulse_timer, layout.stepper.step));

        Self {
            caps,
            shared,
            stepper: Stepper::new(
                p.dir,
                p.stepper_enable,
                p.rate_timer,
                layout.stepper,
                RateMode::for_level(caps.amass_level),
            ),
            pulse,
            limits: LimitInputs::new(
                p.limits,
                p.debounce_timer,
                layout.limits,
                caps.software_debounce,
            ),
            control: ControlInputs::new(p.control, layout.control),
            probe: Probe::new(p.probe, layout.probe),
            spindle: Spindle::new(
                p.spindle,
                p.spindle_pwm,
                layout.spindle,
                caps.variable_spindle,
                caps.spindle_dir,
            ),
            coolant: Coolant::new(p.coolant, layout.coolant, caps.mist_control),
            delay: Delay::new(p.delay_timer, shared.delay_flag()),
            current_pwm: 0,
            ready: false,
        }
    }

    /// Configure pins and timers and apply the initial settings
    ///
    /// Fails with [`DriverError::VersionMismatch`] when the settings were
    /// written by an incompatible layout; pins are configured regardless
    /// but no settings are applied.
    pub fn setup(&mut self, settings: &Settings) -> Result<(), DriverError> {
        self.stepper.setup();
        self.pulse.with(StepPulse::setup);
        self.spindle.setup();
        self.coolant.setup();
        self.probe.configure(self.caps.probe_pull_up);

        if settings.version != SETTINGS_VERSION {
            #[cfg(feature = "defmt")]
            defmt::warn!("Settings version {} not supported", settings.version);
            return Err(DriverError::VersionMismatch);
        }

        self.ready = true;
        if let Err(err) = self.settings_changed(settings) {
            self.ready = false;
            return Err(err);
        }

        let cfg = self.config();
        self.spindle_set_state(SpindleState::empty(), 0.0, 100);
        self.coolant.set_state(CoolantState::empty(), &cfg);
        self.stepper.set_dir_outputs(AxisSignals::empty(), &cfg);

        #[cfg(feature = "defmt")]
        defmt::debug!("Driver ready, rate mode {}", self.stepper.mode());

        Ok(())
    }

    /// Check if setup completed
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Current configuration snapshot
    pub fn config(&self) -> DriverConfig {
        self.shared.config.load()
    }

    pub fn stepper_state(&self) -> StepperState {
        self.stepper.state()
    }

    pub fn pulse_phase(&self) -> PulsePhase {
        self.pulse.phase()
    }

    /// Rate ticks dropped because the previous one was still running
    pub fn tick_overruns(&self) -> u32 {
        self.shared.tick.overruns()
    }

    /// Check if a limit debounce window is running
    pub fn is_debouncing(&self) -> bool {
        self.limits.is_debouncing()
    }

    fn apply_duty(&mut self, duty: u16, cfg: &DriverConfig) -> u16 {
        self.current_pwm = self.spindle.set_speed(
            duty,
            &cfg.spindle,
            cfg.invert.spindle,
            cfg.flags.spindle_disable_with_zero_speed,
        );
        self.current_pwm
    }

    fn pulse(&mut self, segment: &StepSegment, cfg: &DriverConfig) {
        if self.spindle.is_variable() && segment.spindle_pwm != self.current_pwm {
            self.apply_duty(segment.spindle_pwm, cfg);
        }
        self.stepper.set_dir_outputs(segment.dir, cfg);
        self.pulse.with(|pulse| pulse.start(segment.step));
    }

    /// Pull one segment from the planner and apply it
    fn next_segment<E: MotionEvents>(&mut self, events: &mut E, cfg: &DriverConfig) {
        match events.on_stepper_tick() {
            Some(segment) => {
                self.pulse(&segment, cfg);
                self.stepper.set_cycles_per_tick(segment.cycles_per_tick);
            }
            None => self.stepper.go_idle(),
        }
    }

    /// Rate timer interrupt
    ///
    /// Both the step output and the next interval are programmed before
    /// returning. A tick that arrives while the previous one is still in
    /// the planner is dropped.
    pub fn on_rate_tick<E: MotionEvents>(&mut self, events: &mut E) {
        let shared = self.shared;
        if !shared.tick.enter() {
            return;
        }

        if self.stepper.state() == StepperState::Stepping {
            let cfg = self.config();
            self.next_segment(events, &cfg);
        }

        shared.tick.leave();
    }

    /// Limit pin edge interrupt
    pub fn on_limit_edge<E: MotionEvents>(&mut self, events: &mut E) {
        let cfg = self.config();
        if let Some(limits) = self.limits.on_edge(&cfg) {
            events.on_limit_triggered(limits);
        }
    }

    /// Debounce tick interrupt
    pub fn on_debounce_tick<E: MotionEvents>(&mut self, events: &mut E) {
        let cfg = self.config();
        if let Some(limits) = self.limits.on_debounce_tick(&cfg) {
            events.on_limit_triggered(limits);
        }
    }

    /// Control pin edge interrupt
    pub fn on_control_edge<E: MotionEvents>(&mut self, events: &mut E) {
        let cfg = self.config();
        if let Some(control) = self.control.on_edge(&cfg) {
            events.on_control_triggered(control);
        }
    }

    /// Delay tick interrupt
    pub fn on_delay_tick(&mut self) {
        self.delay.on_tick();
    }
}

impl<B: Board> StepperHal for Driver<'_, B> {
    fn capabilities(&self) -> &DriverCapabilities {
        &self.caps
    }

    fn settings_changed(&mut self, settings: &Settings) -> Result<(), DriverError> {
        let cfg = DriverConfig::derive(settings, &self.caps)?;
        self.shared.config.store(&cfg);

        if !self.ready {
            return Ok(());
        }

        self.stepper.configure(&cfg);
        self.pulse.with(|pulse| pulse.configure(&cfg));
        self.spindle.configure(&cfg.spindle);
        self.current_pwm = cfg.spindle.off_value;
        self.control.configure(&cfg);
        self.limits.configure(&cfg);
        self.probe.configure(self.caps.probe_pull_up);
        self.probe.configure_invert_mask(false, &cfg);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Settings applied: pulse {} ticks, delay {}, pwm period {}",
            cfg.pulse.width_ticks,
            cfg.pulse.delay_ticks,
            cfg.spindle.period
        );

        Ok(())
    }

    fn delay_ms<E: MotionEvents>(
        &mut self,
        ms: u16,
        callback: Option<DelayCallback>,
        events: &mut E,
    ) -> bool {
        match self.delay.start(ms, callback) {
            DelayStart::Elapsed | DelayStart::Armed => true,
            DelayStart::MustWait => {
                while self.delay.is_pending() {
                    if !events.is_blocking_allowed() {
                        self.delay.cancel();
                        return false;
                    }
                }
                // The flag may have been cleared without the tick handler
                self.delay.cancel();
                true
            }
        }
    }

    fn stepper_wake_up<E: MotionEvents>(&mut self, events: &mut E) {
        let cfg = self.config();
        self.stepper.wake_up(&cfg);

        let shared = self.shared;
        if shared.tick.enter() {
            self.next_segment(events, &cfg);
            shared.tick.leave();
        }
    }

    fn stepper_go_idle(&mut self) {
        self.stepper.go_idle();
    }

    fn stepper_enable(&mut self, axes: AxisSignals) {
        let cfg = self.config();
        self.stepper.enable(axes, &cfg);
    }

    fn stepper_cycles_per_tick(&mut self, cycles: u32) {
        self.stepper.set_cycles_per_tick(cycles);
    }

    fn stepper_pulse_start(&mut self, segment: &StepSegment) {
        let cfg = self.config();
        self.pulse(segment, &cfg);
    }

    fn stepper_set_step_outputs(&mut self, step: AxisSignals) {
        self.pulse.with(|pulse| pulse.set_outputs(step));
    }

    fn stepper_set_dir_outputs(&mut self, dir: AxisSignals) {
        let cfg = self.config();
        self.stepper.set_dir_outputs(dir, &cfg);
    }

    fn limits_enable(&mut self, on: bool) {
        let cfg = self.config();
        self.limits.enable(on, &cfg);
    }

    fn limits_get_state(&self) -> AxisSignals {
        self.limits.get_state(&self.config())
    }

    fn control_get_state(&self) -> ControlSignals {
        self.control.get_state(&self.config())
    }

    fn spindle_set_state(
        &mut self,
        state: SpindleState,
        rpm: f32,
        override_percent: u8,
    ) -> Option<SpindleDuty> {
        let cfg = self.config();
        let duty = self.spindle.set_state(
            state,
            rpm,
            override_percent,
            &cfg.spindle,
            cfg.invert.spindle,
            cfg.flags.spindle_disable_with_zero_speed,
        );
        if let Some(duty) = duty {
            self.current_pwm = duty.value;
        }
        duty
    }

    fn spindle_get_state(&self) -> SpindleState {
        self.spindle.get_state(self.config().invert.spindle)
    }

    fn spindle_set_speed(&mut self, duty: u16) -> u16 {
        let cfg = self.config();
        self.apply_duty(duty, &cfg)
    }

    fn spindle_compute_duty(&self, rpm: f32, override_percent: u8) -> SpindleDuty {
        self.config().spindle.compute_duty(rpm, override_percent)
    }

    fn spindle_pwm_off(&self) -> u16 {
        self.config().spindle.off_value
    }

    fn coolant_set_state(&mut self, state: CoolantState) {
        let cfg = self.config();
        self.coolant.set_state(state, &cfg);
    }

    fn coolant_get_state(&self) -> CoolantState {
        self.coolant.get_state(&self.config())
    }

    fn probe_get_state(&self) -> bool {
        self.probe.get_state()
    }

    fn probe_configure_invert_mask(&mut self, is_probe_away: bool) {
        let cfg = self.config();
        self.probe.configure_invert_mask(is_probe_away, &cfg);
    }
}
