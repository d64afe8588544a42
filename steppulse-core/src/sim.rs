//! Simulated board for host tests
//!
//! All simulated peripherals share state through [`Cell`]s owned by a
//! [`SimHardware`], so a test can hand the peripherals to a
//! [`Driver`](crate::driver::Driver) and keep observing pin levels and
//! timer registers from outside. The pin bank models a single 32-bit GPIO
//! bank with per-pin direction, pulls, edge selection and pending flags.

use core::cell::Cell;
use core::marker::PhantomData;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use steppulse_hal::{
    InputPort, OutputPort, PortAccess, Prescaler, PulseTimer, PwmTimer, RateTimer, TickTimer,
};

use crate::driver::{Board, BoardPulse, Peripherals};

/// Number of port writes kept for inspection
pub const WRITE_LOG: usize = 64;

/// Shared GPIO bank
pub struct SimPins {
    output: Cell<u32>,
    input: Cell<u32>,
    output_enable: Cell<u32>,
    inputs: Cell<u32>,
    pull_up: Cell<u32>,
    rising: Cell<u32>,
    irq_enabled: Cell<u32>,
    pending: Cell<u32>,
    log: [Cell<(u32, u32)>; WRITE_LOG],
    writes: Cell<usize>,
}

impl Default for SimPins {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPins {
    pub const fn new() -> Self {
        Self {
            output: Cell::new(0),
            input: Cell::new(0),
            output_enable: Cell::new(0),
            inputs: Cell::new(0),
            pull_up: Cell::new(0),
            rising: Cell::new(0),
            irq_enabled: Cell::new(0),
            pending: Cell::new(0),
            log: [const { Cell::new((0, 0)) }; WRITE_LOG],
            writes: Cell::new(0),
        }
    }

    /// Driven output latch
    pub fn outputs(&self) -> u32 {
        self.output.get()
    }

    /// Check that every pin in `mask` is driven high
    pub fn output_high(&self, mask: u32) -> bool {
        self.output.get() & mask == mask
    }

    /// Pins configured as outputs
    pub fn output_enables(&self) -> u32 {
        self.output_enable.get()
    }

    /// Input pins with a pull-up (the others have a pull-down)
    pub fn pull_ups(&self) -> u32 {
        self.pull_up.get() & self.inputs.get()
    }

    /// Input pins that flag rising edges (the others flag falling edges)
    pub fn rising_edges(&self) -> u32 {
        self.rising.get() & self.inputs.get()
    }

    /// Pins with the edge interrupt enabled
    pub fn interrupts_enabled(&self) -> u32 {
        self.irq_enabled.get()
    }

    /// Pending edge flags
    pub fn pending(&self) -> u32 {
        self.pending.get()
    }

    /// Check if an enabled edge interrupt in `mask` is waiting
    pub fn interrupt_pending(&self, mask: u32) -> bool {
        self.pending.get() & self.irq_enabled.get() & mask != 0
    }

    /// Total number of port writes so far
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// The `index`th port write as `(mask, value)`
    pub fn write_at(&self, index: usize) -> Option<(u32, u32)> {
        (index < self.writes.get().min(WRITE_LOG)).then(|| self.log[index].get())
    }

    /// Drive external input levels, flagging edges that match the pin's
    /// configured polarity
    pub fn set_inputs(&self, mask: u32, high: bool) {
        let old = self.input.get();
        let new = if high { old | mask } else { old & !mask };
        let changed = old ^ new;
        let rising = self.rising.get();
        let edges = (changed & new & rising) | (changed & !new & !rising);

        self.input.set(new);
        self.pending
            .set(self.pending.get() | (edges & self.inputs.get()));
    }

    fn write(&self, mask: u32, value: u32) {
        self.output
            .set((self.output.get() & !mask) | (value & mask));

        let index = self.writes.get();
        if index < WRITE_LOG {
            self.log[index].set((mask, value));
        }
        self.writes.set(index + 1);
    }
}

/// View of the shared bank through one port
pub struct SimPort<'a> {
    pins: &'a SimPins,
}

impl<'a> SimPort<'a> {
    pub fn new(pins: &'a SimPins) -> Self {
        Self { pins }
    }
}

impl PortAccess for SimPort<'_> {
    fn read_bits(&self) -> u32 {
        let oe = self.pins.output_enable.get();
        (self.pins.output.get() & oe) | (self.pins.input.get() & !oe)
    }

    fn write_bits(&mut self, mask: u32, value: u32) {
        self.pins.write(mask, value);
    }
}

impl OutputPort for SimPort<'_> {
    fn configure_outputs(&mut self, mask: u32) {
        let pins = self.pins;
        pins.output_enable.set(pins.output_enable.get() | mask);
        pins.inputs.set(pins.inputs.get() & !mask);
    }
}

impl InputPort for SimPort<'_> {
    fn configure_inputs(&mut self, mask: u32, pull_up: u32, rising: u32) {
        let pins = self.pins;
        pins.output_enable.set(pins.output_enable.get() & !mask);
        pins.inputs.set(pins.inputs.get() | mask);
        pins.pull_up
            .set((pins.pull_up.get() & !mask) | (pull_up & mask));
        pins.rising.set((pins.rising.get() & !mask) | (rising & mask));
    }

    fn enable_interrupts(&mut self, mask: u32, enable: bool) {
        let pins = self.pins;
        if enable {
            pins.irq_enabled.set(pins.irq_enabled.get() | mask);
        } else {
            pins.irq_enabled.set(pins.irq_enabled.get() & !mask);
        }
    }

    fn take_pending(&mut self, mask: u32) -> u32 {
        let pins = self.pins;
        let taken = pins.pending.get() & mask;
        pins.pending.set(pins.pending.get() & !taken);
        taken
    }
}

/// Register state of a simulated timer
pub struct SimTimerState {
    running: Cell<bool>,
    prescaler: Cell<Prescaler>,
    period: Cell<u16>,
    timeout: Cell<u16>,
    delay: Cell<Option<u16>>,
    extended: Cell<Option<u16>>,
    interval_ms: Cell<u16>,
    starts: Cell<u32>,
}

impl Default for SimTimerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTimerState {
    pub const fn new() -> Self {
        Self {
            running: Cell::new(false),
            prescaler: Cell::new(Prescaler::Div1),
            period: Cell::new(0),
            timeout: Cell::new(0),
            delay: Cell::new(None),
            extended: Cell::new(None),
            interval_ms: Cell::new(0),
            starts: Cell::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn prescaler(&self) -> Prescaler {
        self.prescaler.get()
    }

    /// Rate timer period
    pub fn period(&self) -> u16 {
        self.period.get()
    }

    /// Pulse timer compare channel 0
    pub fn timeout(&self) -> u16 {
        self.timeout.get()
    }

    /// Pulse timer compare channel 1
    pub fn delay(&self) -> Option<u16> {
        self.delay.get()
    }

    /// Last timeout extension requested from the delay compare
    pub fn extended(&self) -> Option<u16> {
        self.extended.get()
    }

    /// Tick timer interval
    pub fn interval_ms(&self) -> u16 {
        self.interval_ms.get()
    }

    /// Number of times the timer was started
    pub fn starts(&self) -> u32 {
        self.starts.get()
    }

    fn start(&self) {
        self.running.set(true);
        self.starts.set(self.starts.get() + 1);
    }
}

/// Simulated rate, pulse or tick timer
pub struct SimTimer<'a> {
    state: &'a SimTimerState,
}

impl<'a> SimTimer<'a> {
    pub fn new(state: &'a SimTimerState) -> Self {
        Self { state }
    }
}

impl RateTimer for SimTimer<'_> {
    fn set_prescaler(&mut self, prescaler: Prescaler) {
        self.state.prescaler.set(prescaler);
    }

    fn set_period(&mut self, ticks: u16) {
        self.state.period.set(ticks);
    }

    fn start(&mut self) {
        self.state.start();
    }

    fn stop(&mut self) {
        self.state.running.set(false);
    }

    fn is_running(&self) -> bool {
        self.state.running.get()
    }
}

impl PulseTimer for SimTimer<'_> {
    fn set_timeout(&mut self, ticks: u16) {
        self.state.timeout.set(ticks);
    }

    fn set_delay(&mut self, ticks: Option<u16>) {
        self.state.delay.set(ticks);
    }

    fn extend_timeout(&mut self, ticks: u16) {
        self.state.extended.set(Some(ticks));
    }

    fn start(&mut self) {
        self.state.extended.set(None);
        self.state.start();
    }

    fn stop(&mut self) {
        self.state.running.set(false);
    }
}

impl TickTimer for SimTimer<'_> {
    fn start(&mut self, period_ms: u16) {
        self.state.interval_ms.set(period_ms);
        self.state.start();
    }

    fn stop(&mut self) {
        self.state.running.set(false);
    }
}

/// Register state of a simulated PWM output
pub struct SimPwmState {
    period: Cell<u16>,
    compare: Cell<u16>,
    output: Cell<bool>,
    running: Cell<bool>,
    disconnects: Cell<u32>,
}

impl Default for SimPwmState {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPwmState {
    pub const fn new() -> Self {
        Self {
            period: Cell::new(0),
            compare: Cell::new(0),
            output: Cell::new(false),
            running: Cell::new(false),
            disconnects: Cell::new(0),
        }
    }

    pub fn period(&self) -> u16 {
        self.period.get()
    }

    pub fn compare(&self) -> u16 {
        self.compare.get()
    }

    /// Compare output connected to the pin
    pub fn output(&self) -> bool {
        self.output.get()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of times the output was disconnected
    pub fn disconnects(&self) -> u32 {
        self.disconnects.get()
    }
}

/// Simulated PWM output
pub struct SimPwm<'a> {
    state: &'a SimPwmState,
}

impl<'a> SimPwm<'a> {
    pub fn new(state: &'a SimPwmState) -> Self {
        Self { state }
    }
}

impl PwmTimer for SimPwm<'_> {
    fn set_period(&mut self, ticks: u16) {
        self.state.period.set(ticks);
    }

    fn set_compare(&mut self, ticks: u16) {
        self.state.compare.set(ticks);
    }

    fn set_output(&mut self, enabled: bool) {
        if !enabled {
            self.state.disconnects.set(self.state.disconnects.get() + 1);
        }
        self.state.output.set(enabled);
    }

    fn start(&mut self) {
        self.state.running.set(true);
    }
}

/// Board type tying the simulated peripherals together
pub struct SimBoard<'a> {
    _hw: PhantomData<&'a SimHardware>,
}

impl<'a> Board for SimBoard<'a> {
    type Output = SimPort<'a>;
    type Input = SimPort<'a>;
    type Rate = SimTimer<'a>;
    type Pulse = SimTimer<'a>;
    type Pwm = SimPwm<'a>;
    type Tick = SimTimer<'a>;
    type PulseMutex = NoopRawMutex;
}

/// Step pulse channel handed to a simulated driver
pub type SimPulse<'a> = BoardPulse<SimBoard<'a>>;

/// All simulated peripheral state of one board
#[derive(Default)]
pub struct SimHardware {
    pub pins: SimPins,
    pub rate: SimTimerState,
    pub pulse: SimTimerState,
    pub pwm: SimPwmState,
    pub debounce: SimTimerState,
    pub delay: SimTimerState,
}

impl SimHardware {
    pub const fn new() -> Self {
        Self {
            pins: SimPins::new(),
            rate: SimTimerState::new(),
            pulse: SimTimerState::new(),
            pwm: SimPwmState::new(),
            debounce: SimTimerState::new(),
            delay: SimTimerState::new(),
        }
    }

    /// Peripheral handles for a driver
    pub fn peripherals(&self) -> Peripherals<SimBoard<'_>> {
        Peripherals {
            step: SimPort::new(&self.pins),
            dir: SimPort::new(&self.pins),
            stepper_enable: SimPort::new(&self.pins),
            spindle: SimPort::new(&self.pins),
            coolant: SimPort::new(&self.pins),
            limits: SimPort::new(&self.pins),
            control: SimPort::new(&self.pins),
            probe: SimPort::new(&self.pins),
            rate_timer: SimTimer::new(&self.rate),
            pulse_timer: SimTimer::new(&self.pulse),
            spindle_pwm: SimPwm::new(&self.pwm),
            debounce_timer: SimTimer::new(&self.debounce),
            delay_timer: SimTimer::new(&self.delay),
        }
    }
}
