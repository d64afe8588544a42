//! Demonstration motion source
//!
//! Runs a back-and-forth X jog at constant rate with the spindle on, so a
//! bare board exercises the whole pulse path. A real controller replaces
//! this with its planner filling the segment queue.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker, Timer};

use steppulse_core::stepper::StepperState;
use steppulse_core::{AxisSignals, CoolantState, SpindleState, StepSegment, StepperHal};
use steppulse_hal_rp2040::rate::STEP_TIMER_HZ;

use crate::channels::MOTION_DONE;
use crate::irq::{with_driver, with_planner};

/// Jog rate in steps per second
const STEP_RATE: u32 = 2_000;

/// Steps per jog leg
const LEG_STEPS: u32 = 3_200;

/// Legs per demo cycle
const LEGS: u32 = 4;

/// Spindle speed during the demo
const SPINDLE_RPM: f32 = 12_000.0;

/// Spin-up dwell before motion
const SPINDLE_DWELL_MS: u16 = 1_000;

static SPINDLE_AT_SPEED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

fn spindle_at_speed() {
    SPINDLE_AT_SPEED.signal(());
}

/// Constant-rate back-and-forth segment source
struct Jog {
    template: StepSegment,
    remaining: u32,
    legs: u32,
}

impl Jog {
    fn new(spindle_pwm: u16) -> Self {
        Self {
            template: StepSegment {
                dir: AxisSignals::empty(),
                step: AxisSignals::X,
                spindle_pwm,
                cycles_per_tick: STEP_TIMER_HZ / STEP_RATE,
            },
            remaining: LEG_STEPS,
            legs: 0,
        }
    }
}

impl Iterator for Jog {
    type Item = StepSegment;

    fn next(&mut self) -> Option<StepSegment> {
        if self.legs == LEGS {
            return None;
        }

        let segment = self.template;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.remaining = LEG_STEPS;
            self.legs += 1;
            self.template.dir ^= AxisSignals::X;
        }
        Some(segment)
    }
}

#[embassy_executor::task]
pub async fn motion_task() {
    info!("Motion task started");

    let mut ticker = Ticker::every(Duration::from_millis(5));

    loop {
        // Spin up and wait for the dwell before moving
        let duty = with_driver(|driver, planner| {
            driver.coolant_set_state(CoolantState::FLOOD);
            let duty = driver.spindle_set_state(SpindleState::CW, SPINDLE_RPM, 100);
            driver.delay_ms(SPINDLE_DWELL_MS, Some(spindle_at_speed), planner);
            duty
        });
        let Some(duty) = duty else {
            Timer::after_millis(100).await;
            continue;
        };
        let spindle_pwm = duty.map(|duty| duty.value).unwrap_or(0);
        SPINDLE_AT_SPEED.wait().await;
        info!("Spindle at speed, duty {}", spindle_pwm);

        let mut jog = Jog::new(spindle_pwm).peekable();
        MOTION_DONE.reset();

        while jog.peek().is_some() {
            ticker.next().await;

            if with_planner(|planner| planner.is_held()) {
                continue;
            }

            with_planner(|planner| {
                while planner.space() > 0 {
                    let Some(segment) = jog.next() else { break };
                    if planner.push(segment).is_err() {
                        break;
                    }
                }
            });

            with_driver(|driver, planner| {
                if driver.stepper_state() == StepperState::Idle && !planner.is_empty() {
                    driver.stepper_wake_up(planner);
                }
            });
        }

        // An underrun mid-cycle also signals; wait for the real end
        loop {
            MOTION_DONE.wait().await;
            let drained = with_driver(|driver, planner| {
                driver.stepper_state() == StepperState::Idle && planner.is_empty()
            });
            if drained != Some(false) {
                break;
            }
        }
        info!("Demo cycle complete, {} overruns", with_driver(|driver, _| driver.tick_overruns()));

        with_driver(|driver, _| {
            driver.spindle_set_state(SpindleState::empty(), 0.0, 100);
            driver.coolant_set_state(CoolantState::empty());
        });
        Timer::after_secs(2).await;
    }
}
