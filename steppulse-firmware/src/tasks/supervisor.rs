//! Alarm and control input handling
//!
//! Reacts to limit and control reports forwarded from interrupt context.
//! A hard limit or reset stops everything and holds the queue; cycle start
//! releases the hold once no limit is active.

use defmt::*;
use embassy_futures::select::{select, Either};

use steppulse_core::{ControlSignals, CoolantState, SpindleState, StepperHal};

use crate::board::BoardDriver;
use crate::channels::{CONTROL_CHANGED, LIMIT_TRIGGERED};
use crate::irq::with_driver;
use crate::planner::SegmentQueue;

fn stop_all(driver: &mut BoardDriver, planner: &mut SegmentQueue) {
    planner.set_held(true);
    planner.clear();
    driver.stepper_go_idle();
    driver.spindle_set_state(SpindleState::empty(), 0.0, 100);
    driver.coolant_set_state(CoolantState::empty());
}

#[embassy_executor::task]
pub async fn supervisor_task() {
    info!("Supervisor task started");

    loop {
        match select(LIMIT_TRIGGERED.wait(), CONTROL_CHANGED.wait()).await {
            Either::First(limits) => {
                error!("Hard limit: {}", limits);
                with_driver(stop_all);
            }
            Either::Second(control) => {
                debug!("Control: {}", control);

                if control.contains(ControlSignals::RESET) {
                    warn!("Reset");
                    with_driver(stop_all);
                } else if control.contains(ControlSignals::SAFETY_DOOR) {
                    warn!("Safety door open");
                    with_driver(stop_all);
                } else if control.contains(ControlSignals::FEED_HOLD) {
                    info!("Feed hold");
                    with_driver(|_, planner| planner.set_held(true));
                } else if control.contains(ControlSignals::CYCLE_START) {
                    let resumed = with_driver(|driver, planner| {
                        let clear = driver.limits_get_state().is_empty();
                        if clear {
                            planner.set_held(false);
                        }
                        clear
                    });
                    match resumed {
                        Some(true) => info!("Cycle start"),
                        _ => warn!("Cycle start ignored, limit active"),
                    }
                }
            }
        }
    }
}
