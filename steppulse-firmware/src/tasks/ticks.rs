//! Debounce and delay tick forwarding

use defmt::*;

use crate::board::{DEBOUNCE_SLOT, DELAY_SLOT};
use crate::irq::{with_driver, SHARED};

/// Forward debounce ticks to the limit inputs
#[embassy_executor::task]
pub async fn debounce_task() {
    info!("Debounce task started");

    loop {
        DEBOUNCE_SLOT.wait_tick().await;
        with_driver(|driver, planner| driver.on_debounce_tick(planner));
    }
}

/// Forward delay ticks to the delay service
#[embassy_executor::task]
pub async fn delay_task() {
    info!("Delay task started");

    loop {
        DELAY_SLOT.wait_tick().await;
        if with_driver(|driver, _| driver.on_delay_tick()).is_none() {
            SHARED.expire_delay();
        }
    }
}
