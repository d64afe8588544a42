//! Input edge polling
//!
//! The IO bank latches every edge, so polling once per millisecond loses
//! nothing; it only bounds the reporting latency.

use defmt::*;
use embassy_time::{Duration, Ticker};

use crate::irq::with_driver;

/// Scan period in milliseconds
pub const SCAN_INTERVAL_MS: u64 = 1;

#[embassy_executor::task]
pub async fn input_scan_task() {
    info!("Input scan task started");

    let mut ticker = Ticker::every(Duration::from_millis(SCAN_INTERVAL_MS));

    loop {
        ticker.next().await;

        with_driver(|driver, planner| {
            driver.on_limit_edge(planner);
            driver.on_control_edge(planner);
        });
    }
}
