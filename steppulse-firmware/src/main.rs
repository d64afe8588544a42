//! Steppulse - stepper pulse firmware
//!
//! Main firmware binary for RP2040-based 3-axis controller boards. Step
//! timing runs in interrupt handlers; limit scanning, debounce ticks,
//! alarm handling and the demo motion source run as embassy tasks.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use {defmt_rtt as _, panic_probe as _};

use steppulse_core::driver::{check_version, HAL_VERSION};
use steppulse_core::StepperHal;

mod board;
mod channels;
mod irq;
mod planner;
mod tasks;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Steppulse firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    if let Err(e) = check_version(HAL_VERSION) {
        error!("Driver interface mismatch: {}", e);
        return;
    }

    let mut driver = board::driver(p);
    let caps = *driver.capabilities();
    info!(
        "Capabilities: step clock {} Hz, amass {}, pulse delay {}, debounce {}",
        caps.step_timer_hz, caps.amass_level, caps.step_pulse_delay, caps.software_debounce
    );

    if let Err(e) = driver.setup(&board::boot_settings()) {
        error!("Driver setup failed: {}", e);
        return;
    }
    driver.limits_enable(true);
    info!("Driver configured, revision {}", irq::SHARED.config.revision());

    irq::install(driver);
    irq::enable();
    info!("Motion interrupts enabled");

    // Spawn tasks
    spawner.spawn(tasks::input_scan_task()).unwrap();
    spawner.spawn(tasks::debounce_task()).unwrap();
    spawner.spawn(tasks::delay_task()).unwrap();
    spawner.spawn(tasks::supervisor_task()).unwrap();
    spawner.spawn(tasks::motion_task()).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!(
            "Heartbeat: {} rate tick overruns",
            irq::SHARED.tick.overruns()
        );
    }
}
