//! Generic run loop
//!
//! Steps a driver until it is done. All suspension goes through the session
//! clock, so the same loop runs against real time and test clocks.

use ekfsim_core::{Driver, SessionError, Tick, VehicleIo};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    /// Total wall time the driver asked to sleep
    pub slept: Duration,
}

pub fn run(driver: &mut dyn Driver, io: &mut dyn VehicleIo) -> Result<RunStats, SessionError> {
    let mut stats = RunStats::default();
    info!("[{:.2}] running {}", io.simulated_time(), driver.name());

    loop {
        stats.ticks += 1;
        match driver.tick(io)? {
            Tick::Continue => {}
            Tick::Sleep(duration) => {
                stats.slept += duration;
                io.sleep(duration);
            }
            Tick::Done => break,
        }
    }

    info!(
        "[{:.2}] {} finished after {} ticks",
        io.simulated_time(),
        driver.name(),
        stats.ticks
    );
    Ok(stats)
}
