//! In-memory vehicle for driving drivers without a link

#![allow(dead_code)]

use ekfsim_core::mavlink::ardupilotmega::{MavCmd, MavMessage};
use ekfsim_core::{Clock, Driver, ManualClock, Readiness, SessionError, Tick, VehicleIo};
use std::time::Duration;

pub struct FakeVehicle {
    pub clock: ManualClock,
    pub speed: f64,
    pub readiness: Readiness,
    /// Wall time at which the vehicle announces it is ready
    pub ready_at: Option<Duration>,
    pub sent: Vec<(Duration, MavMessage)>,
    pub drains: usize,
}

impl FakeVehicle {
    pub fn new(speed: f64) -> Self {
        Self {
            clock: ManualClock::new(),
            speed,
            readiness: Readiness::NotReady,
            ready_at: None,
            sent: Vec::new(),
            drains: 0,
        }
    }

    pub fn ready_at(mut self, at: Duration) -> Self {
        self.ready_at = Some(at);
        self
    }

    pub fn commands(&self, command: MavCmd) -> Vec<(Duration, f32)> {
        self.sent
            .iter()
            .filter_map(|(at, message)| match message {
                MavMessage::COMMAND_LONG(data) if data.command == command => {
                    Some((*at, data.param1))
                }
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&MavMessage) -> bool) -> usize {
        self.sent.iter().filter(|(_, message)| pred(message)).count()
    }
}

impl VehicleIo for FakeVehicle {
    fn send(&mut self, message: &MavMessage) -> Result<(), SessionError> {
        self.sent.push((self.clock.elapsed(), message.clone()));
        Ok(())
    }

    fn drain_inbound(&mut self) -> Result<usize, SessionError> {
        self.drains += 1;
        match self.ready_at {
            Some(at) if self.clock.elapsed() >= at => {
                self.readiness = self.readiness.on_ready();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn wall_time(&self) -> Duration {
        self.clock.elapsed()
    }

    fn speed_multiplier(&self) -> f64 {
        self.speed
    }

    fn readiness(&self) -> Readiness {
        self.readiness
    }

    fn mark_armed(&mut self) -> bool {
        match self.readiness.on_armed() {
            Some(next) => {
                self.readiness = next;
                true
            }
            None => false,
        }
    }

    fn sleep(&mut self, duration: Duration) {
        self.clock.sleep(duration);
    }
}

/// Step `driver` until it reports done. Returns the number of ticks.
pub fn run_to_completion(driver: &mut dyn Driver, io: &mut FakeVehicle) -> usize {
    let mut ticks = 0;
    loop {
        ticks += 1;
        assert!(ticks < 1_000_000, "driver never finished");
        match driver.tick(io).expect("tick should succeed") {
            Tick::Continue => {}
            Tick::Sleep(duration) => io.sleep(duration),
            Tick::Done => return ticks,
        }
    }
}
