//! Seams between the session, its link, and the drivers

use crate::error::SessionError;
use crate::state::Readiness;
use mavlink::ardupilotmega::MavMessage;
use std::io;
use std::time::Duration;

/// Byte-level connection to the vehicle
///
/// Implementations only move whole MAVLink frames; encoding and decoding
/// happen in the session.
pub trait VehicleLink {
    /// Transmit one complete frame.
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Next complete inbound frame, if one is available
    ///
    /// Must never block. `Ok(None)` means the inbound queue is empty.
    fn try_recv_frame(&mut self) -> io::Result<Option<Vec<u8>>>;
}

impl<L: VehicleLink + ?Sized> VehicleLink for Box<L> {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).send_frame(frame)
    }

    fn try_recv_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).try_recv_frame()
    }
}

/// What a driver can do with the running session
pub trait VehicleIo {
    /// Send a message, then log it if logging is enabled.
    fn send(&mut self, message: &MavMessage) -> Result<(), SessionError>;

    /// Handle every inbound message currently queued. Returns how many were
    /// processed.
    fn drain_inbound(&mut self) -> Result<usize, SessionError>;

    /// Wall time since session start
    fn wall_time(&self) -> Duration;

    /// Wall time since session start scaled by the speed multiplier, seconds
    fn simulated_time(&self) -> f64 {
        self.wall_time().as_secs_f64() * self.speed_multiplier()
    }

    fn speed_multiplier(&self) -> f64;

    fn readiness(&self) -> Readiness;

    /// Record that an arm command went out. Returns false if the vehicle was
    /// not in the `Ready` state.
    fn mark_armed(&mut self) -> bool;

    /// Suspend for `duration` of wall time.
    fn sleep(&mut self, duration: Duration);
}

/// Outcome of one driver step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Run the next step immediately.
    Continue,
    /// Sleep this long (wall time) before the next step.
    Sleep(Duration),
    /// The driver has finished.
    Done,
}

/// A source of scheduled traffic for the session
///
/// Drivers are stepped by a generic run loop; they never sleep themselves.
pub trait Driver {
    fn name(&self) -> &str;

    fn tick(&mut self, io: &mut dyn VehicleIo) -> Result<Tick, SessionError>;
}
