//! ekfsim Core Library
//!
//! Motion model, MAVLink framing, telemetry logs, and the traits that let
//! drivers script traffic to a simulated vehicle.

pub mod clock;
pub mod codec;
pub mod error;
pub mod messages;
pub mod motion;
pub mod params;
pub mod state;
pub mod tlog;
pub mod vehicle;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use params::Param;
pub use state::{validate_speed_multiplier, Origin, Readiness, SessionState};
pub use vehicle::{Driver, Tick, VehicleIo, VehicleLink};

pub use mavlink;
