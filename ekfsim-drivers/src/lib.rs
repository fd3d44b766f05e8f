//! Drivers that script traffic to the simulated vehicle

pub mod replay;
pub mod sensors;

pub use replay::{ReplayPacer, TimedReplay};
pub use sensors::{SensorConfig, SensorSynthesizer, SourceEdge, SourceSwitch};
