//! Sensor synthesizer that fakes a position-delta sensor and a GPS
//!
//! Drives the vehicle around the circle of [`ekfsim_core::motion`]. A fast
//! loop feeds position deltas while the secondary sensor is "on" (second half
//! of each revolution); a slow loop sends a heartbeat and a noisy GPS fix.
//! Optionally commands the EKF to switch source sets whenever the secondary
//! sensor turns on or off.

use ekfsim_core::messages::{self, SOURCE_SET_SECONDARY_OFF, SOURCE_SET_SECONDARY_ON};
use ekfsim_core::motion::{self, GpsSynth, Pose, DEFAULT_GPS_NOISE, ORIGIN};
use ekfsim_core::state::Readiness;
use ekfsim_core::{validate_speed_multiplier, Driver, SessionError, Tick, VehicleIo};
use std::time::Duration;
use tracing::info;

pub const FAST_LOOP_PERIOD: f64 = 0.2;
pub const SLOW_LOOP_COUNT: u64 = 5;

#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Simulated seconds to run for
    pub duration_s: f64,
    /// Send EKF source-set commands when the secondary sensor toggles
    pub switch_sources: bool,
    /// Simulated seconds between fast loop ticks
    pub fast_loop_period: f64,
    /// Fast ticks per slow tick
    pub slow_loop_count: u64,
    /// GPS noise standard deviation, meters
    pub gps_noise_m: f64,
    /// RNG seed for reproducible noise. None = random.
    pub seed: Option<u64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            duration_s: 60.0,
            switch_sources: false,
            fast_loop_period: FAST_LOOP_PERIOD,
            slow_loop_count: SLOW_LOOP_COUNT,
            gps_noise_m: DEFAULT_GPS_NOISE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEdge {
    On,
    Off,
}

impl SourceEdge {
    pub fn source_set(self) -> u8 {
        match self {
            SourceEdge::On => SOURCE_SET_SECONDARY_ON,
            SourceEdge::Off => SOURCE_SET_SECONDARY_OFF,
        }
    }
}

/// Tracks whether the secondary sensor is active.
///
/// Active exactly while the angle is past π, so there is one edge per
/// half-revolution however coarse the ticks are.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceSwitch {
    active: bool,
}

impl SourceSwitch {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn update(&mut self, pose: &Pose) -> Option<SourceEdge> {
        let should_be_active = pose.past_half_revolution();
        if should_be_active == self.active {
            return None;
        }
        self.active = should_be_active;
        Some(if should_be_active {
            SourceEdge::On
        } else {
            SourceEdge::Off
        })
    }
}

pub struct SensorSynthesizer {
    config: SensorConfig,
    pose: Pose,
    gps: GpsSynth,
    switch: SourceSwitch,
    tick_count: u64,
    started: bool,
}

impl SensorSynthesizer {
    pub fn new(config: SensorConfig) -> Self {
        let gps = GpsSynth::new(ORIGIN, config.gps_noise_m, config.seed);
        Self {
            config,
            pose: Pose::start(),
            gps,
            switch: SourceSwitch::default(),
            tick_count: 0,
            started: false,
        }
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn secondary_active(&self) -> bool {
        self.switch.is_active()
    }

    fn slow_loop(&mut self, io: &mut dyn VehicleIo) -> Result<(), SessionError> {
        io.send(&messages::heartbeat())?;
        let fix = self.gps.fix(&self.pose);
        io.send(&messages::gps_input(fix.lat, fix.lon))
    }

    fn fast_loop(&mut self, io: &mut dyn VehicleIo) -> Result<(), SessionError> {
        io.drain_inbound()?;

        if io.readiness() == Readiness::Ready {
            io.send(&messages::arm())?;
            io.mark_armed();
            info!("[{:.2}] vehicle ready, arming", io.simulated_time());
        }

        self.pose = motion::advance(&self.pose, self.config.fast_loop_period);

        if let Some(edge) = self.switch.update(&self.pose) {
            let t = io.simulated_time();
            match edge {
                SourceEdge::On => info!("[{:.2}] secondary sensor on", t),
                SourceEdge::Off => info!("[{:.2}] secondary sensor off", t),
            }
            if self.config.switch_sources {
                info!("[{:.2}] switching EKF to SRC{}", t, edge.source_set());
                io.send(&messages::set_ekf_source_set(edge.source_set()))?;
            }
        }

        if self.switch.is_active() {
            let time_delta_usec = (self.config.fast_loop_period * 1.0e6) as u64;
            io.send(&messages::vision_position_delta(
                time_delta_usec,
                self.pose.angle_delta_f32(),
                self.pose.position_delta_f32(),
            ))?;
        }

        Ok(())
    }
}

impl Driver for SensorSynthesizer {
    fn name(&self) -> &str {
        "sensors"
    }

    fn tick(&mut self, io: &mut dyn VehicleIo) -> Result<Tick, SessionError> {
        let speed_multiplier = validate_speed_multiplier(io.speed_multiplier())?;
        if !self.started {
            self.started = true;
            info!(
                "[{:.2}] simulation started, running for {}s",
                io.simulated_time(),
                self.config.duration_s
            );
        }

        if io.simulated_time() >= self.config.duration_s {
            info!("[{:.2}] simulation stopped", io.simulated_time());
            return Ok(Tick::Done);
        }

        if self.tick_count % self.config.slow_loop_count.max(1) == 0 {
            self.slow_loop(io)?;
        }
        self.fast_loop(io)?;
        self.tick_count += 1;

        let wall = self.config.fast_loop_period / speed_multiplier;
        Ok(Tick::Sleep(Duration::from_secs_f64(wall)))
    }
}
