//! Deterministic motion model
//!
//! The vehicle drives a fixed-radius circle at constant speed in a local NED
//! frame, starting at `(RADIUS, 0)` facing east and moving toward increasing
//! angle. Every pose is computed from elapsed time alone; the per-tick deltas
//! are first differences against the previous pose.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

pub const RADIUS: f64 = 10.0;
/// Tangential speed, m/s
pub const SPEED: f64 = 0.5;
/// Seconds per revolution
pub const PERIOD: f64 = TAU * RADIUS / SPEED;
/// rad/s
pub const ANGULAR_RATE: f64 = SPEED / RADIUS;

pub const EARTH_RADIUS: f64 = 6_371_000.0;
pub const DEFAULT_GPS_NOISE: f64 = 1.0;

/// Geodetic reference the local frame is anchored to
pub const ORIGIN: LatLon = LatLon {
    lat: 47.607886,
    lon: -122.344324,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Latitude/longitude in integer units of 1e-7 degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatLonE7 {
    pub lat: i32,
    pub lon: i32,
}

/// Quantize degrees to 1e-7 units, flooring toward negative infinity.
///
/// Negative coordinates therefore move away from zero. Consumers of our logs
/// depend on this exact truncation, do not switch to rounding.
pub fn quantize_e7(degrees: f64) -> i32 {
    (degrees * 1e7).floor() as i32
}

impl LatLon {
    pub fn to_e7(self) -> LatLonE7 {
        LatLonE7 {
            lat: quantize_e7(self.lat),
            lon: quantize_e7(self.lon),
        }
    }

    /// Offset this point by `north`/`east` meters using a flat-Earth
    /// small-angle approximation.
    pub fn offset(self, north: f64, east: f64) -> LatLon {
        let dlat = north.to_degrees() / EARTH_RADIUS;
        let dlon = east.to_degrees() / (EARTH_RADIUS * self.lat.to_radians().cos());
        LatLon {
            lat: self.lat + dlat,
            lon: self.lon + dlon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Elapsed time modulo [`PERIOD`]
    pub elapsed_time: f64,
    /// Angle around the circle, [0, 2π)
    pub angle: f64,
    /// North, meters
    pub x: f64,
    /// East, meters
    pub y: f64,
    /// Heading, [0, 2π)
    pub yaw: f64,
    pub angle_delta: [f64; 3],
    pub position_delta: [f64; 3],
}

impl Pose {
    /// Pose at elapsed time zero, with zero deltas.
    pub fn start() -> Self {
        Self::at(0.0)
    }

    fn at(elapsed_time: f64) -> Self {
        let angle = (ANGULAR_RATE * elapsed_time).rem_euclid(TAU);
        Pose {
            elapsed_time,
            angle,
            x: angle.cos() * RADIUS,
            y: angle.sin() * RADIUS,
            // Facing the direction of motion
            yaw: (angle + FRAC_PI_2).rem_euclid(TAU),
            angle_delta: [0.0; 3],
            position_delta: [0.0; 3],
        }
    }

    /// Whether the vehicle is on the second half of the circle
    pub fn past_half_revolution(&self) -> bool {
        self.angle > PI
    }

    pub fn angle_delta_f32(&self) -> [f32; 3] {
        self.angle_delta.map(|v| v as f32)
    }

    pub fn position_delta_f32(&self) -> [f32; 3] {
        self.position_delta.map(|v| v as f32)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::start()
    }
}

/// Advance `previous` by `dt` seconds.
pub fn advance(previous: &Pose, dt: f64) -> Pose {
    let elapsed = (previous.elapsed_time + dt).rem_euclid(PERIOD);
    let next = Pose::at(elapsed);

    Pose {
        angle_delta: [0.0, 0.0, next.yaw - previous.yaw],
        position_delta: [next.x - previous.x, next.y - previous.y, 0.0],
        ..next
    }
}

/// Produces noisy geodetic fixes for a pose.
pub struct GpsSynth {
    origin: LatLon,
    noise: Option<Normal<f64>>,
    rng: StdRng,
}

impl GpsSynth {
    /// `noise_m` is the standard deviation of the per-axis position noise.
    /// A seed makes the noise sequence reproducible.
    pub fn new(origin: LatLon, noise_m: f64, seed: Option<u64>) -> Self {
        let noise = (noise_m > 0.0)
            .then(|| Normal::new(0.0, noise_m).ok())
            .flatten();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { origin, noise, rng }
    }

    fn sample(&mut self) -> f64 {
        match &self.noise {
            Some(normal) => normal.sample(&mut self.rng),
            None => 0.0,
        }
    }

    pub fn fix(&mut self, pose: &Pose) -> LatLonE7 {
        let north = pose.x + self.sample();
        let east = pose.y + self.sample();
        self.origin.offset(north, east).to_e7()
    }
}
