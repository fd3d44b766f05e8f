//! One-way session state
//!
//! Readiness and origin are learned from the vehicle and never revert.
//! Arming is only reachable from `Ready`, so "armed before ready" cannot be
//! represented.

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    NotReady,
    Ready,
    Armed,
}

impl Readiness {
    /// The vehicle announced it is ready.
    pub fn on_ready(self) -> Self {
        match self {
            Readiness::NotReady => Readiness::Ready,
            other => other,
        }
    }

    /// Record that an arm command was sent. Returns None unless currently
    /// `Ready`.
    pub fn on_armed(self) -> Option<Self> {
        match self {
            Readiness::Ready => Some(Readiness::Armed),
            _ => None,
        }
    }

    pub fn is_ready(self) -> bool {
        !matches!(self, Readiness::NotReady)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    Unknown,
    Established,
}

impl Origin {
    pub fn is_established(self) -> bool {
        self == Origin::Established
    }
}

/// Wall-time pacing divides by the multiplier, so only finite positive
/// values are usable.
pub fn validate_speed_multiplier(speed_multiplier: f64) -> Result<f64, SessionError> {
    if speed_multiplier.is_finite() && speed_multiplier > 0.0 {
        Ok(speed_multiplier)
    } else {
        Err(SessionError::InvalidSpeedMultiplier(speed_multiplier))
    }
}

/// Everything the session learns about the vehicle while running
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionState {
    pub speed_multiplier: f64,
    pub readiness: Readiness,
    pub origin: Origin,
}

impl SessionState {
    pub fn new(speed_multiplier: f64) -> Self {
        Self {
            speed_multiplier,
            ..Default::default()
        }
    }
}
