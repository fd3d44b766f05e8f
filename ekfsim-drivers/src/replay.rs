//! Timed replay of recorded sensor traffic
//!
//! Re-sends previously captured messages to the live vehicle, spacing them
//! the way they were captured (scaled by the speed multiplier). Pacing is
//! anchored on the first message, so processing jitter never accumulates.

use chrono::DateTime;
use ekfsim_core::codec;
use ekfsim_core::mavlink::ardupilotmega::MavMessage;
use ekfsim_core::tlog::{RecordedItem, TlogReader};
use ekfsim_core::{validate_speed_multiplier, Driver, SessionError, Tick, VehicleIo};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Message types worth replaying: the sensor inputs the EKF consumes
pub const REPLAY_MESSAGE_TYPES: [&str; 2] = ["VISION_POSITION_DELTA", "GPS_INPUT"];

/// Forwarded messages between progress reports
pub const PROGRESS_INTERVAL: u64 = 1000;

pub fn is_replayable(message: &MavMessage) -> bool {
    REPLAY_MESSAGE_TYPES.contains(&codec::message_name(message))
}

/// Allow-listed items of a recorded log, in file order
pub fn recorded_items(path: &Path) -> std::io::Result<impl Iterator<Item = RecordedItem>> {
    Ok(TlogReader::open(path)?.filter(|item| is_replayable(&item.message)))
}

/// Computes how long to wait before forwarding each item
#[derive(Debug, Clone)]
pub struct ReplayPacer {
    speed_multiplier: f64,
    anchor: Option<(Duration, f64)>,
}

impl ReplayPacer {
    pub fn new(speed_multiplier: f64) -> Result<Self, SessionError> {
        Ok(Self {
            speed_multiplier: validate_speed_multiplier(speed_multiplier)?,
            anchor: None,
        })
    }

    /// Capture time of the first item, once anchored
    pub fn anchor_capture(&self) -> Option<f64> {
        self.anchor.map(|(_, capture)| capture)
    }

    /// Wall time to wait before forwarding an item captured at
    /// `capture_timestamp`, given the current wall time `now`.
    ///
    /// The first call anchors and returns zero. Falling behind is absorbed,
    /// never a negative wait.
    pub fn wait_for(&mut self, now: Duration, capture_timestamp: f64) -> Duration {
        let Some((anchor_now, anchor_capture)) = self.anchor else {
            self.anchor = Some((now, capture_timestamp));
            return Duration::ZERO;
        };

        let target = (capture_timestamp - anchor_capture) / self.speed_multiplier;
        let wait = target - now.saturating_sub(anchor_now).as_secs_f64();
        if wait > 0.0 {
            Duration::from_secs_f64(wait)
        } else {
            Duration::ZERO
        }
    }
}

pub struct TimedReplay<I> {
    items: I,
    pacer: ReplayPacer,
    pending: Option<RecordedItem>,
    seen_types: HashSet<&'static str>,
    forwarded: u64,
    started: bool,
}

impl<I> TimedReplay<I>
where
    I: Iterator<Item = RecordedItem>,
{
    pub fn new(items: I, speed_multiplier: f64) -> Result<Self, SessionError> {
        Ok(Self {
            items,
            pacer: ReplayPacer::new(speed_multiplier)?,
            pending: None,
            seen_types: HashSet::new(),
            forwarded: 0,
            started: false,
        })
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    fn forward(&mut self, io: &mut dyn VehicleIo, item: RecordedItem) -> Result<(), SessionError> {
        io.send(&item.message)?;
        self.forwarded += 1;

        let name = codec::message_name(&item.message);
        if self.seen_types.insert(name) {
            info!("[{:.2}] replay first {} message", io.simulated_time(), name);
        }

        if self.forwarded % PROGRESS_INTERVAL == 0 {
            let elapsed_s = item.capture_timestamp - self.pacer.anchor_capture().unwrap_or(0.0);
            info!(
                "[{:.2}] sent {} messages, elapsed sim time {:.2}s ({:.2}m)",
                io.simulated_time(),
                self.forwarded,
                elapsed_s,
                elapsed_s / 60.0
            );
        }

        io.drain_inbound()?;
        Ok(())
    }
}

impl<I> Driver for TimedReplay<I>
where
    I: Iterator<Item = RecordedItem>,
{
    fn name(&self) -> &str {
        "replay"
    }

    fn tick(&mut self, io: &mut dyn VehicleIo) -> Result<Tick, SessionError> {
        if !self.started {
            self.started = true;
            info!("[{:.2}] replay started", io.simulated_time());
        }

        // Woke up from a pacing sleep
        if let Some(item) = self.pending.take() {
            self.forward(io, item)?;
            return Ok(Tick::Continue);
        }

        let Some(item) = self.items.next() else {
            info!(
                "[{:.2}] replay finished after {} messages",
                io.simulated_time(),
                self.forwarded
            );
            return Ok(Tick::Done);
        };

        io.drain_inbound()?;

        let first = self.pacer.anchor_capture().is_none();
        let wait = self.pacer.wait_for(io.wall_time(), item.capture_timestamp);
        if first {
            let captured = DateTime::from_timestamp_micros((item.capture_timestamp * 1.0e6) as i64);
            if let Some(captured) = captured {
                info!("[{:.2}] replaying log captured at {}", io.simulated_time(), captured);
            }
        }

        if wait.is_zero() {
            self.forward(io, item)?;
            Ok(Tick::Continue)
        } else {
            self.pending = Some(item);
            Ok(Tick::Sleep(wait))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_first_item_anchors_without_waiting() {
        let mut pacer = ReplayPacer::new(1.0).unwrap();
        assert_eq!(pacer.wait_for(secs(5.0), 100.0), Duration::ZERO);
        assert_eq!(pacer.anchor_capture(), Some(100.0));
    }

    #[test]
    fn test_wait_is_measured_from_the_anchor() {
        let mut pacer = ReplayPacer::new(1.0).unwrap();
        pacer.wait_for(secs(0.0), 100.0);

        // 0.25s of processing jitter is absorbed, not accumulated
        let wait = pacer.wait_for(secs(0.25), 101.0);
        assert!((wait.as_secs_f64() - 0.75).abs() < 1e-9);

        let wait = pacer.wait_for(secs(1.0), 103.0);
        assert!((wait.as_secs_f64() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_multiplier_scales_waits() {
        let mut pacer = ReplayPacer::new(2.0).unwrap();
        pacer.wait_for(secs(0.0), 100.0);
        let wait = pacer.wait_for(secs(0.0), 103.0);
        assert!((wait.as_secs_f64() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_unusable_speed_multiplier_is_rejected() {
        for bad in [0.0, -2.0, f64::NAN] {
            assert!(matches!(
                ReplayPacer::new(bad),
                Err(SessionError::InvalidSpeedMultiplier(_))
            ));
        }
    }

    #[test]
    fn test_falling_behind_never_waits_negative() {
        let mut pacer = ReplayPacer::new(1.0).unwrap();
        pacer.wait_for(secs(0.0), 100.0);
        assert_eq!(pacer.wait_for(secs(10.0), 101.0), Duration::ZERO);
    }
}
