//! Vehicle session
//!
//! Owns the link, the log sink and the clock. Establishing a session waits for
//! the vehicle's heartbeat, pushes parameters and asks for the telemetry we
//! care about; afterwards drivers talk to the vehicle through [`VehicleIo`].

use ekfsim_core::codec::{self, Encoder};
use ekfsim_core::mavlink::ardupilotmega::{MavCmd, MavMessage, MavSeverity};
use ekfsim_core::mavlink::MavlinkVersion;
use ekfsim_core::messages::{self, INTERESTING_MESSAGE_HZ, INTERESTING_MESSAGE_IDS};
use ekfsim_core::tlog::TlogWriter;
use ekfsim_core::{
    validate_speed_multiplier, Clock, Origin, Param, Readiness, SessionError, SessionState,
    VehicleIo, VehicleLink,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the startup wait polls the link
pub const HEARTBEAT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Parameters that change constantly and would drown everything else
pub const NOISY_PARAMS: [&str; 4] = [
    "BARO1_GND_PRESS",
    "BARO2_GND_PRESS",
    "STAT_RUNTIME",
    "STAT_FLTTIME",
];

pub const READY_TEXT: &str = "ArduPilot Ready";
pub const SUPPRESSED_TEXT: &str = "Field Elevation Set: 0m";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub speed_multiplier: f64,
    pub params: Vec<Param>,
    /// None waits for the heartbeat forever.
    pub heartbeat_timeout: Option<Duration>,
    pub protocol: MavlinkVersion,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            params: Vec::new(),
            heartbeat_timeout: None,
            protocol: MavlinkVersion::V2,
        }
    }
}

pub fn severity_name(severity: MavSeverity) -> &'static str {
    match severity {
        MavSeverity::MAV_SEVERITY_EMERGENCY => "EMERGENCY",
        MavSeverity::MAV_SEVERITY_ALERT => "ALERT",
        MavSeverity::MAV_SEVERITY_CRITICAL => "CRITICAL",
        MavSeverity::MAV_SEVERITY_ERROR => "ERROR",
        MavSeverity::MAV_SEVERITY_WARNING => "WARNING",
        MavSeverity::MAV_SEVERITY_NOTICE => "NOTICE",
        MavSeverity::MAV_SEVERITY_INFO => "INFO",
        MavSeverity::MAV_SEVERITY_DEBUG => "DEBUG",
    }
}

/// Position and GPS telemetry is noise until the estimator has an origin.
fn gated_by_origin(message: &MavMessage) -> bool {
    matches!(
        message,
        MavMessage::GPS_RAW_INT(_) | MavMessage::GLOBAL_POSITION_INT(_)
    )
}

pub struct Session<L, C> {
    link: L,
    clock: C,
    encoder: Encoder,
    log: Option<TlogWriter>,
    state: SessionState,
}

impl<L, C> Session<L, C>
where
    L: VehicleLink,
    C: Clock,
{
    /// Wait for the vehicle, then configure it.
    ///
    /// `clock` should be started before the simulator is launched so that
    /// simulated time covers the whole run.
    pub fn establish(
        link: L,
        clock: C,
        log: Option<TlogWriter>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let speed_multiplier = validate_speed_multiplier(config.speed_multiplier)?;
        let mut session = Self {
            link,
            clock,
            encoder: Encoder::new(config.protocol),
            log,
            state: SessionState::new(speed_multiplier),
        };

        session.print(&format!("run at {}X wall time", config.speed_multiplier));
        match &session.log {
            Some(log) => session.print(&format!("logging to {}", log.path().display())),
            None => session.print("not logging"),
        }

        session.print("waiting for a HEARTBEAT message...");
        session.wait_heartbeat(config.heartbeat_timeout)?;
        session.print("HEARTBEAT received");

        if !config.params.is_empty() {
            session.set_params(&config.params)?;
        }
        session.request_messages()?;

        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn log(&self) -> Option<&TlogWriter> {
        self.log.as_ref()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    fn print(&self, message: &str) {
        info!("[{:.2}] {}", self.simulated_time(), message);
    }

    fn print_vehicle(&self, level: &str, message: &str) {
        info!("[{:.2}] ardusub {}: {}", self.simulated_time(), level, message);
    }

    /// Block until a heartbeat arrives. Anything received before it is
    /// discarded.
    fn wait_heartbeat(&mut self, timeout: Option<Duration>) -> Result<(), SessionError> {
        let started = self.clock.elapsed();
        loop {
            while let Some(frame) = self.link.try_recv_frame()? {
                match codec::decode(&frame) {
                    Ok((_, MavMessage::HEARTBEAT(_))) => return Ok(()),
                    Ok((_, message)) => {
                        debug!("discarding {} before heartbeat", codec::message_name(&message))
                    }
                    Err(e) => debug!("discarding malformed frame before heartbeat: {}", e),
                }
            }

            if let Some(timeout) = timeout {
                if self.clock.elapsed().saturating_sub(started) >= timeout {
                    return Err(SessionError::HeartbeatTimeout(timeout));
                }
            }
            self.clock.sleep(HEARTBEAT_POLL_INTERVAL);
        }
    }

    fn set_params(&mut self, params: &[Param]) -> Result<(), SessionError> {
        self.print(&format!("setting {} parameters", params.len()));
        for param in params {
            self.send(&messages::param_set(param))?;
        }
        Ok(())
    }

    fn request_messages(&mut self) -> Result<(), SessionError> {
        for id in INTERESTING_MESSAGE_IDS {
            self.print(&format!(
                "request {}Hz rate for message id {}",
                INTERESTING_MESSAGE_HZ, id
            ));
            self.send(&messages::request_message_interval(id, INTERESTING_MESSAGE_HZ))?;
        }
        Ok(())
    }

    fn handle_inbound(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        let message = match codec::decode(frame) {
            Ok((_, message)) => message,
            Err(e) => {
                warn!("[{:.2}] dropping inbound frame: {}", self.simulated_time(), e);
                return Ok(());
            }
        };

        match &message {
            MavMessage::PARAM_VALUE(data) => {
                let name = codec::c_str(&data.param_id);
                if !NOISY_PARAMS.contains(&name.as_str()) {
                    self.print(&format!("{} = {}", name, data.param_value));
                }
            }
            MavMessage::COMMAND_ACK(data) => {
                if data.command != MavCmd::MAV_CMD_GET_HOME_POSITION {
                    self.print(&format!(
                        "command {:?} was acknowledged with result {:?}",
                        data.command, data.result
                    ));
                }
            }
            MavMessage::STATUSTEXT(data) => {
                let text = codec::c_str(&data.text);
                if text == READY_TEXT {
                    self.state.readiness = self.state.readiness.on_ready();
                }
                if text != SUPPRESSED_TEXT {
                    self.print_vehicle(severity_name(data.severity), &text);
                }
            }
            MavMessage::HOME_POSITION(data) => {
                self.print_vehicle(
                    "HOME_POSITION",
                    &format!(
                        "({}, {}), ({}, {})",
                        data.latitude, data.longitude, data.x, data.y
                    ),
                );
                self.state.origin = Origin::Established;
            }
            MavMessage::GPS_GLOBAL_ORIGIN(data) => {
                self.print_vehicle(
                    "GPS_GLOBAL_ORIGIN",
                    &format!("({}, {})", data.latitude, data.longitude),
                );
                self.state.origin = Origin::Established;
            }
            _ => {}
        }

        if gated_by_origin(&message) && !self.state.origin.is_established() {
            return Ok(());
        }
        if let Some(log) = self.log.as_mut() {
            log.write(frame)?;
        }
        Ok(())
    }
}

impl<L, C> VehicleIo for Session<L, C>
where
    L: VehicleLink,
    C: Clock,
{
    /// Encode, transmit, then log the exact bytes that went out.
    fn send(&mut self, message: &MavMessage) -> Result<(), SessionError> {
        let frame = self.encoder.encode(message)?;
        self.link.send_frame(&frame)?;
        if let Some(log) = self.log.as_mut() {
            log.write(&frame)?;
        }
        Ok(())
    }

    fn drain_inbound(&mut self) -> Result<usize, SessionError> {
        let mut handled = 0;
        while let Some(frame) = self.link.try_recv_frame()? {
            self.handle_inbound(&frame)?;
            handled += 1;
        }
        Ok(handled)
    }

    fn wall_time(&self) -> Duration {
        self.clock.elapsed()
    }

    fn speed_multiplier(&self) -> f64 {
        self.state.speed_multiplier
    }

    fn readiness(&self) -> Readiness {
        self.state.readiness
    }

    fn mark_armed(&mut self) -> bool {
        match self.state.readiness.on_armed() {
            Some(next) => {
                self.state.readiness = next;
                true
            }
            None => false,
        }
    }

    fn sleep(&mut self, duration: Duration) {
        self.clock.sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_names() {
        assert_eq!(severity_name(MavSeverity::MAV_SEVERITY_CRITICAL), "CRITICAL");
        assert_eq!(severity_name(MavSeverity::MAV_SEVERITY_WARNING), "WARNING");
        assert_eq!(severity_name(MavSeverity::MAV_SEVERITY_INFO), "INFO");
    }

    #[test]
    fn test_origin_gate() {
        assert!(gated_by_origin(&MavMessage::GPS_RAW_INT(Default::default())));
        assert!(gated_by_origin(&MavMessage::GLOBAL_POSITION_INT(
            Default::default()
        )));
        assert!(!gated_by_origin(&messages::heartbeat()));
    }
}
