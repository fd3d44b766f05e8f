//! Launching the simulated vehicle
//!
//! Starts ArduSub SITL as a child process. The child is killed when the
//! handle is dropped, so a failed run never leaves a simulator behind.

use ekfsim_core::motion::{LatLon, ORIGIN};
use std::path::PathBuf;
use std::process::{Child, Command};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("ARDUPILOT_HOME is not set; pass --ardupilot-home or use --no-launch")]
    MissingHome,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub ardupilot_home: PathBuf,
    pub speed_multiplier: f64,
    pub home: LatLon,
}

impl LaunchConfig {
    pub fn new(ardupilot_home: Option<PathBuf>, speed_multiplier: f64) -> Result<Self, LaunchError> {
        let ardupilot_home = ardupilot_home.ok_or(LaunchError::MissingHome)?;
        Ok(Self {
            ardupilot_home,
            speed_multiplier,
            home: ORIGIN,
        })
    }

    pub fn program(&self) -> PathBuf {
        self.ardupilot_home.join("build/sitl/bin/ardusub")
    }

    pub fn args(&self) -> Vec<String> {
        let defaults = self
            .ardupilot_home
            .join("Tools/autotest/default_params/sub.parm");
        vec![
            "-S".to_string(),
            "-w".to_string(),
            "--model".to_string(),
            "vectored".to_string(),
            "--speedup".to_string(),
            format!("{:.2}", self.speed_multiplier),
            "--slave".to_string(),
            "0".to_string(),
            "--defaults".to_string(),
            defaults.display().to_string(),
            "--sim-address=127.0.0.1".to_string(),
            "-I0".to_string(),
            "--home".to_string(),
            format!("{},{},-0.1,0.0", self.home.lat, self.home.lon),
        ]
    }
}

/// A running simulator
pub struct VehicleProcess {
    child: Child,
}

impl VehicleProcess {
    pub fn spawn(config: &LaunchConfig) -> Result<Self, LaunchError> {
        let program = config.program();
        info!("starting ArduSub: {}", program.display());

        let child = Command::new(&program)
            .args(config.args())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        info!("ArduSub running with pid {}", child.id());
        Ok(Self { child })
    }
}

impl Drop for VehicleProcess {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!("failed to stop ArduSub (pid {}): {}", self.child.id(), e);
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_home_is_an_error() {
        assert!(matches!(
            LaunchConfig::new(None, 1.0),
            Err(LaunchError::MissingHome)
        ));
    }

    #[test]
    fn test_args() {
        let config = LaunchConfig::new(Some(PathBuf::from("/opt/ardupilot")), 2.5).unwrap();
        assert_eq!(
            config.program(),
            PathBuf::from("/opt/ardupilot/build/sitl/bin/ardusub")
        );

        let args = config.args();
        assert_eq!(args[0], "-S");
        assert_eq!(args[5], "2.50", "speedup is formatted to two places");
        assert_eq!(
            args[9],
            "/opt/ardupilot/Tools/autotest/default_params/sub.parm"
        );
        assert_eq!(args.last().unwrap(), "47.607886,-122.344324,-0.1,0.0");
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let config = LaunchConfig::new(Some(PathBuf::from("/nonexistent/ardupilot")), 1.0).unwrap();
        let err = VehicleProcess::spawn(&config).err().unwrap();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/ardupilot"));
    }
}
