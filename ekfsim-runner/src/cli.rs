//! Command line interface
//!
//! Configuration comes from flags and the environment only.

use crate::launch::{LaunchConfig, VehicleProcess};
use crate::link::{TcpLink, DEFAULT_ADDRESS};
use crate::runner::{self, RunStats};
use crate::session::{Session, SessionConfig};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ekfsim_core::mavlink::MavlinkVersion;
use ekfsim_core::motion::DEFAULT_GPS_NOISE;
use ekfsim_core::params;
use ekfsim_core::tlog::TlogWriter;
use ekfsim_core::{Driver, SystemClock};
use ekfsim_drivers::{replay, SensorConfig, SensorSynthesizer, TimedReplay};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "ekfsim", version, about = "Drive an ArduSub simulation with synthetic or recorded sensors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Circle the vehicle with a synthetic position-delta sensor and GPS
    Sensors {
        /// Simulated seconds to run for
        #[arg(long, default_value_t = 60)]
        time: u64,

        /// Switch EKF source sets when the position-delta sensor toggles
        #[arg(long)]
        switch: bool,

        /// GPS noise standard deviation, meters
        #[arg(long, default_value_t = DEFAULT_GPS_NOISE)]
        gps_noise: f64,

        /// Seed the GPS noise for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        vehicle: VehicleArgs,
    },

    /// Re-send sensor messages from a telemetry log with their original timing
    Replay {
        /// Telemetry log to replay
        path: PathBuf,

        #[command(flatten)]
        vehicle: VehicleArgs,
    },

    /// Parse a parameter file and print it as JSON
    CheckParams { path: PathBuf },
}

#[derive(Debug, Clone, Args)]
pub struct VehicleArgs {
    /// Parameter file to push to the vehicle after connecting
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Write all traffic to this telemetry log
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Speed multiplier relative to wall time
    #[arg(long, default_value_t = 1.0, value_parser = parse_speedup)]
    pub speedup: f64,

    /// Vehicle TCP address
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    pub address: SocketAddr,

    /// Attach to an already running simulator
    #[arg(long)]
    pub no_launch: bool,

    /// ArduPilot checkout containing the SITL build
    #[arg(long, env = "ARDUPILOT_HOME")]
    pub ardupilot_home: Option<PathBuf>,

    /// Speak MAVLink 1 instead of MAVLink 2
    #[arg(long)]
    pub mavlink1: bool,

    /// Give up if no heartbeat arrives within this many seconds (default: wait forever)
    #[arg(long, value_name = "SECS", value_parser = parse_seconds)]
    pub heartbeat_timeout: Option<f64>,

    /// Keep retrying the TCP connection for this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 30.0, value_parser = parse_seconds)]
    pub connect_timeout: f64,
}

fn parse_speedup(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("speedup must be greater than 0, got {value}"))
    }
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("expected a non-negative number of seconds, got {value}"))
    }
}

impl VehicleArgs {
    fn protocol(&self) -> MavlinkVersion {
        if self.mavlink1 {
            MavlinkVersion::V1
        } else {
            MavlinkVersion::V2
        }
    }
}

/// A connected session plus the simulator it talks to, if we launched one
struct Vehicle {
    session: Session<TcpLink, SystemClock>,
    _process: Option<VehicleProcess>,
}

fn open_vehicle(args: &VehicleArgs) -> Result<Vehicle> {
    // Simulated time covers the whole run, including startup
    let clock = SystemClock::new();

    let log = args
        .log
        .as_ref()
        .map(|path| {
            TlogWriter::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))
        })
        .transpose()?;

    let params = match &args.params {
        Some(path) => params::parse_params(path)?,
        None => Vec::new(),
    };

    let process = if args.no_launch {
        info!("not launching ArduSub, attaching to {}", args.address);
        None
    } else {
        let config = LaunchConfig::new(args.ardupilot_home.clone(), args.speedup)?;
        Some(VehicleProcess::spawn(&config)?)
    };

    info!("connecting to ArduSub at {}...", args.address);
    let link = TcpLink::connect(args.address, Duration::from_secs_f64(args.connect_timeout))
        .with_context(|| format!("Failed to connect to vehicle at {}", args.address))?;

    let session = Session::establish(
        link,
        clock,
        log,
        SessionConfig {
            speed_multiplier: args.speedup,
            params,
            heartbeat_timeout: args.heartbeat_timeout.map(Duration::from_secs_f64),
            protocol: args.protocol(),
        },
    )?;

    Ok(Vehicle {
        session,
        _process: process,
    })
}

fn drive(args: &VehicleArgs, driver: &mut dyn Driver) -> Result<RunStats> {
    let mut vehicle = open_vehicle(args)?;
    let stats = runner::run(driver, &mut vehicle.session)?;
    if let Some(log) = vehicle.session.log() {
        info!(
            "wrote {} records to {}",
            log.records_written(),
            log.path().display()
        );
    }
    Ok(stats)
}

fn check_params(path: &Path) -> Result<String> {
    let params = params::parse_params(path)?;
    serde_json::to_string_pretty(&params).context("Failed to serialize parameters")
}

pub fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sensors {
            time,
            switch,
            gps_noise,
            seed,
            vehicle,
        } => {
            let mut synth = SensorSynthesizer::new(SensorConfig {
                duration_s: time as f64,
                switch_sources: switch,
                gps_noise_m: gps_noise,
                seed,
                ..Default::default()
            });
            drive(&vehicle, &mut synth)?;
        }
        Command::Replay { path, vehicle } => {
            let items = replay::recorded_items(&path)
                .with_context(|| format!("Failed to read telemetry log {}", path.display()))?;
            let mut replay = TimedReplay::new(items, vehicle.speedup)?;
            drive(&vehicle, &mut replay)?;
        }
        Command::CheckParams { path } => {
            println!("{}", check_params(&path)?);
        }
    }
    Ok(())
}
