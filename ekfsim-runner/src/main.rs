//! ekfsim
//!
//! Launches ArduSub SITL and feeds its EKF synthetic or recorded sensors.

use anyhow::Result;
use clap::Parser;
use ekfsim_runner::cli::{self, Cli};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    cli::execute(Cli::parse())
}
