//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Motion Guard - heartbeat freshness watchdog and camera rotation
#[derive(Parser, Debug)]
#[command(
    name = "motion-guard",
    author,
    version,
    about = "Heartbeat freshness watchdog with stereo camera rotation",
    long_about = "Watches the heartbeat topics of a mobile robot and publishes a single \n\
                  motion-gating interrupt level (0 clear, 1 stale, 2 proximity).\n\n\
                  Also cycles the stereo sensor through its camera pairs and \n\
                  republishes imagery and ranges on the bus."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MOTION_GUARD_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MOTION_GUARD_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the watchdog against the mock sensor
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "MOTION_GUARD_CONFIG")]
    pub config: PathBuf,

    /// Stop after this many seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "MOTION_GUARD_DURATION")]
    pub duration: u64,

    /// Override the shared staleness threshold (seconds)
    #[arg(long, env = "MOTION_GUARD_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Override the proximity distance threshold (metres)
    #[arg(long, env = "MOTION_GUARD_PROXIMITY_M")]
    pub proximity_m: Option<f32>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "MOTION_GUARD_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show camera rotation
    #[arg(long)]
    pub cameras: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
