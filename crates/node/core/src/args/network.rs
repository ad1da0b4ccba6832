//! Network CLI arguments.

use clap::Args;
use std::time::Duration;

/// Reachability and relay configuration.
#[derive(Debug, Args, Clone)]
#[command(next_help_heading = "Network")]
pub struct NetworkArgs {
    /// Probe reachability after start and fall back to the relay when NAT-bound.
    #[arg(long)]
    pub network: bool,

    /// How long to wait for address discovery before probing.
    #[arg(
        long = "grace-period",
        value_name = "DURATION",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub grace_period: Duration,

    /// How long to wait after announcing the relay address before restarting.
    #[arg(
        long = "settle-period",
        value_name = "DURATION",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub settle_period: Duration,
}
