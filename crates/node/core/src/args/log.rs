//! Logging CLI arguments.

use clap::Args;

/// Logging configuration.
#[derive(Debug, Args, Clone, Default)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Silence all output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Log filter directive (e.g., "ark_node=debug,libp2p=info").
    #[arg(long = "log.filter", value_name = "DIRECTIVE", global = true)]
    pub filter: Option<String>,
}
