//! Data directory CLI arguments.

use clap::Args;
use std::path::PathBuf;

/// Data directory configuration.
#[derive(Debug, Args, Clone, Default)]
#[command(next_help_heading = "Datadir")]
pub struct DataDirArgs {
    /// Data directory path for all node data.
    #[arg(long, value_name = "PATH", env = "ARK_DATADIR")]
    pub datadir: Option<PathBuf>,
}
