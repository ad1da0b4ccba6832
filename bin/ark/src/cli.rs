//! Command-line interface for the Ark node.

use ark_node_core::{
    args::{DataDirArgs, LogArgs, NetworkArgs},
    logging::init_logging,
};
use clap::{Args, Parser, Subcommand};

use crate::commands;

/// Ark - peer-to-peer archive node
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) log_args: LogArgs,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Create the node repository
    Init(InitArgs),

    /// Run the node until interrupted
    Node(NodeArgs),

    /// Display information about the repository
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub(crate) struct InitArgs {
    #[command(flatten)]
    pub(crate) datadir: DataDirArgs,
}

#[derive(Debug, Args)]
pub(crate) struct NodeArgs {
    #[command(flatten)]
    pub(crate) datadir: DataDirArgs,

    #[command(flatten)]
    pub(crate) network: NetworkArgs,
}

#[derive(Debug, Args)]
pub(crate) struct InfoArgs {
    #[command(flatten)]
    pub(crate) datadir: DataDirArgs,
}

/// Parse arguments, set up logging and dispatch the subcommand.
pub(crate) async fn run() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_args)?;

    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Node(args) => commands::node::run(args).await,
        Commands::Info(args) => commands::info::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{path::PathBuf, time::Duration};

    #[test]
    fn test_node_command() {
        let cli = Cli::parse_from([
            "ark",
            "-vv",
            "node",
            "--datadir",
            "/tmp/ark",
            "--network",
            "--settle-period",
            "5s",
        ]);
        assert_eq!(cli.log_args.verbosity, 2);
        let Commands::Node(args) = cli.command else {
            panic!("expected node command");
        };
        assert_eq!(args.datadir.datadir, Some(PathBuf::from("/tmp/ark")));
        assert!(args.network.network);
        assert_eq!(args.network.grace_period, Duration::from_secs(30));
        assert_eq!(args.network.settle_period, Duration::from_secs(5));
    }

    #[test]
    fn test_info_command() {
        let cli = Cli::parse_from(["ark", "info", "--quiet"]);
        assert!(cli.log_args.quiet);
        assert!(matches!(cli.command, Commands::Info(InfoArgs { datadir: DataDirArgs { datadir: None } })));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["ark"]).is_err());
    }
}
