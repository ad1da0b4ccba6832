//! Node command - run the startup flow and serve until Ctrl-C

use ark_node::{LaunchConfig, NodeControl, SwarmNodeFactory};
use ark_node_core::dirs::DataDirs;
use tracing::{info, warn};

use crate::cli::NodeArgs;

pub(crate) async fn run(args: NodeArgs) -> eyre::Result<()> {
    let dirs = DataDirs::new(&args.datadir);
    let config = LaunchConfig::new(dirs.repo(), args.network.network)?
        .with_grace_period(args.network.grace_period)
        .with_settle_period(args.network.settle_period);

    let node = tokio::select! {
        node = ark_node::init(&SwarmNodeFactory, config) => node?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted during startup");
            return Ok(());
        }
    };

    info!(identity = %node.handle().identity(), "Node identity");
    match node.handle().storage_usage() {
        Ok(bytes) => info!(bytes, "Repository size"),
        Err(e) => warn!(error = %e, "Failed to measure repository size"),
    }

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    node.shutdown().await;

    Ok(())
}
