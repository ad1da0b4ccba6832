//! Init command - create the node repository

use ark_node_core::dirs::DataDirs;
use ark_repo::{InitOptions, Repository};
use tracing::info;

use crate::cli::InitArgs;

pub(crate) fn run(args: InitArgs) -> eyre::Result<()> {
    let path = DataDirs::new(&args.datadir).repo();

    if ark_repo::is_initialized(&path) {
        info!(path = %path.display(), "Repository already exists");
        return Ok(());
    }

    let repo = Repository::create(&path, &InitOptions::default())?;
    info!(path = %path.display(), peer_id = %repo.peer_id(), "Initialized repository");
    Ok(())
}
