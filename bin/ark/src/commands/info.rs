//! Info command - display repository information without starting a node

use ark_node_core::dirs::DataDirs;
use ark_repo::Repository;

use crate::cli::InfoArgs;

pub(crate) fn run(args: InfoArgs) -> eyre::Result<()> {
    let path = DataDirs::new(&args.datadir).repo();
    let repo = Repository::open(&path)?;
    let version = ark_repo::read_version(&path)?.unwrap_or_default();

    println!("Repository:     {}", path.display());
    println!("Peer ID:        {}", repo.peer_id());
    println!("Format version: {version}");
    let announce = &repo.config().addresses.announce;
    if announce.is_empty() {
        println!("Announce:       (none)");
    }
    for addr in announce {
        println!("Announce:       {addr}");
    }
    println!("Storage usage:  {} bytes", repo.storage_usage()?);

    Ok(())
}
