//! Repository format constants and configuration defaults.

/// Repository format version written by this release.
pub const REPO_VERSION: u32 = 2;

/// Version file name.
pub const VERSION_FILE: &str = "version";

/// Current config file name.
pub const CONFIG_FILE: &str = "config.toml";

/// Config file name used by format version 1.
pub const LEGACY_CONFIG_FILE: &str = "config.json";

/// Datastore root, relative to the repository.
pub const DEFAULT_BLOCKS_DIR: &str = "blocks";

/// Datastore capacity ceiling (1 PB).
pub const DEFAULT_STORAGE_MAX: u64 = 1_000_000_000_000_000;

/// Interval between provider record republications.
pub const DEFAULT_REPROVIDER_INTERVAL: &str = "1h";

/// Default swarm listen addresses.
pub const DEFAULT_SWARM_ADDRS: &[&str] = &["/ip4/0.0.0.0/tcp/4001", "/ip6/::/tcp/4001"];

/// Seed bootstrap peers written into fresh repositories.
pub const SEED_BOOTSTRAP_PEERS: &[&str] = &[
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmQCU2EcMqAqQPR2i9bChDtGNJchTbq5TbXJJ16u19uLTa",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmbLHAnMoJPWSCR5Zhtx6BHJX9KiKNN6tpvbUcqanj75Nb",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmcZf59bWwK5XFi76CZX8cbJ4BhTzzA3gU1ZjYZcYW3dwt",
    "/ip4/104.131.131.82/tcp/4001/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ",
];
