//! Repository configuration.

use std::{path::PathBuf, time::Duration};

use libp2p::{PeerId, identity::Keypair};
use serde::{Deserialize, Serialize};

use crate::{
    RepoError,
    constants::{
        DEFAULT_BLOCKS_DIR, DEFAULT_REPROVIDER_INTERVAL, DEFAULT_STORAGE_MAX, DEFAULT_SWARM_ADDRS,
        SEED_BOOTSTRAP_PEERS,
    },
};

/// Persistent node configuration, stored as `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Bootstrap peer multiaddrs, each ending in `/p2p/<peer id>`
    #[serde(default)]
    pub bootstrap: Vec<String>,

    pub identity: IdentityConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub datastore: DatastoreConfig,

    #[serde(default)]
    pub reprovider: ReproviderConfig,

    #[serde(default)]
    pub addresses: AddressesConfig,

    #[serde(default)]
    pub experimental: ExperimentalConfig,
}

impl RepoConfig {
    /// Initial configuration for a fresh repository.
    pub fn new(identity: IdentityConfig, options: &InitOptions) -> Self {
        let swarm = match &options.swarm_addrs {
            Some(addrs) => addrs.clone(),
            None => DEFAULT_SWARM_ADDRS.iter().map(|a| a.to_string()).collect(),
        };
        let bootstrap = match &options.bootstrap {
            Some(peers) => peers.clone(),
            None => SEED_BOOTSTRAP_PEERS.iter().map(|a| a.to_string()).collect(),
        };

        Self {
            bootstrap,
            identity,
            routing: RoutingConfig::default(),
            datastore: DatastoreConfig::default(),
            reprovider: ReproviderConfig::default(),
            addresses: AddressesConfig { swarm, announce: Vec::new() },
            experimental: ExperimentalConfig::default(),
        }
    }

    /// Provider republication interval.
    pub fn reprovider_interval(&self) -> Result<Duration, RepoError> {
        self.reprovider.interval()
    }
}

/// Overrides applied when creating a repository.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Swarm listen addresses, replacing the defaults
    pub swarm_addrs: Option<Vec<String>>,
    /// Bootstrap peers, replacing the seed list
    pub bootstrap: Option<Vec<String>>,
}

/// Node identity. The private key is the hex-encoded protobuf keypair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub peer_id: String,
    pub private_key: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("peer_id", &self.peer_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl IdentityConfig {
    /// Generate a fresh Ed25519 identity.
    pub fn generate() -> Result<Self, RepoError> {
        Self::from_keypair(&Keypair::generate_ed25519())
    }

    pub fn from_keypair(keypair: &Keypair) -> Result<Self, RepoError> {
        let encoded = keypair
            .to_protobuf_encoding()
            .map_err(|e| RepoError::Identity(e.to_string()))?;

        Ok(Self {
            peer_id: keypair.public().to_peer_id().to_base58(),
            private_key: hex::encode(encoded),
        })
    }

    /// Decode the keypair, checking it matches the recorded peer id.
    pub fn keypair(&self) -> Result<Keypair, RepoError> {
        let bytes = hex::decode(&self.private_key)
            .map_err(|e| RepoError::Identity(format!("private key is not hex: {e}")))?;
        let keypair = Keypair::from_protobuf_encoding(&bytes)
            .map_err(|e| RepoError::Identity(e.to_string()))?;

        let derived = keypair.public().to_peer_id();
        if derived.to_base58() != self.peer_id {
            return Err(RepoError::Identity(format!(
                "private key belongs to {derived}, config names {}",
                self.peer_id
            )));
        }

        Ok(keypair)
    }

    pub fn peer_id(&self) -> Result<PeerId, RepoError> {
        self.peer_id
            .parse()
            .map_err(|e| RepoError::Identity(format!("invalid peer id: {e}")))
    }
}

/// DHT participation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Client or server, chosen from reachability
    Dht,
    /// Full DHT participation
    #[default]
    DhtServer,
    /// Query-only participation
    DhtClient,
    /// No DHT
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(rename = "type")]
    pub mode: RoutingMode,
}

/// Datastore layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Capacity ceiling in bytes
    pub storage_max: u64,
    pub spec: DatastoreSpec,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            storage_max: DEFAULT_STORAGE_MAX,
            spec: DatastoreSpec::Measure {
                prefix: "flatfs.datastore".to_string(),
                child: Box::new(DatastoreSpec::Flatfs {
                    path: DEFAULT_BLOCKS_DIR.to_string(),
                    shard_func: "/repo/flatfs/shard/v1/next-to-last/2".to_string(),
                    sync: true,
                }),
            },
        }
    }
}

/// A datastore backend, possibly wrapping another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatastoreSpec {
    /// Metrics wrapper
    Measure {
        prefix: String,
        child: Box<DatastoreSpec>,
    },
    /// Flat file store rooted at `path`, relative to the repository
    Flatfs {
        path: String,
        shard_func: String,
        sync: bool,
    },
}

impl DatastoreSpec {
    /// Storage root relative to the repository.
    pub fn root(&self) -> PathBuf {
        match self {
            Self::Measure { child, .. } => child.root(),
            Self::Flatfs { path, .. } => PathBuf::from(path),
        }
    }
}

/// Which blocks are announced to the DHT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReproviderStrategy {
    All,
    Pinned,
    #[default]
    Roots,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReproviderConfig {
    pub strategy: ReproviderStrategy,
    /// Humantime interval, e.g. `1h`
    pub interval: String,
}

impl Default for ReproviderConfig {
    fn default() -> Self {
        Self {
            strategy: ReproviderStrategy::default(),
            interval: DEFAULT_REPROVIDER_INTERVAL.to_string(),
        }
    }
}

impl ReproviderConfig {
    pub fn interval(&self) -> Result<Duration, RepoError> {
        humantime::parse_duration(&self.interval).map_err(|e| {
            RepoError::InvalidConfig(format!("reprovider interval {:?}: {e}", self.interval))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressesConfig {
    /// Listen addresses
    #[serde(default)]
    pub swarm: Vec<String>,
    /// Addresses advertised instead of the observed ones
    #[serde(default)]
    pub announce: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentalConfig {
    pub filestore_enabled: bool,
}

impl Default for ExperimentalConfig {
    fn default() -> Self {
        Self { filestore_enabled: true }
    }
}
