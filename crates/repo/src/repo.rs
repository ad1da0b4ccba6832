//! Opening, creating and mutating repositories.

use std::{
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
};

use libp2p::{Multiaddr, PeerId, identity::Keypair};
use tracing::{debug, info};

use crate::{
    InitOptions, RepoConfig, RepoError, RoutingMode,
    config::IdentityConfig,
    constants::{CONFIG_FILE, DEFAULT_BLOCKS_DIR, REPO_VERSION, VERSION_FILE},
    lock::RepoLock,
    usage,
};

/// An opened repository.
///
/// Holds the process-wide lock on its path until dropped.
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    config: RepoConfig,
    keypair: Keypair,
    peer_id: PeerId,
    _lock: RepoLock,
}

impl Repository {
    /// Open an existing repository at the current format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        ensure_current(path)?;

        let lock = RepoLock::acquire(path)?;
        let config = read_config(path)?;
        let keypair = config.identity.keypair()?;
        let peer_id = keypair.public().to_peer_id();

        info!(path = %path.display(), %peer_id, "Opened repository");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            keypair,
            peer_id,
            _lock: lock,
        })
    }

    /// Create a repository with a fresh identity and default configuration.
    ///
    /// `path` must be absent, an empty directory, or the leftovers of a create
    /// that was interrupted before the version file was written.
    pub fn create(path: impl AsRef<Path>, options: &InitOptions) -> Result<Self, RepoError> {
        let path = path.as_ref();

        if path.exists() {
            if !path.is_dir() || !is_unfinished_create(path)? {
                return Err(RepoError::AlreadyExists(path.to_path_buf()));
            }
        } else {
            fs::create_dir_all(path)?;
        }

        let identity = IdentityConfig::generate()?;
        let config = RepoConfig::new(identity, options);

        fs::create_dir_all(path.join(config.datastore.spec.root()))?;
        write_config(path, &config)?;
        // Written last: an interrupted create never looks initialized.
        write_version(path, REPO_VERSION)?;

        info!(
            path = %path.display(),
            peer_id = %config.identity.peer_id,
            "Created repository"
        );

        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Absolute datastore root.
    pub fn datastore_root(&self) -> PathBuf {
        self.path.join(self.config.datastore.spec.root())
    }

    /// Bytes used by the datastore.
    pub fn storage_usage(&self) -> Result<u64, RepoError> {
        usage::storage_usage(&self.datastore_root())
    }
}

/// Whether `path` is empty or holds only what an interrupted [`Repository::create`]
/// leaves behind: a config, temp files and an empty datastore root.
fn is_unfinished_create(path: &Path) -> Result<bool, RepoError> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name();
        let leftover = match name.to_str() {
            Some(CONFIG_FILE) => entry.file_type()?.is_file(),
            Some(DEFAULT_BLOCKS_DIR) => {
                entry.file_type()?.is_dir() && fs::read_dir(entry.path())?.next().is_none()
            }
            Some(name) => {
                name == format!("{CONFIG_FILE}.tmp") || name == format!("{VERSION_FILE}.tmp")
            }
            None => false,
        };
        if !leftover {
            return Ok(false);
        }
    }

    debug!(path = %path.display(), "Reusing directory of an unfinished create");
    Ok(true)
}

/// Whether `path` holds a repository of any format version.
pub fn is_initialized(path: impl AsRef<Path>) -> bool {
    matches!(read_version(path), Ok(Some(_)))
}

/// Read the format version, or `None` when no repository exists at `path`.
pub fn read_version(path: impl AsRef<Path>) -> Result<Option<u32>, RepoError> {
    let file = path.as_ref().join(VERSION_FILE);
    if !file.exists() {
        return Ok(None);
    }

    let text = fs::read_to_string(&file)?;
    text.trim()
        .parse()
        .map(Some)
        .map_err(|_| RepoError::InvalidVersion(text.trim().to_string()))
}

/// Replace the announce address list and normalize routing to `dhtserver`.
///
/// Everything else in the config is preserved. Duplicate addresses are
/// dropped, keeping the first occurrence. Fails with [`RepoError::Locked`]
/// while a live node holds the repository.
pub fn set_announce_addresses(
    path: impl AsRef<Path>,
    addresses: &[Multiaddr],
) -> Result<(), RepoError> {
    let path = path.as_ref();
    ensure_current(path)?;

    // Held for the duration of the rewrite.
    let _lock = RepoLock::acquire(path)?;
    let mut config = read_config(path)?;

    let mut announce: Vec<String> = Vec::with_capacity(addresses.len());
    for addr in addresses {
        let addr = addr.to_string();
        if !announce.contains(&addr) {
            announce.push(addr);
        }
    }

    debug!(path = %path.display(), ?announce, "Rewriting announce addresses");

    config.addresses.announce = announce;
    config.routing.mode = RoutingMode::DhtServer;
    write_config(path, &config)
}

fn ensure_current(path: &Path) -> Result<(), RepoError> {
    let Some(found) = read_version(path)? else {
        return Err(RepoError::NotInitialized(path.to_path_buf()));
    };

    match found.cmp(&REPO_VERSION) {
        Ordering::Equal => Ok(()),
        Ordering::Less => Err(RepoError::NeedsMigration {
            path: path.to_path_buf(),
            found,
            supported: REPO_VERSION,
        }),
        Ordering::Greater => Err(RepoError::UnsupportedVersion {
            found,
            supported: REPO_VERSION,
        }),
    }
}

pub(crate) fn read_config(path: &Path) -> Result<RepoConfig, RepoError> {
    let text = fs::read_to_string(path.join(CONFIG_FILE))?;
    Ok(toml::from_str(&text)?)
}

pub(crate) fn write_config(path: &Path, config: &RepoConfig) -> Result<(), RepoError> {
    let text = toml::to_string_pretty(config)?;
    write_atomic(&path.join(CONFIG_FILE), text.as_bytes())
}

pub(crate) fn write_version(path: &Path, version: u32) -> Result<(), RepoError> {
    write_atomic(&path.join(VERSION_FILE), format!("{version}\n").as_bytes())
}

/// Write to a temp file next to `target`, then rename over it.
fn write_atomic(target: &Path, contents: &[u8]) -> Result<(), RepoError> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, target)?;
    Ok(())
}
