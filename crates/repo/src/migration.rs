//! In-place upgrades of the repository format.
//!
//! Each step moves a repository from one format version to the next and is
//! safe to rerun: files are rewritten atomically and the version file is
//! bumped only after the step's data is in place.

use std::{cmp::Ordering, fs, path::Path};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    AddressesConfig, ExperimentalConfig, IdentityConfig, InitOptions, MigrationError, RepoConfig,
    RepoError, ReproviderConfig, ReproviderStrategy, RoutingConfig, RoutingMode,
    constants::{LEGACY_CONFIG_FILE, REPO_VERSION},
    lock::RepoLock,
    repo::{read_config, read_version, write_config, write_version},
};

struct Migration {
    from: u32,
    apply: fn(&Path) -> Result<(), MigrationError>,
}

const MIGRATIONS: &[Migration] = &[Migration { from: 1, apply: migrate_v1_to_v2 }];

/// Upgrade the repository at `path` to [`REPO_VERSION`].
///
/// A no-op when the repository is already current.
pub fn migrate(path: impl AsRef<Path>) -> Result<(), MigrationError> {
    let path = path.as_ref();
    let Some(mut version) = read_version(path)? else {
        return Err(RepoError::NotInitialized(path.to_path_buf()).into());
    };

    match version.cmp(&REPO_VERSION) {
        Ordering::Equal => {
            debug!(path = %path.display(), version, "Repository already current");
            return Ok(());
        }
        Ordering::Greater => {
            return Err(MigrationError::Downgrade {
                found: version,
                supported: REPO_VERSION,
            });
        }
        Ordering::Less => {}
    }

    let _lock = RepoLock::acquire(path)?;

    while version < REPO_VERSION {
        let step = MIGRATIONS
            .iter()
            .find(|m| m.from == version)
            .ok_or(MigrationError::NoPath(version))?;

        info!(path = %path.display(), from = version, to = version + 1, "Migrating repository");
        (step.apply)(path)?;
        write_version(path, version + 1)?;
        version += 1;
    }

    info!(path = %path.display(), version, "Repository migration complete");
    Ok(())
}

/// `config.json` with upper-camel keys.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyConfig {
    identity: LegacyIdentity,
    #[serde(default)]
    routing: Option<LegacyRouting>,
    #[serde(default)]
    addresses: Option<LegacyAddresses>,
    #[serde(default)]
    bootstrap: Option<Vec<String>>,
    #[serde(default)]
    reprovider: Option<LegacyReprovider>,
    #[serde(default)]
    experimental: Option<LegacyExperimental>,
}

#[derive(Debug, Deserialize)]
struct LegacyIdentity {
    #[serde(rename = "PeerID")]
    peer_id: String,
    #[serde(rename = "PrivKey")]
    priv_key: String,
}

#[derive(Debug, Deserialize)]
struct LegacyRouting {
    #[serde(rename = "Type")]
    mode: RoutingMode,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct LegacyAddresses {
    swarm: Vec<String>,
    announce: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyReprovider {
    strategy: ReproviderStrategy,
    interval: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyExperimental {
    filestore_enabled: bool,
}

impl LegacyConfig {
    fn into_config(self) -> RepoConfig {
        let identity = IdentityConfig {
            peer_id: self.identity.peer_id,
            private_key: self.identity.priv_key,
        };
        let mut config = RepoConfig::new(identity, &InitOptions::default());

        if let Some(routing) = self.routing {
            config.routing = RoutingConfig { mode: routing.mode };
        }
        if let Some(addresses) = self.addresses {
            config.addresses = AddressesConfig {
                swarm: addresses.swarm,
                announce: addresses.announce,
            };
        }
        if let Some(bootstrap) = self.bootstrap {
            config.bootstrap = bootstrap;
        }
        if let Some(reprovider) = self.reprovider {
            config.reprovider = ReproviderConfig {
                strategy: reprovider.strategy,
                interval: reprovider.interval,
            };
        }
        if let Some(experimental) = self.experimental {
            config.experimental = ExperimentalConfig {
                filestore_enabled: experimental.filestore_enabled,
            };
        }

        config
    }
}

fn migrate_v1_to_v2(path: &Path) -> Result<(), MigrationError> {
    let legacy_path = path.join(LEGACY_CONFIG_FILE);
    if !legacy_path.exists() {
        // Interrupted between removing the legacy file and bumping the version
        let config = read_config(path)?;
        config.identity.keypair()?;
        debug!(path = %path.display(), "Legacy config already converted");
        return Ok(());
    }

    let text = fs::read_to_string(&legacy_path).map_err(RepoError::from)?;
    let legacy: LegacyConfig = serde_json::from_str(&text)?;
    let config = legacy.into_config();

    config.identity.keypair()?;
    config.reprovider_interval()?;

    fs::create_dir_all(path.join(config.datastore.spec.root())).map_err(RepoError::from)?;
    write_config(path, &config)?;
    fs::remove_file(&legacy_path).map_err(RepoError::from)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Repository, constants::CONFIG_FILE};
    use assert_matches::assert_matches;

    fn write_v1(path: &Path, identity: &IdentityConfig) {
        let legacy = serde_json::json!({
            "Identity": {
                "PeerID": identity.peer_id,
                "PrivKey": identity.private_key,
            },
            "Routing": { "Type": "dhtclient" },
            "Addresses": {
                "Swarm": ["/ip4/0.0.0.0/tcp/4001"],
                "Announce": ["/ip4/203.0.113.4/tcp/4001"],
            },
            "Bootstrap": [],
            "Reprovider": { "Strategy": "all", "Interval": "12h" },
        });
        fs::write(path.join(LEGACY_CONFIG_FILE), legacy.to_string()).unwrap();
        write_version(path, 1).unwrap();
    }

    #[test]
    fn test_v1_to_v2() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityConfig::generate().unwrap();
        write_v1(dir.path(), &identity);

        assert_matches!(
            Repository::open(dir.path()),
            Err(RepoError::NeedsMigration { found: 1, .. })
        );

        migrate(dir.path()).unwrap();

        assert_eq!(read_version(dir.path()).unwrap(), Some(REPO_VERSION));
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert!(!dir.path().join(LEGACY_CONFIG_FILE).exists());

        let repo = Repository::open(dir.path()).unwrap();
        let config = repo.config();
        assert_eq!(config.identity, identity);
        assert_eq!(config.routing.mode, RoutingMode::DhtClient);
        assert_eq!(config.addresses.announce, vec!["/ip4/203.0.113.4/tcp/4001"]);
        assert!(config.bootstrap.is_empty());
        assert_eq!(config.reprovider.strategy, ReproviderStrategy::All);
        assert_eq!(config.reprovider.interval, "12h");
        // Missing sections fall back to current defaults
        assert!(config.experimental.filestore_enabled);
        assert!(repo.datastore_root().is_dir());
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_v1(dir.path(), &IdentityConfig::generate().unwrap());

        migrate(dir.path()).unwrap();
        let first = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();

        migrate(dir.path()).unwrap();
        let second = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_interrupted_step_reruns() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityConfig::generate().unwrap();
        write_v1(dir.path(), &identity);

        // A crash after a partial config write, before the legacy file is removed
        fs::write(dir.path().join(CONFIG_FILE), "identity = ").unwrap();

        migrate(dir.path()).unwrap();

        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.config().identity, identity);
    }

    #[test]
    fn test_interrupted_before_version_bump() {
        let dir = tempfile::tempdir().unwrap();
        let identity = IdentityConfig::generate().unwrap();
        write_v1(dir.path(), &identity);

        // The step completed but the version file still says 1
        migrate_v1_to_v2(dir.path()).unwrap();
        assert!(!dir.path().join(LEGACY_CONFIG_FILE).exists());
        assert_eq!(read_version(dir.path()).unwrap(), Some(1));

        migrate(dir.path()).unwrap();

        assert_eq!(read_version(dir.path()).unwrap(), Some(REPO_VERSION));
        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.config().identity, identity);
        assert_eq!(repo.config().addresses.announce, vec!["/ip4/203.0.113.4/tcp/4001"]);
    }

    #[test]
    fn test_missing_configs_fail() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), 1).unwrap();

        assert_matches!(migrate(dir.path()), Err(MigrationError::Repo(RepoError::Io(_))));
        assert_eq!(read_version(dir.path()).unwrap(), Some(1));
    }

    #[test]
    fn test_downgrade_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), REPO_VERSION + 1).unwrap();

        assert_matches!(migrate(dir.path()), Err(MigrationError::Downgrade { .. }));
    }

    #[test]
    fn test_corrupt_legacy_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LEGACY_CONFIG_FILE), "{ not json").unwrap();
        write_version(dir.path(), 1).unwrap();

        assert_matches!(migrate(dir.path()), Err(MigrationError::LegacyConfig(_)));
        assert_eq!(read_version(dir.path()).unwrap(), Some(1));
    }

    #[test]
    fn test_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            migrate(dir.path()),
            Err(MigrationError::Repo(RepoError::NotInitialized(_)))
        );
    }

    #[test]
    fn test_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), 0).unwrap();

        assert_matches!(migrate(dir.path()), Err(MigrationError::NoPath(0)));
    }
}
