use std::path::PathBuf;

use thiserror::Error;

/// Errors from opening, creating or mutating a repository.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("no repository initialized at {}", .0.display())]
    NotInitialized(PathBuf),

    #[error(
        "repository at {} is at format version {found}, this release requires {supported}; run the migration first",
        path.display()
    )]
    NeedsMigration {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("repository format version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid version file: {0:?}")]
    InvalidVersion(String),

    #[error("{} already exists and is not an empty directory", .0.display())]
    AlreadyExists(PathBuf),

    #[error("repository at {} is held by a running node", .0.display())]
    Locked(PathBuf),

    #[error("invalid identity: {0}")]
    Identity(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("failed to walk datastore: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from upgrading a repository's on-disk format.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("cannot downgrade repository from format version {found} to {supported}")]
    Downgrade { found: u32, supported: u32 },

    #[error("no migration available from format version {0}")]
    NoPath(u32),

    #[error("invalid legacy config: {0}")]
    LegacyConfig(#[from] serde_json::Error),
}
