//! Node repository.
//!
//! A repository is a directory holding everything a node persists between
//! runs: its identity keypair, its configuration and its block storage.
//!
//! ```text
//! <repo>/
//! ├── version       # format version, decimal
//! ├── config.toml   # RepoConfig
//! └── blocks/       # datastore root
//! ```
//!
//! Repositories written by older releases are upgraded in place by
//! [`migrate`] before they can be opened.

mod config;
mod constants;
mod error;
mod lock;
mod migration;
mod repo;
mod usage;

pub use config::{
    AddressesConfig, DatastoreConfig, DatastoreSpec, ExperimentalConfig, IdentityConfig,
    InitOptions, RepoConfig, ReproviderConfig, ReproviderStrategy, RoutingConfig, RoutingMode,
};
pub use constants::*;
pub use error::{MigrationError, RepoError};
pub use migration::migrate;
pub use repo::{Repository, is_initialized, read_version, set_announce_addresses};
pub use usage::storage_usage;
