use ark_net_reachability::ProbeError;
use ark_repo::{MigrationError, RepoError};
use thiserror::Error;

/// Errors building a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to construct node: {0}")]
    Construction(String),

    #[error("invalid address {addr:?} in repository config: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: libp2p::multiaddr::Error,
    },

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Errors from requests sent to a running node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("node lifetime cancelled")]
    Cancelled,

    #[error("node event loop stopped")]
    Stopped,

    #[error("dial failed: {0}")]
    Dial(String),
}

/// Errors switching a node to relay mode.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("node is already in relay mode")]
    AlreadyRelayed,

    #[error("relay transition cancelled")]
    Cancelled,

    #[error("failed to rewrite repository: {0}")]
    Repo(#[from] RepoError),

    #[error("failed to rebuild node: {0}")]
    Node(#[from] NodeError),

    #[error("failed to set up relay peering: {0}")]
    Peering(#[from] RequestError),
}

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("repository migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("reachability probe failed: {0}")]
    Probe(#[source] ProbeError),

    #[error(transparent)]
    Relay(RelayError),

    #[error("startup cancelled")]
    Cancelled,
}

impl From<ProbeError> for LaunchError {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Cancelled => Self::Cancelled,
            e => Self::Probe(e),
        }
    }
}

impl From<RelayError> for LaunchError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Cancelled => Self::Cancelled,
            e => Self::Relay(e),
        }
    }
}
