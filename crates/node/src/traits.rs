use ark_net_bootstrap::{Dialer, PeerDescriptor};
use ark_net_reachability::AddressSource;
use ark_repo::{RepoError, Repository};
use ark_tasks::LifetimeContext;
use async_trait::async_trait;
use libp2p::PeerId;

use crate::{NodeError, RequestError};

/// Builds a live node from an opened repository.
#[async_trait]
pub trait NodeFactory: Send + Sync {
    type Node: NodeControl;

    /// The node takes ownership of `repo` and runs until `lifetime` is
    /// canceled.
    async fn build(&self, repo: Repository, lifetime: LifetimeContext)
    -> Result<Self::Node, NodeError>;
}

/// Control surface of a live node.
#[async_trait]
pub trait NodeControl: AddressSource + Send + Sync + 'static {
    type Dialer: Dialer + Clone + 'static;

    fn peer_id(&self) -> PeerId;

    /// Base58 peer id.
    fn identity(&self) -> String {
        self.peer_id().to_base58()
    }

    /// Bytes used by the node's datastore.
    fn storage_usage(&self) -> Result<u64, RepoError>;

    fn dialer(&self) -> Self::Dialer;

    async fn add_peering(&self, peer: PeerDescriptor) -> Result<(), RequestError>;

    async fn start_peering(&self) -> Result<(), RequestError>;

    /// Cancel the node's lifetime and wait until it has fully stopped.
    ///
    /// Once this returns the node's ports and its repository are released.
    /// Calling it again is a no-op.
    async fn shutdown(&self);
}
