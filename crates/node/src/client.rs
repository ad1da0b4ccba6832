//! Request channel into a running node.

use ark_net_bootstrap::{Dialer, PeerDescriptor};
use ark_net_reachability::AddressSource;
use ark_tasks::LifetimeContext;
use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId};
use tokio::sync::{mpsc, oneshot};

use crate::RequestError;

/// Requests handled by the node event loop.
#[derive(Debug)]
pub(crate) enum Command {
    Dial {
        peer: PeerDescriptor,
        reply: oneshot::Sender<Result<(), RequestError>>,
    },
    ObservedAddresses {
        reply: oneshot::Sender<Vec<Multiaddr>>,
    },
    ConnectedPeers {
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    AddPeering {
        peer: PeerDescriptor,
        reply: oneshot::Sender<()>,
    },
    StartPeering {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle for talking to a node's event loop.
///
/// Every request is bound to the node's lifetime: once it is canceled,
/// pending and new requests resolve with [`RequestError::Cancelled`].
#[derive(Debug, Clone)]
pub struct NodeClient {
    commands: mpsc::Sender<Command>,
    lifetime: LifetimeContext,
}

impl NodeClient {
    pub(crate) fn new(commands: mpsc::Sender<Command>, lifetime: LifetimeContext) -> Self {
        Self { commands, lifetime }
    }

    async fn request<T: Send>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command + Send,
    ) -> Result<T, RequestError> {
        let (reply, response) = oneshot::channel();
        let command = command(reply);

        self.lifetime
            .run(async {
                self.commands
                    .send(command)
                    .await
                    .map_err(|_| RequestError::Stopped)?;
                response.await.map_err(|_| RequestError::Stopped)
            })
            .await
            .map_err(|_| RequestError::Cancelled)?
    }

    /// Dial `peer` on any of its addresses. Resolves immediately if already
    /// connected.
    pub async fn dial(&self, peer: &PeerDescriptor) -> Result<(), RequestError> {
        self.request(|reply| Command::Dial { peer: peer.clone(), reply })
            .await?
    }

    /// Listen addresses (expanded per interface) followed by external addresses.
    pub async fn observed_addresses(&self) -> Result<Vec<Multiaddr>, RequestError> {
        self.request(|reply| Command::ObservedAddresses { reply }).await
    }

    pub async fn connected_peers(&self) -> Result<Vec<PeerId>, RequestError> {
        self.request(|reply| Command::ConnectedPeers { reply }).await
    }

    /// Register a peer the node should stay connected to.
    pub async fn add_peering(&self, peer: PeerDescriptor) -> Result<(), RequestError> {
        self.request(|reply| Command::AddPeering { peer, reply }).await
    }

    /// Start maintaining connections to registered peering peers.
    pub async fn start_peering(&self) -> Result<(), RequestError> {
        self.request(|reply| Command::StartPeering { reply }).await
    }
}

#[async_trait]
impl Dialer for NodeClient {
    type Error = RequestError;

    async fn dial(&self, peer: &PeerDescriptor) -> Result<(), RequestError> {
        NodeClient::dial(self, peer).await
    }
}

#[async_trait]
impl AddressSource for NodeClient {
    type Error = RequestError;

    async fn observed_addresses(&self) -> Result<Vec<Multiaddr>, RequestError> {
        NodeClient::observed_addresses(self).await
    }
}
