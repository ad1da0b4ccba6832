//! Switching a NAT-bound node to announce itself through a relay.

use std::time::Duration;

use ark_net_bootstrap::{AddressParseError, PeerDescriptor, parse_p2p_addr};
use ark_repo::Repository;
use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};
use tracing::info;

use crate::{Node, NodeControl, NodeFactory, RelayError};

/// Time given to the OS to release the old node's ports before rebinding.
pub const DEFAULT_SETTLE_PERIOD: Duration = Duration::from_secs(30);

/// The project bootstrap node, used as relay by NAT-bound nodes.
pub const PROJECT_RELAY: &str =
    "/dns4/link.arken.io/tcp/4001/p2p/QmP8krSfWWHLNL2eah6E1hr6TzoaGMEVRw2Fooy5og1Wpj";

/// A relay peer and the address it is reached on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTarget {
    peer_id: PeerId,
    addr: Multiaddr,
}

impl RelayTarget {
    pub fn new(peer_id: PeerId, addr: Multiaddr) -> Self {
        Self { peer_id, addr }
    }

    /// Parse `/<transport...>/p2p/<relay id>`.
    pub fn parse(s: &str) -> Result<Self, AddressParseError> {
        let (peer_id, addr) = parse_p2p_addr(s)?;
        Ok(Self { peer_id, addr })
    }

    pub fn project_relay() -> Result<Self, AddressParseError> {
        Self::parse(PROJECT_RELAY)
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn addr(&self) -> &Multiaddr {
        &self.addr
    }

    /// `<relay addr>/p2p/<relay>/p2p-circuit/p2p/<own>`
    pub fn circuit_address(&self, own: PeerId) -> Multiaddr {
        self.addr
            .clone()
            .with(Protocol::P2p(self.peer_id))
            .with(Protocol::P2pCircuit)
            .with(Protocol::P2p(own))
    }

    pub fn descriptor(&self) -> PeerDescriptor {
        PeerDescriptor::with_addrs(self.peer_id, [self.addr.clone()])
    }
}

/// How a node is reached by other peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    /// On its own observed addresses.
    Direct,
    /// Through a circuit on the given relay.
    Relayed(RelayTarget),
}

impl Connectivity {
    pub fn is_relayed(&self) -> bool {
        matches!(self, Self::Relayed(_))
    }
}

/// The address a relay client listens on for a circuit announce address:
/// everything up to and including `/p2p-circuit`.
pub(crate) fn relay_listen_addr(announce: &Multiaddr) -> Option<Multiaddr> {
    let mut listen = Multiaddr::empty();
    for proto in announce.iter() {
        let is_circuit = matches!(proto, Protocol::P2pCircuit);
        listen.push(proto);
        if is_circuit {
            return Some(listen);
        }
    }
    None
}

/// Performs the one-way `Direct -> Relayed` transition.
#[derive(Debug)]
pub struct RelayReconfigurer<'a, F> {
    factory: &'a F,
    relay: RelayTarget,
    settle: Duration,
}

impl<'a, F: NodeFactory> RelayReconfigurer<'a, F> {
    pub fn new(factory: &'a F, relay: RelayTarget) -> Self {
        Self { factory, relay, settle: DEFAULT_SETTLE_PERIOD }
    }

    pub fn with_settle_period(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Replace `node`'s current instance with one announcing a relay circuit.
    ///
    /// In order: stop the current instance, rewrite the announce addresses,
    /// wait the settle period, rebuild from the repository, then register and
    /// start peering with the relay. Any failure leaves the node unusable.
    pub async fn enter_relay_mode(&self, node: &mut Node<F::Node>) -> Result<(), RelayError> {
        if node.connectivity.is_relayed() {
            return Err(RelayError::AlreadyRelayed);
        }

        let own = node.current.peer_id();
        let circuit = self.relay.circuit_address(own);
        info!(relay = %self.relay.peer_id(), %circuit, "Switching to relay mode");

        node.current.shutdown().await;

        ark_repo::set_announce_addresses(&node.repo_path, &[circuit])?;

        node.lifetime
            .sleep(self.settle)
            .await
            .map_err(|_| RelayError::Cancelled)?;

        let repo = Repository::open(&node.repo_path)?;
        let fresh = self.factory.build(repo, node.lifetime.child()).await?;
        node.current = fresh;
        node.connectivity = Connectivity::Relayed(self.relay.clone());

        node.current.add_peering(self.relay.descriptor()).await?;
        node.current.start_peering().await?;

        info!(relay = %self.relay.peer_id(), "Relay mode active");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_relay() {
        let relay = RelayTarget::project_relay().unwrap();

        assert_eq!(relay.peer_id().to_base58(), "QmP8krSfWWHLNL2eah6E1hr6TzoaGMEVRw2Fooy5og1Wpj");
        assert_eq!(relay.addr(), &"/dns4/link.arken.io/tcp/4001".parse::<Multiaddr>().unwrap());
    }

    #[test]
    fn test_circuit_address_embeds_own_identity() {
        let relay = RelayTarget::project_relay().unwrap();
        let own = PeerId::random();

        let circuit = relay.circuit_address(own);
        assert_eq!(
            circuit.to_string(),
            format!("{PROJECT_RELAY}/p2p-circuit/p2p/{own}")
        );
    }

    #[test]
    fn test_relay_listen_addr() {
        let relay = RelayTarget::project_relay().unwrap();
        let circuit = relay.circuit_address(PeerId::random());

        assert_eq!(
            relay_listen_addr(&circuit).unwrap().to_string(),
            format!("{PROJECT_RELAY}/p2p-circuit")
        );
        assert_eq!(relay_listen_addr(relay.addr()), None);
    }

    #[test]
    fn test_descriptor() {
        let relay = RelayTarget::project_relay().unwrap();
        let descriptor = relay.descriptor();

        assert_eq!(descriptor.peer_id(), relay.peer_id());
        assert_eq!(descriptor.addrs(), std::slice::from_ref(relay.addr()));
    }
}
