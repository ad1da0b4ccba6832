//! Network behaviour composed for the node.

use std::time::Duration;

use libp2p::{StreamProtocol, identify, identity::Keypair, kad, ping, relay, swarm::NetworkBehaviour};

/// Kademlia protocol of the public content-routing DHT.
pub const KAD_PROTOCOL: StreamProtocol = StreamProtocol::new("/ipfs/kad/1.0.0");

/// Identify protocol version advertised to peers.
pub const IDENTIFY_PROTOCOL_VERSION: &str = "ipfs/0.1.0";

#[derive(NetworkBehaviour)]
pub struct ArkBehaviour {
    pub identify: identify::Behaviour,
    pub ping: ping::Behaviour,
    pub kademlia: kad::Behaviour<kad::store::MemoryStore>,
    pub relay_client: relay::client::Behaviour,
}

impl ArkBehaviour {
    /// Kademlia always runs in server mode; provider records are republished
    /// every `reprovide_interval`.
    pub fn new(
        keypair: &Keypair,
        relay_client: relay::client::Behaviour,
        reprovide_interval: Duration,
    ) -> Self {
        let peer_id = keypair.public().to_peer_id();

        let identify = identify::Behaviour::new(
            identify::Config::new(IDENTIFY_PROTOCOL_VERSION.to_string(), keypair.public())
                .with_agent_version(ark_node_core::version::USER_AGENT.to_string()),
        );

        let mut kad_config = kad::Config::new(KAD_PROTOCOL);
        kad_config.set_provider_publication_interval(Some(reprovide_interval));
        let mut kademlia = kad::Behaviour::with_config(
            peer_id,
            kad::store::MemoryStore::new(peer_id),
            kad_config,
        );
        kademlia.set_mode(Some(kad::Mode::Server));

        Self {
            identify,
            ping: ping::Behaviour::new(ping::Config::new()),
            kademlia,
            relay_client,
        }
    }
}
