//! libp2p-backed node.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use ark_net_bootstrap::PeerDescriptor;
use ark_net_reachability::AddressSource;
use ark_repo::{RepoError, Repository};
use ark_tasks::LifetimeContext;
use async_trait::async_trait;
use libp2p::{Multiaddr, PeerId, Swarm, SwarmBuilder, identity::Keypair, noise, tcp, yamux};
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
    ArkBehaviour, NodeClient, NodeControl, NodeError, NodeFactory, RequestError,
    event_loop::EventLoop, relay::relay_listen_addr,
};

/// Idle connections are kept open this long.
const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

const COMMAND_CHANNEL_SIZE: usize = 64;

/// Builds [`ArkNode`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwarmNodeFactory;

#[async_trait]
impl NodeFactory for SwarmNodeFactory {
    type Node = ArkNode;

    async fn build(&self, repo: Repository, lifetime: LifetimeContext) -> Result<ArkNode, NodeError> {
        ArkNode::start(repo, lifetime)
    }
}

/// A running node.
///
/// The swarm and the repository live in the event loop task; this is the
/// handle to it.
#[derive(Debug)]
pub struct ArkNode {
    peer_id: PeerId,
    repo_path: PathBuf,
    datastore_root: PathBuf,
    client: NodeClient,
    lifetime: LifetimeContext,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ArkNode {
    /// Build the swarm, start listening and spawn the event loop.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(repo: Repository, lifetime: LifetimeContext) -> Result<Self, NodeError> {
        let config = repo.config();
        let listen_addrs = parse_addrs(&config.addresses.swarm)?;
        let announce_addrs = parse_addrs(&config.addresses.announce)?;
        let reprovide_interval = config.reprovider_interval()?;

        let peer_id = repo.peer_id();
        let repo_path = repo.path().to_path_buf();
        let datastore_root = repo.datastore_root();

        let mut swarm = build_swarm(repo.keypair().clone(), reprovide_interval)?;
        start_listening(&mut swarm, &listen_addrs)?;

        for addr in announce_addrs {
            if let Some(circuit) = relay_listen_addr(&addr) {
                swarm
                    .listen_on(circuit.clone())
                    .map_err(|e| NodeError::Construction(format!("relay listener {circuit}: {e}")))?;
                info!(%circuit, "Listening through relay");
            }
            info!(%addr, "Announcing address");
            swarm.add_external_address(addr);
        }

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let task = tokio::spawn(EventLoop::new(swarm, rx, lifetime.clone(), repo).run());

        info!(%peer_id, "Node started");

        Ok(Self {
            peer_id,
            repo_path,
            datastore_root,
            client: NodeClient::new(tx, lifetime.clone()),
            lifetime,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn lifetime(&self) -> &LifetimeContext {
        &self.lifetime
    }

    pub async fn connected_peers(&self) -> Result<Vec<PeerId>, RequestError> {
        self.client.connected_peers().await
    }
}

#[async_trait]
impl AddressSource for ArkNode {
    type Error = RequestError;

    async fn observed_addresses(&self) -> Result<Vec<Multiaddr>, RequestError> {
        self.client.observed_addresses().await
    }
}

#[async_trait]
impl NodeControl for ArkNode {
    type Dialer = NodeClient;

    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn storage_usage(&self) -> Result<u64, RepoError> {
        ark_repo::storage_usage(&self.datastore_root)
    }

    fn dialer(&self) -> NodeClient {
        self.client.clone()
    }

    async fn add_peering(&self, peer: PeerDescriptor) -> Result<(), RequestError> {
        self.client.add_peering(peer).await
    }

    async fn start_peering(&self) -> Result<(), RequestError> {
        self.client.start_peering().await
    }

    async fn shutdown(&self) {
        self.lifetime.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(peer_id = %self.peer_id, error = %e, "Node event loop panicked");
        }
    }
}

fn build_swarm(keypair: Keypair, reprovide_interval: Duration) -> Result<Swarm<ArkBehaviour>, NodeError> {
    let swarm = SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
        .map_err(construction("tcp transport"))?
        .with_dns()
        .map_err(construction("dns transport"))?
        .with_relay_client(noise::Config::new, yamux::Config::default)
        .map_err(construction("relay client transport"))?
        .with_behaviour(|keypair, relay_client| {
            ArkBehaviour::new(keypair, relay_client, reprovide_interval)
        })
        .map_err(construction("behaviour"))?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT))
        .build();

    Ok(swarm)
}

/// Listen on every address that can be bound. Fails only if none can.
fn start_listening(swarm: &mut Swarm<ArkBehaviour>, addrs: &[Multiaddr]) -> Result<(), NodeError> {
    let mut listening = 0;
    for addr in addrs {
        match swarm.listen_on(addr.clone()) {
            Ok(_) => {
                info!(%addr, "Listening on address");
                listening += 1;
            }
            Err(e) => warn!(%addr, %e, "Failed to listen on address"),
        }
    }

    if listening == 0 {
        return Err(NodeError::Construction(
            "none of the configured swarm addresses could be bound".to_string(),
        ));
    }
    Ok(())
}

fn parse_addrs(addrs: &[String]) -> Result<Vec<Multiaddr>, NodeError> {
    addrs
        .iter()
        .map(|addr| {
            addr.parse().map_err(|source| NodeError::InvalidAddress {
                addr: addr.clone(),
                source,
            })
        })
        .collect()
}

fn construction<E: std::fmt::Display>(stage: &'static str) -> impl FnOnce(E) -> NodeError {
    move |e| NodeError::Construction(format!("{stage}: {e}"))
}
