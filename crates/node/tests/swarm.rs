//! Loopback tests against real swarm nodes.

use std::{path::Path, time::Duration};

use ark_net_bootstrap::{Dialer, PeerDescriptor};
use ark_net_reachability::{AddressSource, Reachability, classify};
use ark_node::{ArkNode, NodeControl, NodeFactory, RelayTarget, RequestError, SwarmNodeFactory};
use ark_repo::{InitOptions, Repository};
use ark_tasks::LifetimeContext;
use assert_matches::assert_matches;
use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};

fn loopback_options() -> InitOptions {
    InitOptions {
        swarm_addrs: Some(vec!["/ip4/127.0.0.1/tcp/0".to_string()]),
        bootstrap: Some(Vec::new()),
    }
}

async fn start_node(path: &Path) -> ArkNode {
    let repo = match Repository::open(path) {
        Ok(repo) => repo,
        Err(_) => Repository::create(path, &loopback_options()).unwrap(),
    };
    SwarmNodeFactory.build(repo, LifetimeContext::new()).await.unwrap()
}

/// Polls until the node reports at least one address.
async fn wait_for_addresses(node: &ArkNode) -> Vec<Multiaddr> {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let addrs = node.observed_addresses().await.unwrap();
            if !addrs.is_empty() {
                return addrs;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_loopback_listener_is_nat_bound() {
    let dir = tempfile::tempdir().unwrap();
    let node = start_node(dir.path()).await;

    let addrs = wait_for_addresses(&node).await;
    assert!(addrs.iter().all(|a| a.to_string().starts_with("/ip4/127.0.0.1/tcp/")));
    assert_eq!(classify(&addrs), Reachability::NatBound);

    node.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_releases_repository() {
    let dir = tempfile::tempdir().unwrap();
    let node = start_node(dir.path()).await;
    let peer_id = node.peer_id();
    assert_eq!(node.identity(), peer_id.to_base58());
    assert_eq!(node.storage_usage().unwrap(), 0);

    node.shutdown().await;
    // A second call is a no-op
    node.shutdown().await;

    let repo = Repository::open(dir.path()).unwrap();
    assert_eq!(repo.peer_id(), peer_id);
}

#[tokio::test]
async fn test_requests_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let node = start_node(dir.path()).await;

    node.shutdown().await;

    assert_matches!(node.observed_addresses().await, Err(RequestError::Cancelled));
}

#[tokio::test]
async fn test_dial_between_nodes() {
    let a_dir = tempfile::tempdir().unwrap();
    let b_dir = tempfile::tempdir().unwrap();
    let a = start_node(a_dir.path()).await;
    let b = start_node(b_dir.path()).await;

    let b_addrs = wait_for_addresses(&b).await;
    let target = PeerDescriptor::with_addrs(b.peer_id(), b_addrs);

    let dial = tokio::time::timeout(Duration::from_secs(10), a.dialer().dial(&target)).await;
    assert_matches!(dial, Ok(Ok(())));
    assert!(a.connected_peers().await.unwrap().contains(&b.peer_id()));

    // Already connected
    assert_matches!(a.dialer().dial(&target).await, Ok(()));

    a.shutdown().await;
    b.shutdown().await;
}

#[tokio::test]
async fn test_dial_refused() {
    let dir = tempfile::tempdir().unwrap();
    let node = start_node(dir.path()).await;
    let target = PeerDescriptor::with_addrs(
        PeerId::random(),
        vec!["/ip4/127.0.0.1/tcp/1".parse().unwrap()],
    );

    let dial = tokio::time::timeout(Duration::from_secs(10), node.dialer().dial(&target)).await;
    assert_matches!(dial, Ok(Err(RequestError::Dial(_))));

    node.shutdown().await;
}

#[tokio::test]
async fn test_announce_addresses_not_probed() {
    let dir = tempfile::tempdir().unwrap();
    let own = Repository::create(dir.path(), &loopback_options()).unwrap().peer_id();
    let public: Multiaddr = "/ip4/203.0.113.4/tcp/4001".parse().unwrap();
    let circuit = RelayTarget::project_relay().unwrap().circuit_address(own);
    ark_repo::set_announce_addresses(dir.path(), &[public.clone(), circuit.clone()]).unwrap();

    let node = start_node(dir.path()).await;

    let addrs = wait_for_addresses(&node).await;
    assert!(!addrs.contains(&public));
    assert!(addrs.iter().all(|a| !a.iter().any(|p| matches!(p, Protocol::P2pCircuit))));
    assert_eq!(classify(&addrs), Reachability::NatBound);

    node.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_dials_to_same_peer() {
    let a_dir = tempfile::tempdir().unwrap();
    let b_dir = tempfile::tempdir().unwrap();
    let a = start_node(a_dir.path()).await;
    let b = start_node(b_dir.path()).await;

    let target = PeerDescriptor::with_addrs(b.peer_id(), wait_for_addresses(&b).await);
    let dialer = a.dialer();

    let (first, second) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(dialer.dial(&target), dialer.dial(&target)) },
    )
    .await
    .unwrap();
    assert_matches!(first, Ok(()));
    assert_matches!(second, Ok(()));
    assert!(a.connected_peers().await.unwrap().contains(&b.peer_id()));

    a.shutdown().await;
    b.shutdown().await;
}
