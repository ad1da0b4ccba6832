//! Concurrent bootstrap dialing.

use std::fmt;

use async_trait::async_trait;
use futures::future::join_all;
use libp2p::{PeerId, multiaddr::Protocol};
use tracing::{debug, info, warn};

use crate::{AddressParseError, PeerDescriptor, peer_descriptors};

/// Dials a peer on any of its addresses.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Error: fmt::Display + Send + Sync + 'static;

    /// Resolves once a connection is established or every address failed.
    async fn dial(&self, peer: &PeerDescriptor) -> Result<(), Self::Error>;
}

/// A dial that did not produce a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialFailure {
    pub peer_id: PeerId,
    pub error: String,
}

/// Outcome of one bootstrap batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub connected: Vec<PeerId>,
    pub failed: Vec<DialFailure>,
}

impl BootstrapReport {
    pub fn attempted(&self) -> usize {
        self.connected.len() + self.failed.len()
    }
}

/// Introduction peers grouped by identity, ready to dial.
#[derive(Debug, Clone)]
pub struct PeerBootstrapper {
    peers: Vec<PeerDescriptor>,
}

impl PeerBootstrapper {
    pub fn new(peers: Vec<PeerDescriptor>) -> Self {
        Self { peers }
    }

    /// Parse and group textual peer addresses.
    pub fn from_addrs<I, S>(addrs: I) -> Result<Self, AddressParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self::new(peer_descriptors(addrs)?))
    }

    pub fn peers(&self) -> &[PeerDescriptor] {
        &self.peers
    }

    /// Dial every peer at once and wait for all attempts to settle.
    pub async fn connect<D>(&self, dialer: &D) -> BootstrapReport
    where
        D: Dialer + ?Sized,
    {
        info!(peers = self.peers.len(), "Dialing introduction peers");

        let attempts = self.peers.iter().map(|peer| async move {
            debug!(
                peer_id = %peer.peer_id(),
                addrs = peer.addrs().len(),
                dns = peer.addrs().iter().any(is_dns_addr),
                "Dialing introduction peer"
            );
            (peer.peer_id(), dialer.dial(peer).await)
        });

        let mut report = BootstrapReport::default();
        for (peer_id, result) in join_all(attempts).await {
            match result {
                Ok(()) => {
                    debug!(%peer_id, "Connected to introduction peer");
                    report.connected.push(peer_id);
                }
                Err(e) => {
                    warn!(%peer_id, error = %e, "Failed to connect to introduction peer");
                    report.failed.push(DialFailure { peer_id, error: e.to_string() });
                }
            }
        }

        info!(
            connected = report.connected.len(),
            failed = report.failed.len(),
            "Bootstrap dialing complete"
        );
        report
    }
}

/// Parse `addrs`, then dial each distinct peer concurrently.
///
/// Only malformed input is an error; dial failures end up in the report.
pub async fn connect<D, I, S>(dialer: &D, addrs: I) -> Result<BootstrapReport, AddressParseError>
where
    D: Dialer + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let bootstrapper = PeerBootstrapper::from_addrs(addrs)?;
    Ok(bootstrapper.connect(dialer).await)
}

fn is_dns_addr(addr: &libp2p::Multiaddr) -> bool {
    addr.iter().any(|p| {
        matches!(p, Protocol::Dns(_) | Protocol::Dns4(_) | Protocol::Dns6(_) | Protocol::Dnsaddr(_))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::INTRODUCTION_PEERS;
    use assert_matches::assert_matches;
    use libp2p::Multiaddr;
    use parking_lot::Mutex;
    use std::{collections::HashSet, sync::Arc, time::Duration};
    use tokio::sync::Barrier;

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    #[derive(Default)]
    struct RecordingDialer {
        dials: Mutex<Vec<PeerDescriptor>>,
        refuse: HashSet<PeerId>,
    }

    #[async_trait]
    impl Dialer for RecordingDialer {
        type Error = Refused;

        async fn dial(&self, peer: &PeerDescriptor) -> Result<(), Refused> {
            self.dials.lock().push(peer.clone());
            if self.refuse.contains(&peer.peer_id()) { Err(Refused) } else { Ok(()) }
        }
    }

    /// Every dial blocks until all of them have started.
    struct RendezvousDialer {
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl Dialer for RendezvousDialer {
        type Error = Refused;

        async fn dial(&self, _peer: &PeerDescriptor) -> Result<(), Refused> {
            self.barrier.wait().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_one_dial_per_identity() {
        let peer = PeerId::random();
        let addrs = [
            format!("/ip4/138.201.67.219/tcp/4001/p2p/{peer}"),
            format!("/ip4/138.201.67.219/udp/4001/quic/p2p/{peer}"),
        ];
        let dialer = RecordingDialer::default();

        let report = connect(&dialer, &addrs).await.unwrap();

        let dials = dialer.dials.lock();
        assert_eq!(dials.len(), 1);
        assert_eq!(dials[0].peer_id(), peer);
        assert_eq!(
            dials[0].addrs(),
            &[
                "/ip4/138.201.67.219/tcp/4001".parse::<Multiaddr>().unwrap(),
                "/ip4/138.201.67.219/udp/4001/quic".parse::<Multiaddr>().unwrap(),
            ]
        );
        assert_eq!(report.connected, vec![peer]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_others() {
        let good = PeerId::random();
        let bad = PeerId::random();
        let addrs = [
            format!("/ip4/10.0.0.1/tcp/4001/p2p/{bad}"),
            format!("/ip4/10.0.0.2/tcp/4001/p2p/{good}"),
        ];
        let dialer = RecordingDialer {
            refuse: HashSet::from([bad]),
            ..Default::default()
        };

        let report = connect(&dialer, &addrs).await.unwrap();

        assert_eq!(report.attempted(), 2);
        assert_eq!(report.connected, vec![good]);
        assert_eq!(
            report.failed,
            vec![DialFailure { peer_id: bad, error: "connection refused".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_dials_run_concurrently() {
        let bootstrapper = PeerBootstrapper::from_addrs(INTRODUCTION_PEERS).unwrap();
        let dialer = RendezvousDialer {
            barrier: Arc::new(Barrier::new(bootstrapper.peers().len())),
        };

        let report = tokio::time::timeout(Duration::from_secs(5), bootstrapper.connect(&dialer))
            .await
            .expect("dials were serialized");

        assert_eq!(report.connected.len(), 8);
    }

    #[tokio::test]
    async fn test_malformed_input_dials_nothing() {
        let dialer = RecordingDialer::default();
        let addrs = ["/ip4/1.2.3.4/tcp/4001"];

        assert_matches!(connect(&dialer, addrs).await, Err(AddressParseError::MissingPeerId(_)));
        assert!(dialer.dials.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dialer = RecordingDialer::default();
        let report = connect(&dialer, Vec::<String>::new()).await.unwrap();

        assert_eq!(report, BootstrapReport::default());
    }
}
