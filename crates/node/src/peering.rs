//! Standing connections to selected peers.
//!
//! A peering peer is redialed whenever it is not connected, waiting an
//! exponentially growing backoff between attempts. The service is a plain
//! state machine; the node event loop feeds it connection events and asks it
//! which peers are due for a dial.

use std::{collections::HashMap, time::Duration};

use ark_net_bootstrap::PeerDescriptor;
use libp2p::PeerId;
use tokio::time::Instant;
use tracing::debug;

/// Delay before the first redial of a lost peer.
pub const PEERING_INITIAL_BACKOFF: Duration = Duration::from_secs(5);

/// Upper bound for the redial delay.
pub const PEERING_MAX_BACKOFF: Duration = Duration::from_secs(10 * 60);

#[derive(Debug)]
struct PeerState {
    descriptor: PeerDescriptor,
    connected: bool,
    backoff: Duration,
    /// `None` while connected or while a dial is in flight
    next_dial: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct PeeringService {
    peers: HashMap<PeerId, PeerState>,
    started: bool,
}

impl PeeringService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Register a peer, merging addresses if it is already known.
    pub fn add_peer(&mut self, descriptor: PeerDescriptor, now: Instant) {
        let peer_id = descriptor.peer_id();

        if let Some(state) = self.peers.get_mut(&peer_id) {
            for addr in descriptor.addrs() {
                state.descriptor.add_addr(addr.clone());
            }
            return;
        }

        debug!(%peer_id, addrs = descriptor.addrs().len(), "Added peering peer");
        self.peers.insert(
            peer_id,
            PeerState {
                descriptor,
                connected: false,
                backoff: PEERING_INITIAL_BACKOFF,
                next_dial: self.started.then_some(now),
            },
        );
    }

    /// Begin maintaining connections. Disconnected peers become due at once.
    pub fn start(&mut self, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;

        for state in self.peers.values_mut().filter(|s| !s.connected) {
            state.next_dial = Some(now);
        }
    }

    pub fn on_connected(&mut self, peer_id: &PeerId) {
        if let Some(state) = self.peers.get_mut(peer_id) {
            state.connected = true;
            state.backoff = PEERING_INITIAL_BACKOFF;
            state.next_dial = None;
        }
    }

    /// The last connection to `peer_id` closed.
    pub fn on_disconnected(&mut self, peer_id: &PeerId, now: Instant) {
        let started = self.started;
        if let Some(state) = self.peers.get_mut(peer_id) {
            state.connected = false;
            if started {
                state.next_dial = Some(now + state.backoff);
                debug!(%peer_id, backoff = ?state.backoff, "Peering peer disconnected");
            }
        }
    }

    /// A dial to `peer_id` failed. Doubles the backoff up to the cap.
    pub fn on_dial_failed(&mut self, peer_id: &PeerId, now: Instant) {
        let started = self.started;
        if let Some(state) = self.peers.get_mut(peer_id)
            && started
            && !state.connected
        {
            state.next_dial = Some(now + state.backoff);
            debug!(%peer_id, backoff = ?state.backoff, "Peering dial failed");
            state.backoff = (state.backoff * 2).min(PEERING_MAX_BACKOFF);
        }
    }

    /// Peers whose redial time has come. Each is marked as dialing until the
    /// next connection event for it.
    pub fn due(&mut self, now: Instant) -> Vec<PeerDescriptor> {
        if !self.started {
            return Vec::new();
        }

        self.peers
            .values_mut()
            .filter(|s| !s.connected && s.next_dial.is_some_and(|at| at <= now))
            .map(|s| {
                s.next_dial = None;
                s.descriptor.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> PeerDescriptor {
        PeerDescriptor::with_addrs(
            PeerId::random(),
            ["/dns4/link.arken.io/tcp/4001".parse().unwrap()],
        )
    }

    #[test]
    fn test_nothing_due_before_start() {
        let now = Instant::now();
        let mut service = PeeringService::new();
        service.add_peer(descriptor(), now);

        assert!(service.due(now + PEERING_MAX_BACKOFF).is_empty());
    }

    #[test]
    fn test_due_immediately_after_start() {
        let now = Instant::now();
        let mut service = PeeringService::new();
        let peer = descriptor();
        service.add_peer(peer.clone(), now);
        service.start(now);

        assert_eq!(service.due(now), vec![peer]);
        // In flight until a connection event arrives
        assert!(service.due(now + PEERING_MAX_BACKOFF).is_empty());
    }

    #[test]
    fn test_add_after_start_is_due() {
        let now = Instant::now();
        let mut service = PeeringService::new();
        service.start(now);
        service.add_peer(descriptor(), now);

        assert_eq!(service.due(now).len(), 1);
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut now = Instant::now();
        let mut service = PeeringService::new();
        let peer = descriptor();
        let id = peer.peer_id();
        service.add_peer(peer, now);
        service.start(now);

        let mut expected = PEERING_INITIAL_BACKOFF;
        for _ in 0..12 {
            assert_eq!(service.due(now).len(), 1);
            service.on_dial_failed(&id, now);

            assert!(service.due(now + expected - Duration::from_millis(1)).is_empty());
            now += expected;
            expected = (expected * 2).min(PEERING_MAX_BACKOFF);
        }
        assert_eq!(expected, PEERING_MAX_BACKOFF);
    }

    #[test]
    fn test_connect_resets_backoff() {
        let now = Instant::now();
        let mut service = PeeringService::new();
        let peer = descriptor();
        let id = peer.peer_id();
        service.add_peer(peer, now);
        service.start(now);

        service.due(now);
        service.on_dial_failed(&id, now);
        service.due(now + PEERING_INITIAL_BACKOFF);
        service.on_dial_failed(&id, now + PEERING_INITIAL_BACKOFF);

        service.on_connected(&id);
        assert!(service.due(now + PEERING_MAX_BACKOFF).is_empty());

        let later = now + Duration::from_secs(60);
        service.on_disconnected(&id, later);
        assert!(service.due(later).is_empty());
        assert_eq!(service.due(later + PEERING_INITIAL_BACKOFF).len(), 1);
    }

    #[test]
    fn test_unknown_peer_events_ignored() {
        let now = Instant::now();
        let mut service = PeeringService::new();
        service.start(now);

        let stranger = PeerId::random();
        service.on_connected(&stranger);
        service.on_dial_failed(&stranger, now);
        service.on_disconnected(&stranger, now);

        assert!(service.is_empty());
        assert!(service.due(now).is_empty());
    }

    #[test]
    fn test_add_existing_merges_addresses() {
        let now = Instant::now();
        let mut service = PeeringService::new();
        let peer = descriptor();
        let extra = PeerDescriptor::with_addrs(
            peer.peer_id(),
            ["/ip4/203.0.113.9/tcp/4001".parse().unwrap()],
        );
        service.add_peer(peer, now);
        service.add_peer(extra, now);
        service.start(now);

        assert_eq!(service.len(), 1);
        assert_eq!(service.due(now)[0].addrs().len(), 2);
    }
}
