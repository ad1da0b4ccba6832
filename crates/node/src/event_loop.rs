//! The task that owns and drives a node's swarm.

use std::{collections::HashMap, time::Duration};

use ark_repo::Repository;
use ark_tasks::LifetimeContext;
use futures::StreamExt;
use libp2p::{
    Multiaddr, PeerId, Swarm, identify, kad,
    multiaddr::Protocol,
    relay,
    swarm::{ConnectionId, DialError, SwarmEvent, dial_opts::DialOpts},
};
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, trace, warn};

use crate::{
    ArkBehaviour, ArkBehaviourEvent, PeeringService, RequestError,
    client::Command,
};

/// How often peering peers are checked for a due redial.
const PEERING_TICK: Duration = Duration::from_secs(1);

type DialReply = oneshot::Sender<Result<(), RequestError>>;

struct PendingDial {
    peer_id: PeerId,
    reply: DialReply,
}

pub(crate) struct EventLoop {
    swarm: Swarm<ArkBehaviour>,
    commands: mpsc::Receiver<Command>,
    lifetime: LifetimeContext,
    pending_dials: HashMap<ConnectionId, PendingDial>,
    /// Dials that found another dial to the same peer already in flight
    dial_waiters: HashMap<PeerId, Vec<DialReply>>,
    peering: PeeringService,
    /// Held for the lifetime of the loop so the repository stays locked.
    _repo: Repository,
}

impl EventLoop {
    pub(crate) fn new(
        swarm: Swarm<ArkBehaviour>,
        commands: mpsc::Receiver<Command>,
        lifetime: LifetimeContext,
        repo: Repository,
    ) -> Self {
        Self {
            swarm,
            commands,
            lifetime,
            pending_dials: HashMap::new(),
            dial_waiters: HashMap::new(),
            peering: PeeringService::new(),
            _repo: repo,
        }
    }

    /// Run until the lifetime is canceled or every client is dropped.
    ///
    /// The swarm, and with it every listener and connection, is dropped on
    /// return.
    pub(crate) async fn run(mut self) {
        let lifetime = self.lifetime.clone();
        let mut peering_tick = tokio::time::interval(PEERING_TICK);
        peering_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = lifetime.cancelled() => {
                    debug!("Node lifetime cancelled");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        debug!("All node clients dropped");
                        break;
                    }
                },
                event = self.swarm.select_next_some() => self.on_swarm_event(event),
                _ = peering_tick.tick() => self.redial_peering_peers(),
            }
        }

        for (_, dial) in self.pending_dials.drain() {
            let _ = dial.reply.send(Err(RequestError::Cancelled));
        }
        for reply in self.dial_waiters.drain().flat_map(|(_, replies)| replies) {
            let _ = reply.send(Err(RequestError::Cancelled));
        }

        info!(peer_id = %self.swarm.local_peer_id(), "Node stopped");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Dial { peer, reply } => {
                let peer_id = peer.peer_id();
                if self.swarm.is_connected(&peer_id) {
                    let _ = reply.send(Ok(()));
                    return;
                }

                let opts = DialOpts::peer_id(peer_id)
                    .addresses(peer.addrs().to_vec())
                    .build();
                let connection_id = opts.connection_id();

                match self.swarm.dial(opts) {
                    Ok(()) => {
                        trace!(%peer_id, ?connection_id, "Dial started");
                        self.pending_dials
                            .insert(connection_id, PendingDial { peer_id, reply });
                    }
                    Err(DialError::DialPeerConditionFalse(_)) => {
                        trace!(%peer_id, "Dial already in flight, waiting on it");
                        self.dial_waiters.entry(peer_id).or_default().push(reply);
                    }
                    Err(e) => {
                        let _ = reply.send(Err(RequestError::Dial(e.to_string())));
                    }
                }
            }
            Command::ObservedAddresses { reply } => {
                let _ = reply.send(self.observed_addresses());
            }
            Command::ConnectedPeers { reply } => {
                let _ = reply.send(self.swarm.connected_peers().copied().collect());
            }
            Command::AddPeering { peer, reply } => {
                self.peering.add_peer(peer, Instant::now());
                let _ = reply.send(());
            }
            Command::StartPeering { reply } => {
                info!(peers = self.peering.len(), "Starting peering");
                self.peering.start(Instant::now());
                self.redial_peering_peers();
                let _ = reply.send(());
            }
        }
    }

    fn observed_addresses(&self) -> Vec<Multiaddr> {
        local_addresses(self.swarm.listeners())
    }

    fn resolve_waiters(&mut self, peer_id: &PeerId, result: Result<(), RequestError>) {
        for reply in self.dial_waiters.remove(peer_id).into_iter().flatten() {
            let _ = reply.send(result.clone());
        }
    }

    fn redial_peering_peers(&mut self) {
        let now = Instant::now();
        for peer in self.peering.due(now) {
            let peer_id = peer.peer_id();
            if self.swarm.is_connected(&peer_id) {
                self.peering.on_connected(&peer_id);
                continue;
            }

            debug!(%peer_id, "Dialing peering peer");
            let opts = DialOpts::peer_id(peer_id)
                .addresses(peer.addrs().to_vec())
                .build();
            if let Err(e) = self.swarm.dial(opts) {
                debug!(%peer_id, error = %e, "Peering dial rejected");
                self.peering.on_dial_failed(&peer_id, now);
            }
        }
    }

    fn on_swarm_event(&mut self, event: SwarmEvent<ArkBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "New listen address");
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                info!(%address, "Expired listen address");
            }
            SwarmEvent::ListenerClosed { addresses, reason, .. } => {
                if let Err(e) = reason {
                    warn!(?addresses, error = %e, "Listener closed");
                }
            }
            SwarmEvent::ExternalAddrConfirmed { address } => {
                info!(%address, "External address confirmed");
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                connection_id,
                endpoint,
                num_established,
                ..
            } => {
                debug!(
                    %peer_id,
                    endpoint = %endpoint.get_remote_address(),
                    num_established,
                    "Connection established"
                );
                if let Some(dial) = self.pending_dials.remove(&connection_id) {
                    let _ = dial.reply.send(Ok(()));
                }
                self.resolve_waiters(&peer_id, Ok(()));
                self.peering.on_connected(&peer_id);
            }
            SwarmEvent::OutgoingConnectionError {
                connection_id,
                peer_id,
                error,
            } => {
                if let Some(dial) = self.pending_dials.remove(&connection_id) {
                    debug!(peer_id = %dial.peer_id, %error, "Dial failed");
                    let _ = dial.reply.send(Err(RequestError::Dial(error.to_string())));
                }
                if let Some(peer_id) = peer_id {
                    let still_dialing = self.pending_dials.values().any(|d| d.peer_id == peer_id);
                    if !still_dialing && !self.swarm.is_connected(&peer_id) {
                        self.resolve_waiters(&peer_id, Err(RequestError::Dial(error.to_string())));
                    }
                    self.peering.on_dial_failed(&peer_id, Instant::now());
                }
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                cause,
                num_established,
                ..
            } => {
                debug!(%peer_id, num_established, cause = ?cause, "Connection closed");
                if num_established == 0 {
                    self.peering.on_disconnected(&peer_id, Instant::now());
                }
            }
            SwarmEvent::Behaviour(event) => self.on_behaviour_event(event),
            _ => {}
        }
    }

    fn on_behaviour_event(&mut self, event: ArkBehaviourEvent) {
        match event {
            ArkBehaviourEvent::Identify(identify::Event::Received { peer_id, info, .. }) => {
                trace!(%peer_id, agent = %info.agent_version, "Identified peer");
                let kademlia = &mut self.swarm.behaviour_mut().kademlia;
                for addr in info.listen_addrs {
                    let _ = kademlia.add_address(&peer_id, addr);
                }
            }
            ArkBehaviourEvent::Kademlia(kad::Event::RoutingUpdated { peer, is_new_peer, .. }) => {
                trace!(%peer, is_new_peer, "Routing table updated");
            }
            ArkBehaviourEvent::RelayClient(relay::client::Event::ReservationReqAccepted {
                relay_peer_id,
                renewal,
                ..
            }) => {
                info!(%relay_peer_id, renewal, "Relay reservation accepted");
            }
            ArkBehaviourEvent::RelayClient(event) => {
                debug!(?event, "Relay client event");
            }
            _ => {}
        }
    }
}

/// Locally bound addresses among `listeners`.
///
/// Relay circuit listeners are reached through another peer, so they say
/// nothing about this host's own reachability.
fn local_addresses<'a>(listeners: impl IntoIterator<Item = &'a Multiaddr>) -> Vec<Multiaddr> {
    listeners
        .into_iter()
        .filter(|addr| !addr.iter().any(|p| matches!(p, Protocol::P2pCircuit)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_addresses_skip_circuits() {
        let tcp: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();
        let circuit: Multiaddr = format!("{}/p2p-circuit", crate::PROJECT_RELAY).parse().unwrap();

        assert_eq!(local_addresses([&tcp, &circuit]), vec![tcp]);
    }
}
