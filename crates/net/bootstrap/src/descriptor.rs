//! Peer descriptors and address parsing.

use std::collections::HashMap;

use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AddressParseError {
    #[error("invalid multiaddr {addr:?}: {source}")]
    Multiaddr {
        addr: String,
        #[source]
        source: libp2p::multiaddr::Error,
    },

    #[error("multiaddr {0:?} does not end in /p2p/<peer id>")]
    MissingPeerId(String),
}

/// A peer identity and the addresses it can be dialed on.
///
/// Addresses are unique and kept in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDescriptor {
    peer_id: PeerId,
    addrs: Vec<Multiaddr>,
}

impl PeerDescriptor {
    pub fn new(peer_id: PeerId) -> Self {
        Self { peer_id, addrs: Vec::new() }
    }

    pub fn with_addrs(peer_id: PeerId, addrs: impl IntoIterator<Item = Multiaddr>) -> Self {
        let mut descriptor = Self::new(peer_id);
        for addr in addrs {
            descriptor.add_addr(addr);
        }
        descriptor
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn addrs(&self) -> &[Multiaddr] {
        &self.addrs
    }

    /// Add `addr` unless already present. Returns whether it was added.
    pub fn add_addr(&mut self, addr: Multiaddr) -> bool {
        if self.addrs.contains(&addr) {
            return false;
        }
        self.addrs.push(addr);
        true
    }
}

/// Split `/<transport...>/p2p/<id>` into its peer id and transport address.
///
/// The legacy `/ipfs/<id>` spelling is accepted. The transport part may be
/// empty for a bare `/p2p/<id>`.
pub fn parse_p2p_addr(s: &str) -> Result<(PeerId, Multiaddr), AddressParseError> {
    let normalized = s.replace("/ipfs/", "/p2p/");
    let mut addr: Multiaddr = normalized.parse().map_err(|source| AddressParseError::Multiaddr {
        addr: s.to_string(),
        source,
    })?;

    match addr.pop() {
        Some(Protocol::P2p(peer_id)) => Ok((peer_id, addr)),
        _ => Err(AddressParseError::MissingPeerId(s.to_string())),
    }
}

/// Group textual peer addresses into one descriptor per identity.
///
/// Descriptors are ordered by the first appearance of their identity.
/// Any malformed address fails the whole batch.
pub fn peer_descriptors<I, S>(addrs: I) -> Result<Vec<PeerDescriptor>, AddressParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut descriptors: Vec<PeerDescriptor> = Vec::new();
    let mut index: HashMap<PeerId, usize> = HashMap::new();

    for s in addrs {
        let (peer_id, addr) = parse_p2p_addr(s.as_ref())?;

        let slot = *index.entry(peer_id).or_insert_with(|| {
            descriptors.push(PeerDescriptor::new(peer_id));
            descriptors.len() - 1
        });

        if !addr.is_empty()
            && let Some(descriptor) = descriptors.get_mut(slot)
        {
            descriptor.add_addr(addr);
        }
    }

    Ok(descriptors)
}
