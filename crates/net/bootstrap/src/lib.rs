//! Network entry through a fixed set of introduction peers.
//!
//! Introduction peers are given as textual multiaddrs ending in
//! `/p2p/<peer id>`. Addresses naming the same peer are merged into a single
//! [`PeerDescriptor`], and every distinct peer is dialed concurrently. A
//! failed dial is logged and reported, never fatal.
//!
//! `/dnsaddr/` and `/dns4/` addresses are passed to the dialer unresolved;
//! resolution is left to the transport.

mod connect;
mod constants;
mod descriptor;

pub use connect::{BootstrapReport, DialFailure, Dialer, PeerBootstrapper, connect};
pub use constants::INTRODUCTION_PEERS;
pub use descriptor::{AddressParseError, PeerDescriptor, parse_p2p_addr, peer_descriptors};
