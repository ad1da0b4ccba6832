//! Reachability heuristic.
//!
//! After a short observation window, a node's observed addresses are sorted
//! into private and public. A node with no public address is assumed to sit
//! behind a NAT or firewall. Nothing is ever dialed back.

mod probe;
mod range;

pub use probe::{AddressSource, DEFAULT_GRACE_PERIOD, ProbeError, Reachability, classify, probe};
pub use range::{ReservedRange, extract_ip, is_private, reserved_range};
