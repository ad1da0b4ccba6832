//! Reserved address ranges.

use std::net::IpAddr;

use libp2p::{Multiaddr, multiaddr::Protocol};

/// Address ranges that never make a node reachable from the public internet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedRange {
    /// 127.0.0.0/8
    Loopback,
    /// 169.254.0.0/16
    LinkLocal,
    /// RFC 1918: 10/8, 172.16/12, 192.168/16
    PrivateNetwork,
    /// 0.0.0.0
    Unspecified,
    /// Any IPv6 address
    Ipv6,
}

impl ReservedRange {
    pub const ALL: [ReservedRange; 5] = [
        Self::Loopback,
        Self::LinkLocal,
        Self::PrivateNetwork,
        Self::Unspecified,
        Self::Ipv6,
    ];

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self, ip) {
            (Self::Ipv6, IpAddr::V6(_)) => true,
            (Self::Loopback, IpAddr::V4(ip)) => ip.is_loopback(),
            (Self::LinkLocal, IpAddr::V4(ip)) => ip.is_link_local(),
            (Self::PrivateNetwork, IpAddr::V4(ip)) => ip.is_private(),
            (Self::Unspecified, IpAddr::V4(ip)) => ip.is_unspecified(),
            _ => false,
        }
    }
}

/// First IP component of a multiaddr.
pub fn extract_ip(addr: &Multiaddr) -> Option<IpAddr> {
    addr.iter().find_map(|proto| match proto {
        Protocol::Ip4(ip) => Some(IpAddr::V4(ip)),
        Protocol::Ip6(ip) => Some(IpAddr::V6(ip)),
        _ => None,
    })
}

/// The reserved range `addr` falls in, if any.
///
/// Addresses without an IP component (e.g. `/dns4/...`) match nothing.
pub fn reserved_range(addr: &Multiaddr) -> Option<ReservedRange> {
    let ip = extract_ip(addr)?;
    ReservedRange::ALL.into_iter().find(|range| range.contains(ip))
}

pub fn is_private(addr: &Multiaddr) -> bool {
    reserved_range(addr).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_of(s: &str) -> Option<ReservedRange> {
        reserved_range(&s.parse().unwrap())
    }

    #[test]
    fn test_loopback() {
        assert_eq!(range_of("/ip4/127.0.0.1/tcp/4001"), Some(ReservedRange::Loopback));
        assert_eq!(range_of("/ip4/127.255.255.254/tcp/4001"), Some(ReservedRange::Loopback));
    }

    #[test]
    fn test_link_local() {
        assert_eq!(range_of("/ip4/169.254.0.1/tcp/4001"), Some(ReservedRange::LinkLocal));
        assert_eq!(range_of("/ip4/169.254.255.255/tcp/4001"), Some(ReservedRange::LinkLocal));
    }

    #[test]
    fn test_private_networks() {
        for addr in [
            "/ip4/10.0.0.1/tcp/4001",
            "/ip4/10.255.255.255/tcp/4001",
            "/ip4/172.16.0.1/tcp/4001",
            "/ip4/172.31.255.255/tcp/4001",
            "/ip4/192.168.0.5/tcp/4001",
        ] {
            assert_eq!(range_of(addr), Some(ReservedRange::PrivateNetwork), "{addr}");
        }
    }

    #[test]
    fn test_private_network_boundaries() {
        assert_eq!(range_of("/ip4/172.15.255.255/tcp/4001"), None);
        assert_eq!(range_of("/ip4/172.32.0.0/tcp/4001"), None);
        assert_eq!(range_of("/ip4/11.0.0.1/tcp/4001"), None);
        assert_eq!(range_of("/ip4/192.169.0.1/tcp/4001"), None);
    }

    #[test]
    fn test_unspecified() {
        assert_eq!(range_of("/ip4/0.0.0.0/tcp/4001"), Some(ReservedRange::Unspecified));
    }

    #[test]
    fn test_any_ipv6_is_reserved() {
        assert_eq!(range_of("/ip6/::1/tcp/4001"), Some(ReservedRange::Ipv6));
        assert_eq!(range_of("/ip6/::/tcp/4001"), Some(ReservedRange::Ipv6));
        assert_eq!(range_of("/ip6/2001:db8::1/tcp/4001"), Some(ReservedRange::Ipv6));
        assert_eq!(range_of("/ip6/2606:4700::1111/udp/4001/quic-v1"), Some(ReservedRange::Ipv6));
    }

    #[test]
    fn test_public_ipv4() {
        assert_eq!(range_of("/ip4/203.0.113.4/tcp/4001"), None);
        assert_eq!(range_of("/ip4/8.8.8.8/udp/4001/quic-v1"), None);
    }

    #[test]
    fn test_no_ip_component() {
        assert_eq!(range_of("/dns4/link.arken.io/tcp/4001"), None);
        assert_eq!(range_of("/dnsaddr/bootstrap.libp2p.io"), None);
        assert!(!is_private(&"/dns4/localhost/tcp/4001".parse().unwrap()));
    }
}
