use std::{fmt, time::Duration};

use ark_tasks::LifetimeContext;
use async_trait::async_trait;
use libp2p::Multiaddr;
use thiserror::Error;
use tracing::{debug, info};

use crate::range::reserved_range;

/// How long a fresh node is given to discover its addresses.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Outcome of a reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// At least one observed address is public.
    Reachable,
    /// Every observed address is private, or none was observed.
    NatBound,
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => f.write_str("reachable"),
            Self::NatBound => f.write_str("nat-bound"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe cancelled")]
    Cancelled,

    #[error("failed to read observed addresses: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Something that can report the addresses a node currently believes it has.
#[async_trait]
pub trait AddressSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn observed_addresses(&self) -> Result<Vec<Multiaddr>, Self::Error>;
}

/// Classify a set of observed addresses.
pub fn classify<'a>(addrs: impl IntoIterator<Item = &'a Multiaddr>) -> Reachability {
    if addrs.into_iter().any(|addr| reserved_range(addr).is_none()) {
        Reachability::Reachable
    } else {
        Reachability::NatBound
    }
}

/// Wait `grace`, then classify the addresses reported by `source`.
pub async fn probe<S>(
    source: &S,
    grace: Duration,
    lifetime: &LifetimeContext,
) -> Result<Reachability, ProbeError>
where
    S: AddressSource + ?Sized,
{
    debug!(grace = %humantime::format_duration(grace), "Waiting for address discovery");
    lifetime.sleep(grace).await.map_err(|_| ProbeError::Cancelled)?;

    let addrs = lifetime
        .run(source.observed_addresses())
        .await
        .map_err(|_| ProbeError::Cancelled)?
        .map_err(|e| ProbeError::Source(Box::new(e)))?;

    for addr in &addrs {
        debug!(%addr, range = ?reserved_range(addr), "Observed address");
    }

    let reachability = classify(&addrs);
    info!(%reachability, observed = addrs.len(), "Reachability probe complete");

    Ok(reachability)
}
