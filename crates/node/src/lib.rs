//! The Ark storage node.
//!
//! [`launch::init`] runs the startup flow: open (or migrate, or create) the
//! repository, build a node, probe its reachability and, when it turns out to
//! be NAT-bound, rebuild it to announce itself through a relay. Introduction
//! peers are dialed in the background once a node is up.
//!
//! The node itself ([`ArkNode`]) is a libp2p swarm driven by a single event
//! loop task. Everything else talks to it through a [`NodeClient`].

mod behaviour;
mod client;
mod error;
mod event_loop;
pub mod launch;
mod node;
mod peering;
pub mod relay;
mod traits;

pub use behaviour::{ArkBehaviour, ArkBehaviourEvent, IDENTIFY_PROTOCOL_VERSION, KAD_PROTOCOL};
pub use client::NodeClient;
pub use error::{LaunchError, NodeError, RelayError, RequestError};
pub use launch::{LaunchConfig, Node, init};
pub use node::{ArkNode, SwarmNodeFactory};
pub use peering::{PEERING_INITIAL_BACKOFF, PEERING_MAX_BACKOFF, PeeringService};
pub use relay::{Connectivity, DEFAULT_SETTLE_PERIOD, PROJECT_RELAY, RelayReconfigurer, RelayTarget};
pub use traits::{NodeControl, NodeFactory};
