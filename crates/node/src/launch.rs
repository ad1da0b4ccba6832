//! Node startup flow.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use ark_net_bootstrap::{AddressParseError, BootstrapReport, Dialer, INTRODUCTION_PEERS};
use ark_net_reachability::{DEFAULT_GRACE_PERIOD, Reachability, probe};
use ark_repo::{InitOptions, RepoError, Repository};
use ark_tasks::LifetimeContext;
use libp2p::PeerId;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    LaunchError, NodeControl, NodeFactory,
    relay::{Connectivity, DEFAULT_SETTLE_PERIOD, RelayReconfigurer, RelayTarget},
};

/// Startup parameters.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub repo_path: PathBuf,
    /// Probe reachability and switch to relay mode if NAT-bound
    pub network: bool,
    /// Used if the repository has to be created
    pub init_options: InitOptions,
    pub relay: RelayTarget,
    pub grace_period: Duration,
    pub settle_period: Duration,
    pub introduction_peers: Vec<String>,
}

impl LaunchConfig {
    pub fn new(repo_path: impl Into<PathBuf>, network: bool) -> Result<Self, AddressParseError> {
        Ok(Self {
            repo_path: repo_path.into(),
            network,
            init_options: InitOptions::default(),
            relay: RelayTarget::project_relay()?,
            grace_period: DEFAULT_GRACE_PERIOD,
            settle_period: DEFAULT_SETTLE_PERIOD,
            introduction_peers: INTRODUCTION_PEERS.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub fn with_init_options(mut self, options: InitOptions) -> Self {
        self.init_options = options;
        self
    }

    pub fn with_relay(mut self, relay: RelayTarget) -> Self {
        self.relay = relay;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_settle_period(mut self, settle: Duration) -> Self {
        self.settle_period = settle;
        self
    }

    pub fn with_introduction_peers(mut self, peers: Vec<String>) -> Self {
        self.introduction_peers = peers;
        self
    }
}

/// A started node: the current instance, how it is reached, and the
/// process-wide lifetime every instance is scoped under.
#[derive(Debug)]
pub struct Node<N> {
    pub(crate) current: N,
    pub(crate) connectivity: Connectivity,
    pub(crate) lifetime: LifetimeContext,
    pub(crate) repo_path: PathBuf,
    pub(crate) bootstrap: Option<JoinHandle<Option<BootstrapReport>>>,
}

impl<N: NodeControl> Node<N> {
    pub(crate) fn new(current: N, lifetime: LifetimeContext, repo_path: PathBuf) -> Self {
        Self {
            current,
            connectivity: Connectivity::Direct,
            lifetime,
            repo_path,
            bootstrap: None,
        }
    }

    /// The current node instance.
    pub fn handle(&self) -> &N {
        &self.current
    }

    pub fn peer_id(&self) -> PeerId {
        self.current.peer_id()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn lifetime(&self) -> &LifetimeContext {
        &self.lifetime
    }

    /// Wait for the background bootstrap batch. `None` if it was abandoned,
    /// canceled, or already awaited.
    pub async fn wait_for_bootstrap(&mut self) -> Option<BootstrapReport> {
        let task = self.bootstrap.take()?;
        match task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Bootstrap task failed");
                None
            }
        }
    }

    /// Cancel everything and wait for the current instance to stop.
    pub async fn shutdown(mut self) {
        self.lifetime.cancel();
        self.current.shutdown().await;
        if let Some(task) = self.bootstrap.take() {
            let _ = task.await;
        }
        info!(peer_id = %self.current.peer_id(), "Node shut down");
    }
}

/// Open the repository at `path`, migrating or creating it as needed.
pub fn open_or_create(path: &Path, options: &InitOptions) -> Result<Repository, LaunchError> {
    match Repository::open(path) {
        Ok(repo) => Ok(repo),
        Err(RepoError::NotInitialized(_)) => {
            info!(path = %path.display(), "No repository found, creating one");
            Ok(Repository::create(path, options)?)
        }
        Err(RepoError::NeedsMigration { found, supported, .. }) => {
            info!(path = %path.display(), found, supported, "Repository needs migration");
            ark_repo::migrate(path)?;
            Ok(Repository::open(path)?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the startup flow.
///
/// Returns once a node is up and, in network mode, reachable either directly
/// or through the relay. Introduction peers are dialed in the background.
pub async fn init<F: NodeFactory>(
    factory: &F,
    config: LaunchConfig,
) -> Result<Node<F::Node>, LaunchError> {
    let lifetime = LifetimeContext::new();

    let repo = open_or_create(&config.repo_path, &config.init_options)?;
    let current = factory.build(repo, lifetime.child()).await?;
    let mut node = Node::new(current, lifetime, config.repo_path.clone());

    if let Err(e) = establish_reachability(factory, &config, &mut node).await {
        node.shutdown().await;
        return Err(e);
    }

    node.bootstrap = Some(spawn_bootstrap(
        node.current.dialer(),
        config.introduction_peers,
        node.lifetime.clone(),
    ));

    info!(
        peer_id = %node.peer_id(),
        relayed = node.connectivity.is_relayed(),
        "Node ready"
    );
    Ok(node)
}

async fn establish_reachability<F: NodeFactory>(
    factory: &F,
    config: &LaunchConfig,
    node: &mut Node<F::Node>,
) -> Result<(), LaunchError> {
    if !config.network {
        debug!("Network mode off, skipping reachability probe");
        return Ok(());
    }

    let reachability = probe(&node.current, config.grace_period, &node.lifetime).await?;
    if reachability == Reachability::Reachable {
        return Ok(());
    }

    RelayReconfigurer::new(factory, config.relay.clone())
        .with_settle_period(config.settle_period)
        .enter_relay_mode(node)
        .await?;

    Ok(())
}

/// Dial `peers` in the background, bound to `lifetime`.
fn spawn_bootstrap<D>(
    dialer: D,
    peers: Vec<String>,
    lifetime: LifetimeContext,
) -> JoinHandle<Option<BootstrapReport>>
where
    D: Dialer + Clone + 'static,
{
    tokio::spawn(async move {
        match lifetime.run(ark_net_bootstrap::connect(&dialer, &peers)).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                error!(error = %e, "Invalid introduction peer address, bootstrap abandoned");
                None
            }
            Err(_) => {
                debug!("Bootstrap cancelled");
                None
            }
        }
    })
}
