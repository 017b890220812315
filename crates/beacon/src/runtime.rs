//! Node assembly: wires the store, the coordinator and the channel tasks
//! together and runs them until the node is killed or interrupted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use beacon_core::cluster::{NodeIdentity, NodeState};
use beacon_core::config::BeaconConfig;
use beacon_core::{BeaconError, Clock, Result, SystemClock};
use beacon_runtime::channel::{
    ChannelListener, ChatterPublisher, ClusterEvent, ListenerConfig, OperatorConsole,
};
use beacon_runtime::cluster::{
    wait_for_shutdown, Coordinator, CoordinatorConfig, GracefulShutdown, MembershipRegistry,
    ShutdownConfig, ShutdownReport,
};
use beacon_runtime::store::{RedisStore, SharedStore};

use crate::render;

/// How long shutdown waits for node tasks to wind down.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A cluster node.
pub struct Node {
    config: BeaconConfig,
    state: Arc<NodeState>,
    store: SharedStore,
    clock: Arc<dyn Clock>,
    listener: Arc<ChannelListener>,
    render: bool,
}

impl Node {
    /// Create a new builder for configuring a node.
    pub fn builder() -> NodeBuilder {
        NodeBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    /// Shared node state.
    pub fn state(&self) -> Arc<NodeState> {
        self.state.clone()
    }

    /// Subscribe to events seen on the cluster channels.
    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.listener.subscribe()
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        self.state.request_shutdown();
    }

    /// Run the node until it is killed, interrupted or asked to shut down.
    pub async fn run(self) -> Result<ShutdownReport> {
        if self.state.is_shutting_down() {
            return Err(BeaconError::InvalidState(
                "node was shut down before it started".to_string(),
            ));
        }

        let cluster = &self.config.cluster;
        let registry = MembershipRegistry::new(self.store.clone(), self.clock.clone());
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        tracing::info!(
            pid = self.state.pid(),
            node = %self.state.name(),
            "Beacon node starting"
        );

        // Render events first so the first presence table is not missed.
        if self.render {
            let events = self.listener.subscribe();
            let state = self.state.clone();
            handles.push(tokio::spawn(render_events(events, state)));
        }

        {
            let listener = self.listener.clone();
            handles.push(tokio::spawn(async move {
                listener.run().await;
            }));
        }

        {
            let coordinator = Coordinator::new(
                self.store.clone(),
                registry.clone(),
                self.state.clone(),
                CoordinatorConfig::from(cluster),
            );
            handles.push(tokio::spawn(async move {
                coordinator.run().await;
            }));
        }

        if cluster.chatter_enabled {
            let chatter = ChatterPublisher::new(
                self.store.clone(),
                self.state.clone(),
                self.clock.clone(),
                cluster.chatter_interval(),
                cluster.retry_backoff(),
            );
            handles.push(tokio::spawn(async move {
                chatter.run().await;
            }));
        }

        if cluster.console_enabled {
            let console =
                OperatorConsole::new(self.store.clone(), self.state.clone(), registry.clone());
            handles.push(tokio::spawn(async move {
                console
                    .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                    .await;
            }));
        }

        tracing::info!("Beacon node started");

        let mut shutdown_rx = self.state.shutdown_receiver();
        wait_for_stop(tokio::signal::ctrl_c(), &mut shutdown_rx).await;

        let shutdown = GracefulShutdown::new(
            self.store.clone(),
            registry,
            self.state.clone(),
            ShutdownConfig {
                drain_timeout: DRAIN_TIMEOUT,
                exit_delay: cluster.exit_delay(),
            },
        );
        let report = shutdown.shutdown(handles).await;

        tracing::info!("Beacon node stopped");
        Ok(report)
    }
}

/// Wait for a termination signal or a shutdown request, whichever comes
/// first. If the signal handler cannot be installed only a shutdown request
/// stops the node.
async fn wait_for_stop<F>(signal: F, shutdown_rx: &mut watch::Receiver<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    let signalled = tokio::select! {
        result = signal => match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
                false
            }
        },
        _ = wait_for_shutdown(shutdown_rx) => false,
    };

    if signalled {
        tracing::info!("Received shutdown signal");
    } else {
        wait_for_shutdown(shutdown_rx).await;
        tracing::info!("Received shutdown notification");
    }
}

/// Print cluster events until shutdown.
async fn render_events(mut events: broadcast::Receiver<ClusterEvent>, state: Arc<NodeState>) {
    let mut shutdown_rx = state.shutdown_receiver();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(text) = render::event(state.name(), &event) {
                        println!("{}", text);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event renderer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = wait_for_shutdown(&mut shutdown_rx) => break,
        }
    }
}

/// Builder for configuring a node.
pub struct NodeBuilder {
    config: Option<BeaconConfig>,
    identity: Option<NodeIdentity>,
    store: Option<SharedStore>,
    clock: Option<Arc<dyn Clock>>,
    render: bool,
}

impl NodeBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            identity: None,
            store: None,
            clock: None,
            render: true,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: BeaconConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a fixed identity instead of the configured one.
    pub fn identity(mut self, identity: NodeIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Use an existing store instead of connecting to Redis.
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Whether to print cluster events to stdout.
    pub fn render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// Build the node.
    pub fn build(self) -> Result<Node> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let identity = self.identity.unwrap_or_else(|| config.node.identity());
        if identity.pid < 0 {
            return Err(BeaconError::InvalidArgument(format!(
                "pid must be non-negative, got {}",
                identity.pid
            )));
        }
        let store: SharedStore = match self.store {
            Some(store) => store,
            None => Arc::new(RedisStore::from_config(&config.store)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let state = Arc::new(NodeState::new(identity));
        let listener = Arc::new(ChannelListener::new(
            store.clone(),
            state.clone(),
            ListenerConfig {
                retry_backoff: config.cluster.retry_backoff(),
                ..Default::default()
            },
        ));

        Ok(Node {
            config,
            state,
            store,
            clock,
            listener,
            render: self.render,
        })
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use beacon_core::protocol::Channel;
    use beacon_runtime::store::CoordinationStore;
    use beacon_runtime::testing::{fast_cluster_config, MemoryStore, DEFAULT_TEST_TIMEOUT};

    fn test_config() -> BeaconConfig {
        BeaconConfig {
            cluster: fast_cluster_config(),
            ..Default::default()
        }
    }

    fn test_node(store: &Arc<MemoryStore>, pid: i64) -> Node {
        Node::builder()
            .config(test_config())
            .identity(NodeIdentity::new(pid, format!("name{pid}")))
            .store(store.clone())
            .render(false)
            .build()
            .unwrap()
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(DEFAULT_TEST_TIMEOUT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = test_config();
        config.cluster.liveness_ttl_secs = 0;
        let result = Node::builder()
            .config(config)
            .store(Arc::new(MemoryStore::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_negative_pid() {
        let result = Node::builder()
            .config(test_config())
            .identity(NodeIdentity::new(-5, "neg"))
            .store(Arc::new(MemoryStore::new()))
            .build();
        assert!(matches!(result, Err(BeaconError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_run_after_shutdown_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let node = test_node(&store, 1);
        node.shutdown();
        assert!(matches!(node.run().await, Err(BeaconError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_signal_failure_waits_for_shutdown_request() {
        let state = NodeState::new(NodeIdentity::new(1, "one"));
        let mut rx = state.shutdown_receiver();
        let failing = async { Err::<(), _>(std::io::Error::other("signals unsupported")) };

        let mut stop = tokio_test::task::spawn(wait_for_stop(failing, &mut rx));
        assert!(stop.poll().is_pending());

        state.request_shutdown();
        assert!(stop.is_woken());
        assert!(stop.poll().is_ready());
    }

    #[tokio::test]
    async fn test_signal_stops_node() {
        let state = NodeState::new(NodeIdentity::new(1, "one"));
        let mut rx = state.shutdown_receiver();

        let signal = async { Ok::<(), std::io::Error>(()) };
        tokio::time::timeout(DEFAULT_TEST_TIMEOUT, wait_for_stop(signal, &mut rx))
            .await
            .unwrap();
        assert!(!state.is_shutting_down());
    }

    #[test]
    fn test_builder_uses_configured_identity() {
        let mut config = test_config();
        config.node.name = "alpha".into();
        config.node.pid = Some(7);
        let node = Node::builder()
            .config(config)
            .store(Arc::new(MemoryStore::new()))
            .build()
            .unwrap();

        assert_eq!(node.state().pid(), 7);
        assert_eq!(node.state().name(), "alpha");
    }

    #[tokio::test]
    async fn test_highest_pid_leads_and_kill_stops_target() {
        let store = Arc::new(MemoryStore::new());
        let nodes: Vec<Node> = [10, 20, 30].iter().map(|pid| test_node(&store, *pid)).collect();
        let states: Vec<Arc<NodeState>> = nodes.iter().map(|n| n.state()).collect();
        let tasks: Vec<_> = nodes.into_iter().map(|n| tokio::spawn(n.run())).collect();

        wait_until(|| store.subscriber_count() >= 3).await;
        wait_until(|| states.iter().all(|s| s.leader_pid() == 30)).await;
        assert!(states[2].is_leader());
        assert!(!states[0].is_leader());

        store.publish("control", "20 kill 10 (name10)").await.unwrap();
        wait_until(|| states[0].is_shutting_down()).await;

        let mut tasks = tasks.into_iter();
        let killed = tasks.next().unwrap();
        let report = tokio::time::timeout(DEFAULT_TEST_TIMEOUT, killed)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(report.marker_cleared);
        assert!(!report.stepped_down);

        // The record outlives the marker until the grace window passes.
        assert!(!store.contains_key("hb:10"));
        assert!(store.set_members("cluster:nodes").contains(&"10".to_string()));
        wait_until(|| {
            store
                .published(Channel::Presence)
                .iter()
                .any(|p| p.contains("10:name10:0"))
        })
        .await;

        for state in &states[1..] {
            state.request_shutdown();
        }
        for task in tasks {
            tokio::time::timeout(DEFAULT_TEST_TIMEOUT, task)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        }
        assert!(store.published(Channel::Control).contains(&"leader -1".to_string()));
    }
}
