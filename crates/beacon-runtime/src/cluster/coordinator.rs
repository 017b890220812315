use std::sync::Arc;
use std::time::Duration;

use beacon_core::cluster::NodeState;
use beacon_core::config::ClusterConfig;
use beacon_core::protocol::PresenceSnapshot;
use beacon_core::Result;

use super::detector::{FailureDetector, MembershipScan};
use super::leader::{Election, LeaderElector};
use super::presence::PresencePublisher;
use super::registry::MembershipRegistry;
use super::shutdown::sleep_or_shutdown;
use crate::store::SharedStore;

/// Coordinator loop configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Interval between ticks.
    pub interval: Duration,
    /// Expiry of the liveness marker.
    pub liveness_ttl: Duration,
    /// Grace window before a dead member is removed.
    pub remove_delay: Duration,
    /// Pause after a failed tick.
    pub retry_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            liveness_ttl: Duration::from_secs(3),
            remove_delay: Duration::from_secs(20),
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl From<&ClusterConfig> for CoordinatorConfig {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            interval: config.heartbeat_interval(),
            liveness_ttl: config.liveness_ttl(),
            remove_delay: config.remove_delay(),
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Everything one tick observed and did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub scan: MembershipScan,
    pub election: Election,
    pub presence: PresenceSnapshot,
}

/// Periodic coordinator: heartbeat, dead scan, election, presence.
///
/// The four steps of a tick run strictly in order; a failing step aborts
/// the rest of the tick and the loop backs off before trying again.
pub struct Coordinator {
    state: Arc<NodeState>,
    registry: MembershipRegistry,
    detector: FailureDetector,
    elector: LeaderElector,
    presence: PresencePublisher,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Create a new coordinator.
    pub fn new(
        store: SharedStore,
        registry: MembershipRegistry,
        state: Arc<NodeState>,
        config: CoordinatorConfig,
    ) -> Self {
        let detector = FailureDetector::new(registry.clone(), state.pid(), config.remove_delay);
        let elector = LeaderElector::new(store.clone(), state.clone());
        let presence = PresencePublisher::new(store, registry.clone());
        Self {
            state,
            registry,
            detector,
            elector,
            presence,
            config,
        }
    }

    /// Insert this node's membership record.
    pub async fn register(&self) -> Result<()> {
        self.registry.register(self.state.identity()).await
    }

    /// Run one tick.
    pub async fn tick(&self) -> Result<TickReport> {
        let pid = self.state.pid();
        self.registry.refresh(pid, self.config.liveness_ttl).await?;

        let now = self.registry.now_millis();
        let mut scan = self.detector.scan(now).await?;

        // Our record was removed by a peer (e.g. after a long stall).
        if !scan.contains(pid) {
            tracing::warn!(pid, "Own membership record missing, re-registering");
            self.register().await?;
            self.registry.refresh(pid, self.config.liveness_ttl).await?;
            scan = self.detector.scan(now).await?;
        }

        let election = self.elector.elect(&scan.alive()).await?;
        let presence = self.presence.publish(election.leader, &scan).await?;

        Ok(TickReport {
            scan,
            election,
            presence,
        })
    }

    /// Run the coordinator loop until shutdown.
    pub async fn run(&self) {
        let mut shutdown_rx = self.state.shutdown_receiver();

        loop {
            if self.state.is_shutting_down() {
                return;
            }
            match self.register().await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(component = "coordinator", "Failed to register: {}", e);
                    if sleep_or_shutdown(&mut shutdown_rx, self.config.retry_backoff).await {
                        return;
                    }
                }
            }
        }

        loop {
            if self.state.is_shutting_down() {
                break;
            }

            let pause = match self.tick().await {
                Ok(report) => {
                    tracing::debug!(
                        leader = report.election.leader,
                        alive = report.presence.alive_count(),
                        members = report.scan.members.len(),
                        "Coordinator tick"
                    );
                    self.config.interval
                }
                Err(e) => {
                    tracing::warn!(component = "coordinator", "Coordinator tick failed: {}", e);
                    self.config.retry_backoff
                }
            };

            if sleep_or_shutdown(&mut shutdown_rx, pause).await {
                break;
            }
        }

        tracing::info!("Coordinator shutting down");
    }
}
