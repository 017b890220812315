use std::sync::Arc;
use std::time::Duration;

use beacon_core::cluster::{NodeState, NO_LEADER};
use beacon_core::protocol::{Channel, ControlCommand};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::registry::MembershipRegistry;
use crate::store::SharedStore;

/// Graceful shutdown configuration.
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// How long to wait for node tasks to finish their current step.
    pub drain_timeout: Duration,
    /// Pause after cleanup before the process exits.
    pub exit_delay: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(5),
            exit_delay: Duration::from_secs(1),
        }
    }
}

/// What the shutdown path managed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that had to be aborted after the drain timeout.
    pub aborted_tasks: usize,
    /// Whether a `leader -1` step-down went out.
    pub stepped_down: bool,
    /// Whether the own liveness marker was deleted.
    pub marker_cleared: bool,
}

/// Graceful shutdown coordinator.
///
/// Kill commands and termination signals share this path: flag the node as
/// shutting down, let tasks finish, drop the liveness marker, step down if
/// leader and pause briefly. The membership record is left for the peers'
/// delayed removal.
pub struct GracefulShutdown {
    store: SharedStore,
    registry: MembershipRegistry,
    state: Arc<NodeState>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    /// Create a new graceful shutdown coordinator.
    pub fn new(
        store: SharedStore,
        registry: MembershipRegistry,
        state: Arc<NodeState>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            store,
            registry,
            state,
            config,
        }
    }

    /// Perform graceful shutdown. Every cleanup step is best effort.
    pub async fn shutdown(&self, tasks: Vec<JoinHandle<()>>) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        if self.state.request_shutdown() {
            tracing::info!(pid = self.state.pid(), "Starting graceful shutdown");
        }

        report.aborted_tasks = self.drain(tasks).await;
        if report.aborted_tasks > 0 {
            tracing::warn!(
                "Drain timeout reached with {} tasks still running",
                report.aborted_tasks
            );
        }

        // Peers reacting to `leader -1` must not find this node alive.
        match self.registry.clear_liveness(self.state.pid()).await {
            Ok(()) => report.marker_cleared = true,
            Err(e) => tracing::warn!("Failed to delete liveness marker: {}", e),
        }

        if self.state.is_leader() {
            let step_down = ControlCommand::Leader(NO_LEADER).encode();
            match self
                .store
                .publish(Channel::Control.as_str(), &step_down)
                .await
            {
                Ok(()) => {
                    self.state.set_leader(NO_LEADER);
                    report.stepped_down = true;
                }
                Err(e) => tracing::warn!("Failed to announce step-down: {}", e),
            }
        }

        if !self.config.exit_delay.is_zero() {
            tokio::time::sleep(self.config.exit_delay).await;
        }

        tracing::info!(pid = self.state.pid(), "Graceful shutdown complete");
        report
    }

    /// Wait for tasks up to the drain timeout; abort the rest.
    async fn drain(&self, tasks: Vec<JoinHandle<()>>) -> usize {
        let deadline = tokio::time::Instant::now() + self.config.drain_timeout;
        let mut aborted = 0;

        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                aborted += 1;
            }
        }

        aborted
    }
}

/// Sleep for `duration` unless shutdown is signalled first.
///
/// Returns `true` if the node is shutting down.
pub async fn sleep_or_shutdown(shutdown_rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *shutdown_rx.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => *shutdown_rx.borrow(),
        changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
    }
}

/// Resolve once shutdown has been signalled.
pub async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}
