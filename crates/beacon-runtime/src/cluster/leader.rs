use std::sync::Arc;

use beacon_core::cluster::{elect_leader, NodeState, Pid};
use beacon_core::protocol::{Channel, ControlCommand};
use beacon_core::Result;

use crate::store::SharedStore;

/// Outcome of one election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Election {
    /// Elected leader, or `-1`.
    pub leader: Pid,
    /// Whether the local view changed (and an announcement went out).
    pub changed: bool,
}

/// Deterministic leader election over the alive set.
///
/// Every node runs this independently each tick; the highest alive pid wins
/// and no coordination beyond seeing the same alive set is needed.
pub struct LeaderElector {
    store: SharedStore,
    state: Arc<NodeState>,
}

impl LeaderElector {
    /// Create a new leader elector.
    pub fn new(store: SharedStore, state: Arc<NodeState>) -> Self {
        Self { store, state }
    }

    /// Elect from `alive` and announce on the control channel if the known
    /// leader changed.
    ///
    /// The announcement is published before the local state is updated, so
    /// a failed publish is retried on the next round.
    pub async fn elect(&self, alive: &[Pid]) -> Result<Election> {
        let leader = elect_leader(alive);
        if leader == self.state.leader_pid() {
            return Ok(Election {
                leader,
                changed: false,
            });
        }

        let announcement = ControlCommand::Leader(leader).encode();
        self.store
            .publish(Channel::Control.as_str(), &announcement)
            .await?;

        let was_leader = self.state.is_leader();
        self.state.set_leader(leader);
        tracing::info!(leader, alive = ?alive, "Leader changed");
        if was_leader != self.state.is_leader() {
            log_role(&self.state);
        }

        Ok(Election {
            leader,
            changed: true,
        })
    }
}

/// Log the node's current role.
pub fn log_role(state: &NodeState) {
    tracing::info!(
        node = %state.name(),
        role = %state.role(),
        "now {} (leaderPid={}, myPid={})",
        state.role(),
        state.leader_pid(),
        state.pid()
    );
}

/// Guard for leader-only operations.
pub struct LeaderGuard<'a> {
    state: &'a NodeState,
}

impl<'a> LeaderGuard<'a> {
    /// Try to create a leader guard.
    /// Returns None if not the leader.
    pub fn try_new(state: &'a NodeState) -> Option<Self> {
        if state.is_leader() {
            Some(Self { state })
        } else {
            None
        }
    }

    /// Check if still leader.
    pub fn is_leader(&self) -> bool {
        self.state.is_leader()
    }

    /// Pid of the leader holding this guard.
    pub fn pid(&self) -> Pid {
        self.state.pid()
    }
}
