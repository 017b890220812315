use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use tokio::sync::watch;

use super::roles::NodeRole;

/// Process identifier used for membership and leader election.
pub type Pid = i64;

/// Sentinel leader pid meaning "no leader known".
pub const NO_LEADER: Pid = -1;

/// Upper bound (exclusive) for randomly assigned pids.
const RANDOM_PID_RANGE: Pid = 1_000_000;

/// Identity of a node. Assigned once at startup and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    /// Process-unique, non-negative id.
    pub pid: Pid,
    /// Human-readable display name.
    pub name: String,
}

impl NodeIdentity {
    /// Create an identity with an explicit pid.
    pub fn new(pid: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }

    /// Create an identity with a random pid in `0..1_000_000`.
    pub fn random(name: impl Into<String>) -> Self {
        Self::new(rand::random_range(0..RANDOM_PID_RANGE), name)
    }
}

impl std::fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.pid)
    }
}

/// Per-process coordination state shared by every task of a node.
///
/// The leader is a single atomic word; `is_leader` is derived from it, so a
/// reader can never observe a leader pid and role flag that disagree. The
/// coordinator and the channel listener are the only writers of the leader
/// field. The shutdown flag is written by the listener (kill) and by the
/// signal handler.
#[derive(Debug)]
pub struct NodeState {
    identity: NodeIdentity,
    leader_pid: AtomicI64,
    shutting_down: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl NodeState {
    /// Create state for a freshly started node with no known leader.
    pub fn new(identity: NodeIdentity) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            identity,
            leader_pid: AtomicI64::new(NO_LEADER),
            shutting_down: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Node identity.
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Own pid.
    pub fn pid(&self) -> Pid {
        self.identity.pid
    }

    /// Own display name.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Currently known leader pid, or [`NO_LEADER`].
    pub fn leader_pid(&self) -> Pid {
        self.leader_pid.load(Ordering::SeqCst)
    }

    /// Whether this node is the currently known leader.
    pub fn is_leader(&self) -> bool {
        self.leader_pid() == self.identity.pid
    }

    /// Current role derived from the known leader.
    pub fn role(&self) -> NodeRole {
        NodeRole::of(self.identity.pid, self.leader_pid())
    }

    /// Record a leader. Returns `true` if the known leader changed.
    pub fn set_leader(&self, leader: Pid) -> bool {
        self.leader_pid.swap(leader, Ordering::SeqCst) != leader
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Request a cooperative shutdown of every task on this node.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn request_shutdown(&self) -> bool {
        let first = !self.shutting_down.swap(true, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
        first
    }

    /// Receiver that flips to `true` once shutdown is requested.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}
