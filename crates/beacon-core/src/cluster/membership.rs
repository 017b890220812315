//! Store key layout and the pure membership rules.

use super::node::{Pid, NO_LEADER};

/// Well-known key of the membership set.
pub const MEMBERS_KEY: &str = "cluster:nodes";

/// Liveness marker key for a pid.
pub fn liveness_key(pid: Pid) -> String {
    format!("hb:{}", pid)
}

/// Attribute bag key for a pid.
pub fn node_info_key(pid: Pid) -> String {
    format!("node:info:{}", pid)
}

/// Display name used when a member's name cannot be resolved.
pub fn fallback_name(pid: Pid) -> String {
    format!("node-{}", pid)
}

/// Fields of a member's attribute bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoField {
    Name,
    StartedAt,
    LastSeen,
}

impl InfoField {
    /// Field name inside the bag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::StartedAt => "startedAt",
            Self::LastSeen => "lastSeen",
        }
    }
}

/// Deterministic election: highest alive pid wins, [`NO_LEADER`] if none.
pub fn elect_leader(alive: &[Pid]) -> Pid {
    alive.iter().copied().max().unwrap_or(NO_LEADER)
}

/// Delayed-removal rule for a member whose liveness marker has expired.
///
/// A missing `lastSeen` is treated as the epoch, which makes the record
/// immediately evictable.
pub fn should_evict(now_ms: i64, last_seen_ms: Option<i64>, remove_delay_ms: i64) -> bool {
    now_ms.saturating_sub(last_seen_ms.unwrap_or(0)) >= remove_delay_ms
}
