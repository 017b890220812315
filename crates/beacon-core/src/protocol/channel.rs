use chrono::{DateTime, SecondsFormat, Utc};

use crate::cluster::{NodeRole, Pid};

/// Pub/sub channels every node subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Free-text chatter.
    Broadcast,
    /// Leader announcements and kill commands.
    Control,
    /// Membership snapshots.
    Presence,
}

impl Channel {
    /// Every channel, in subscription order.
    pub const ALL: [Channel; 3] = [Channel::Broadcast, Channel::Control, Channel::Presence];

    /// Channel name in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Control => "control",
            Self::Presence => "presence",
        }
    }

    /// Parse from a channel name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "broadcast" => Some(Self::Broadcast),
            "control" => Some(Self::Control),
            "presence" => Some(Self::Presence),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Chatter line published on the broadcast channel.
pub fn chatter_line(name: &str, role: NodeRole, pid: Pid, at: DateTime<Utc>) -> String {
    format!(
        "{} | {} | pid={} @ {}",
        name,
        role,
        pid,
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}
