use super::node::Pid;

/// Role of a node as derived from the elected leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// The elected leader.
    Boss,
    /// Any other member.
    Worker,
}

impl NodeRole {
    /// Role of `pid` given the current `leader`.
    pub fn of(pid: Pid, leader: Pid) -> Self {
        if pid == leader {
            Self::Boss
        } else {
            Self::Worker
        }
    }

    /// Display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boss => "BOSS",
            Self::Worker => "WORKER",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Liveness status of a member as seen in a presence snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Liveness marker is unexpired.
    Alive,
    /// Marker expired; record still inside the grace window.
    Disappear,
}

impl NodeStatus {
    /// Map the wire alive flag to a status.
    pub fn from_alive(alive: bool) -> Self {
        if alive {
            Self::Alive
        } else {
            Self::Disappear
        }
    }

    /// Display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "ALIVE",
            Self::Disappear => "DISAPPEAR",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_of() {
        assert_eq!(NodeRole::of(30, 30), NodeRole::Boss);
        assert_eq!(NodeRole::of(10, 30), NodeRole::Worker);
        assert_eq!(NodeRole::of(10, -1), NodeRole::Worker);
        assert_eq!(NodeRole::Boss.to_string(), "BOSS");
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(NodeStatus::from_alive(true), NodeStatus::Alive);
        assert_eq!(NodeStatus::from_alive(false).as_str(), "DISAPPEAR");
    }
}
