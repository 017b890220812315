use crate::cluster::{fallback_name, NodeRole, NodeStatus, Pid};
use crate::error::{BeaconError, Result};

/// Payload prefix of a presence snapshot.
const PREFIX: &str = "presence:";

/// One member line of a presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub pid: Pid,
    pub name: String,
    pub alive: bool,
}

impl PresenceEntry {
    /// Create an entry. `:` and `,` are field separators on the wire, so any
    /// occurrence in the name is replaced with `_`.
    pub fn new(pid: Pid, name: &str, alive: bool) -> Self {
        Self {
            pid,
            name: name.replace([':', ','], "_"),
            alive,
        }
    }

    /// Liveness status.
    pub fn status(&self) -> NodeStatus {
        NodeStatus::from_alive(self.alive)
    }
}

/// Full membership view published once per coordinator tick.
///
/// Wire form: `presence: <leader>|<pid>:<name>:<0|1>,...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub leader: Pid,
    pub members: Vec<PresenceEntry>,
}

impl PresenceSnapshot {
    pub fn new(leader: Pid, members: Vec<PresenceEntry>) -> Self {
        Self { leader, members }
    }

    /// Role of `pid` relative to this snapshot's leader. The leader does not
    /// have to be listed among the members.
    pub fn role_of(&self, pid: Pid) -> NodeRole {
        NodeRole::of(pid, self.leader)
    }

    /// Number of members flagged alive.
    pub fn alive_count(&self) -> usize {
        self.members.iter().filter(|m| m.alive).count()
    }

    /// Look up a member by pid.
    pub fn member(&self, pid: Pid) -> Option<&PresenceEntry> {
        self.members.iter().find(|m| m.pid == pid)
    }

    pub fn encode(&self) -> String {
        let members: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("{}:{}:{}", m.pid, m.name, if m.alive { 1 } else { 0 }))
            .collect();
        format!("{} {}|{}", PREFIX, self.leader, members.join(","))
    }

    pub fn decode(payload: &str) -> Result<Self> {
        let body = payload
            .trim_start()
            .strip_prefix(PREFIX)
            .ok_or_else(|| protocol_error("missing presence prefix", payload))?;

        let (leader, members) = body
            .split_once('|')
            .ok_or_else(|| protocol_error("missing '|' separator", payload))?;

        let leader: Pid = leader
            .trim()
            .parse()
            .map_err(|_| protocol_error("invalid leader pid", payload))?;

        let members = members
            .trim_end()
            .split(',')
            .filter(|item| !item.trim().is_empty())
            .map(|item| decode_entry(item).ok_or_else(|| protocol_error("invalid member", item)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { leader, members })
    }
}

impl std::fmt::Display for PresenceSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Decode `<pid>[:<name>[:<0|1>]]`. Older publishers may omit trailing
/// fields: the name falls back to `node-<pid>` and the flag to alive.
fn decode_entry(item: &str) -> Option<PresenceEntry> {
    let mut fields = item.split(':');
    let pid: Pid = fields.next()?.trim().parse().ok()?;
    let name = fields
        .next()
        .map(str::to_string)
        .unwrap_or_else(|| fallback_name(pid));
    let alive = match fields.next().map(str::trim) {
        None | Some("1") => true,
        Some("0") => false,
        Some(_) => return None,
    };
    if fields.next().is_some() {
        return None;
    }
    Some(PresenceEntry { pid, name, alive })
}

fn protocol_error(reason: &str, payload: &str) -> BeaconError {
    BeaconError::Protocol(format!("{}: {:?}", reason, payload))
}
