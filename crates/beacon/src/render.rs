//! Console rendering of cluster events.

use chrono::{DateTime, SecondsFormat, Utc};
use console::style;

use beacon_core::{NodeRole, NodeStatus, PresenceSnapshot};
use beacon_runtime::ClusterEvent;

const RULE: &str = "-------------------------------------------------------";

/// Line prefix: local node name padded to ten columns plus a tag.
fn prefix(local_name: &str, tag: &str) -> String {
    format!("[{:<10}|{}]", local_name, tag)
}

/// Render a presence snapshot as a member table.
pub fn presence_table(local_name: &str, snapshot: &PresenceSnapshot, at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{} --- cluster members --- {}\n",
        prefix(local_name, "PRESENCE"),
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    out.push_str(&format!(
        "{:<8}  {:<20}  {:<8}  {:<6}\n",
        "PID", "NAME", "ROLE", "STATUS"
    ));
    out.push_str(RULE);
    out.push('\n');

    if snapshot.members.is_empty() {
        out.push_str("(no members)\n");
    }
    for member in &snapshot.members {
        let role = snapshot.role_of(member.pid);
        let role = match role {
            NodeRole::Boss => style(role.as_str()).bold().yellow(),
            NodeRole::Worker => style(role.as_str()),
        };
        let status = match member.status() {
            NodeStatus::Alive => style(NodeStatus::Alive.as_str()).green(),
            NodeStatus::Disappear => style(NodeStatus::Disappear.as_str()).red(),
        };
        out.push_str(&format!(
            "{:<8}  {:<20}  {:<8}  {:<6}\n",
            member.pid, member.name, role, status
        ));
    }

    out.push_str(RULE);
    out.push('\n');
    out
}

/// Render one cluster event, or `None` for events that are only logged.
pub fn event(local_name: &str, event: &ClusterEvent) -> Option<String> {
    match event {
        ClusterEvent::Chatter(text) => Some(format!("{} {}", prefix(local_name, "MSG"), text)),
        ClusterEvent::Presence(snapshot) => Some(presence_table(local_name, snapshot, Utc::now())),
        ClusterEvent::MalformedPresence(raw) => {
            Some(format!("{} {}", prefix(local_name, "PRESENCE"), raw))
        }
        ClusterEvent::Killed { issuer } => {
            let by = issuer.map(|pid| format!(" from {}", pid)).unwrap_or_default();
            Some(format!(
                "{} got kill{}, exiting",
                prefix(local_name, "CTRL"),
                style(by).dim()
            ))
        }
        ClusterEvent::Leader { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::PresenceEntry;
    use chrono::TimeZone;

    fn plain(s: &str) -> String {
        console::strip_ansi_codes(s).into_owned()
    }

    #[test]
    fn test_presence_table() {
        let snapshot = PresenceSnapshot::new(
            30,
            vec![
                PresenceEntry::new(30, "gamma", true),
                PresenceEntry::new(10, "alpha", false),
            ],
        );
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let table = plain(&presence_table("alpha", &snapshot, at));
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(
            lines[1],
            "[alpha     |PRESENCE] --- cluster members --- 2024-05-01T12:00:00.000Z"
        );
        assert!(lines[4].starts_with("30        gamma"));
        assert!(lines[4].contains("BOSS"));
        assert!(lines[4].contains("ALIVE"));
        assert!(lines[5].contains("WORKER"));
        assert!(lines[5].contains("DISAPPEAR"));
    }

    #[test]
    fn test_empty_presence() {
        let snapshot = PresenceSnapshot::new(-1, vec![]);
        let table = presence_table("n", &snapshot, Utc::now());
        assert!(table.contains("(no members)"));
    }

    #[test]
    fn test_malformed_presence_shows_raw_payload() {
        let line = event("alpha", &ClusterEvent::MalformedPresence("presence: ???".into()));
        assert_eq!(line.as_deref(), Some("[alpha     |PRESENCE] presence: ???"));
    }

    #[test]
    fn test_chatter_and_kill() {
        let line = event("beta", &ClusterEvent::Chatter("hi".into())).unwrap();
        assert_eq!(line, "[beta      |MSG] hi");

        let line = event("beta", &ClusterEvent::Killed { issuer: Some(30) }).unwrap();
        assert_eq!(plain(&line), "[beta      |CTRL] got kill from 30, exiting");

        assert!(event("beta", &ClusterEvent::Leader { leader: 3, changed: true }).is_none());
    }
}
