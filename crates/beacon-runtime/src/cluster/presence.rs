use beacon_core::cluster::Pid;
use beacon_core::protocol::{Channel, PresenceEntry, PresenceSnapshot};
use beacon_core::Result;

use super::detector::MembershipScan;
use super::registry::MembershipRegistry;
use crate::store::SharedStore;

/// Publishes the membership snapshot on the `presence` channel.
pub struct PresencePublisher {
    store: SharedStore,
    registry: MembershipRegistry,
}

impl PresencePublisher {
    pub fn new(store: SharedStore, registry: MembershipRegistry) -> Self {
        Self { store, registry }
    }

    /// Build the snapshot for `scan` under `leader`.
    pub async fn snapshot(&self, leader: Pid, scan: &MembershipScan) -> PresenceSnapshot {
        let mut entries = Vec::with_capacity(scan.members.len());
        for member in &scan.members {
            let name = self.registry.name_of(member.pid).await;
            entries.push(PresenceEntry::new(member.pid, &name, member.alive));
        }
        PresenceSnapshot::new(leader, entries)
    }

    /// Build and publish one snapshot.
    pub async fn publish(&self, leader: Pid, scan: &MembershipScan) -> Result<PresenceSnapshot> {
        let snapshot = self.snapshot(leader, scan).await;
        self.store
            .publish(Channel::Presence.as_str(), &snapshot.encode())
            .await?;
        Ok(snapshot)
    }
}
