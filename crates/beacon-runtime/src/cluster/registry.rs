use std::sync::Arc;
use std::time::Duration;

use beacon_core::cluster::{
    fallback_name, liveness_key, node_info_key, InfoField, NodeIdentity, Pid, MEMBERS_KEY,
};
use beacon_core::{Clock, Result};

use crate::store::SharedStore;

/// Membership records and liveness markers in the coordination store.
///
/// Each member has an entry in the `cluster:nodes` ordered set (scored by
/// pid), an attribute bag `node:info:<pid>` and a short-lived liveness marker
/// `hb:<pid>`.
#[derive(Clone)]
pub struct MembershipRegistry {
    store: SharedStore,
    clock: Arc<dyn Clock>,
}

impl MembershipRegistry {
    /// Create a new membership registry.
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current time in epoch milliseconds, as used for `lastSeen`.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Register a node: set entry plus `{name, startedAt, lastSeen}`.
    pub async fn register(&self, identity: &NodeIdentity) -> Result<()> {
        let now = self.clock.now_millis();
        let member = identity.pid.to_string();

        self.store
            .add_to_set(MEMBERS_KEY, &member, identity.pid as f64)
            .await?;

        let fields = [
            (InfoField::Name.as_str(), identity.name.clone()),
            (InfoField::StartedAt.as_str(), now.to_string()),
            (InfoField::LastSeen.as_str(), now.to_string()),
        ];
        self.store
            .set_attributes(&node_info_key(identity.pid), &fields)
            .await?;

        tracing::info!(pid = identity.pid, node = %identity.name, "Registered in cluster");
        Ok(())
    }

    /// Refresh the liveness marker and `lastSeen`. Returns the timestamp
    /// that was written.
    pub async fn refresh(&self, pid: Pid, ttl: Duration) -> Result<i64> {
        let now = self.clock.now_millis();
        let stamp = now.to_string();

        self.store
            .set_with_expiry(&liveness_key(pid), &stamp, ttl)
            .await?;
        self.store
            .set_attribute(&node_info_key(pid), InfoField::LastSeen.as_str(), &stamp)
            .await?;

        Ok(now)
    }

    /// Pids in the membership set, highest first. Entries that are not
    /// valid pids are skipped.
    pub async fn members(&self) -> Result<Vec<Pid>> {
        let raw = self.store.list_set(MEMBERS_KEY).await?;
        Ok(raw
            .into_iter()
            .filter_map(|m| match m.parse::<Pid>() {
                Ok(pid) => Some(pid),
                Err(_) => {
                    tracing::warn!(member = %m, "Ignoring malformed membership entry");
                    None
                }
            })
            .collect())
    }

    /// Whether the pid's liveness marker is unexpired.
    pub async fn is_alive(&self, pid: Pid) -> Result<bool> {
        Ok(self.store.time_to_live(&liveness_key(pid)).await?.is_some())
    }

    /// The pid's `lastSeen` timestamp, if recorded and well-formed.
    pub async fn last_seen(&self, pid: Pid) -> Result<Option<i64>> {
        let value = self
            .store
            .get_attribute(&node_info_key(pid), InfoField::LastSeen.as_str())
            .await?;
        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Display name of a pid. Falls back to `node-<pid>` when the bag has
    /// no name or the lookup fails.
    pub async fn name_of(&self, pid: Pid) -> String {
        match self
            .store
            .get_attribute(&node_info_key(pid), InfoField::Name.as_str())
            .await
        {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => fallback_name(pid),
            Err(e) => {
                tracing::debug!(pid, "Name lookup failed: {}", e);
                fallback_name(pid)
            }
        }
    }

    /// Remove a member's set entry and attribute bag.
    pub async fn evict(&self, pid: Pid) -> Result<()> {
        self.store
            .remove_from_set(MEMBERS_KEY, &pid.to_string())
            .await?;
        self.store.delete_bag(&node_info_key(pid)).await?;
        Ok(())
    }

    /// Delete the pid's liveness marker. The membership record stays.
    pub async fn clear_liveness(&self, pid: Pid) -> Result<()> {
        self.store.delete(&liveness_key(pid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CoordinationStore;
    use crate::testing::{ManualClock, MemoryStore};

    fn registry() -> (Arc<MemoryStore>, Arc<ManualClock>, MembershipRegistry) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let registry = MembershipRegistry::new(store.clone(), clock.clone());
        (store, clock, registry)
    }

    #[tokio::test]
    async fn test_register_writes_record() {
        let (store, clock, registry) = registry();
        registry
            .register(&NodeIdentity::new(10, "alpha"))
            .await
            .unwrap();

        assert_eq!(registry.members().await.unwrap(), vec![10]);
        assert_eq!(registry.name_of(10).await, "alpha");
        assert_eq!(
            registry.last_seen(10).await.unwrap(),
            Some(clock.now_millis())
        );
        assert_eq!(
            store
                .get_attribute("node:info:10", "startedAt")
                .await
                .unwrap(),
            Some(clock.now_millis().to_string())
        );
        // Registration alone does not make a node alive.
        assert!(!registry.is_alive(10).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_sets_marker_and_last_seen() {
        let (store, clock, registry) = registry();
        registry
            .register(&NodeIdentity::new(10, "alpha"))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(5));
        let stamp = registry.refresh(10, Duration::from_secs(3)).await.unwrap();

        assert_eq!(stamp, clock.now_millis());
        assert!(registry.is_alive(10).await.unwrap());
        assert_eq!(store.value("hb:10"), Some(stamp.to_string()));
        assert_eq!(registry.last_seen(10).await.unwrap(), Some(stamp));

        clock.advance(Duration::from_secs(3));
        assert!(!registry.is_alive(10).await.unwrap());
    }

    #[tokio::test]
    async fn test_members_skip_malformed_entries() {
        let (store, _, registry) = registry();
        store.add_to_set(MEMBERS_KEY, "7", 7.0).await.unwrap();
        store.add_to_set(MEMBERS_KEY, "junk", 3.0).await.unwrap();
        store.add_to_set(MEMBERS_KEY, "12", 12.0).await.unwrap();

        assert_eq!(registry.members().await.unwrap(), vec![12, 7]);
    }

    #[tokio::test]
    async fn test_name_fallbacks() {
        let (store, _, registry) = registry();
        assert_eq!(registry.name_of(4).await, "node-4");

        store.set_available(false);
        assert_eq!(registry.name_of(4).await, "node-4");
    }

    #[tokio::test]
    async fn test_evict_removes_record_only() {
        let (store, _, registry) = registry();
        registry
            .register(&NodeIdentity::new(10, "alpha"))
            .await
            .unwrap();
        registry.refresh(10, Duration::from_secs(3)).await.unwrap();

        registry.evict(10).await.unwrap();
        assert!(registry.members().await.unwrap().is_empty());
        assert!(!store.contains_key("node:info:10"));

        registry.clear_liveness(10).await.unwrap();
        assert!(!registry.is_alive(10).await.unwrap());
    }
}
