use std::time::Duration;

use beacon_core::cluster::{should_evict, Pid};
use beacon_core::Result;

use super::registry::MembershipRegistry;

/// A member that survived the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberView {
    pub pid: Pid,
    pub alive: bool,
}

/// Result of one failure-detector pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipScan {
    /// Remaining members in set order, alive or inside the grace window.
    pub members: Vec<MemberView>,
    /// Members removed during this pass.
    pub evicted: Vec<Pid>,
}

impl MembershipScan {
    /// Pids with an unexpired liveness marker.
    pub fn alive(&self) -> Vec<Pid> {
        self.members
            .iter()
            .filter(|m| m.alive)
            .map(|m| m.pid)
            .collect()
    }

    /// Whether `pid` is still in the membership set.
    pub fn contains(&self, pid: Pid) -> bool {
        self.members.iter().any(|m| m.pid == pid)
    }
}

/// Splits members into alive and dead and evicts those dead past the
/// grace window.
pub struct FailureDetector {
    registry: MembershipRegistry,
    self_pid: Pid,
    remove_delay: Duration,
}

impl FailureDetector {
    pub fn new(registry: MembershipRegistry, self_pid: Pid, remove_delay: Duration) -> Self {
        Self {
            registry,
            self_pid,
            remove_delay,
        }
    }

    /// Scan every member at time `now_ms`.
    pub async fn scan(&self, now_ms: i64) -> Result<MembershipScan> {
        let remove_delay_ms = self.remove_delay.as_millis() as i64;
        let mut scan = MembershipScan::default();

        for pid in self.registry.members().await? {
            if self.registry.is_alive(pid).await? {
                scan.members.push(MemberView { pid, alive: true });
                continue;
            }

            // Never evict ourselves while running.
            if pid != self.self_pid {
                let last_seen = self.registry.last_seen(pid).await?;
                if should_evict(now_ms, last_seen, remove_delay_ms) {
                    self.registry.evict(pid).await?;
                    tracing::info!(pid, ?last_seen, "Removed member dead past grace window");
                    scan.evicted.push(pid);
                    continue;
                }
            }

            scan.members.push(MemberView { pid, alive: false });
        }

        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use beacon_core::cluster::NodeIdentity;
    use beacon_core::Clock;

    use crate::store::CoordinationStore;
    use crate::testing::{ManualClock, MemoryStore};

    const TTL: Duration = Duration::from_secs(3);
    const GRACE: Duration = Duration::from_secs(20);

    async fn setup(pids: &[Pid]) -> (Arc<ManualClock>, MembershipRegistry) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let registry = MembershipRegistry::new(store, clock.clone());
        for pid in pids {
            registry
                .register(&NodeIdentity::new(*pid, format!("n{pid}")))
                .await
                .unwrap();
            registry.refresh(*pid, TTL).await.unwrap();
        }
        (clock, registry)
    }

    #[tokio::test]
    async fn test_all_alive() {
        let (clock, registry) = setup(&[10, 20, 30]).await;
        let detector = FailureDetector::new(registry, 10, GRACE);

        let scan = detector.scan(clock.now_millis()).await.unwrap();
        assert_eq!(scan.alive(), vec![30, 20, 10]);
        assert!(scan.evicted.is_empty());
    }

    #[tokio::test]
    async fn test_dead_member_kept_during_grace_window() {
        let (clock, registry) = setup(&[10, 30]).await;
        let detector = FailureDetector::new(registry.clone(), 10, GRACE);

        // 30 stops refreshing; 10 keeps going.
        for _ in 0..9 {
            clock.advance(Duration::from_secs(2));
            registry.refresh(10, TTL).await.unwrap();
            let scan = detector.scan(clock.now_millis()).await.unwrap();
            assert!(scan.contains(30), "removed before grace window elapsed");
        }

        // 18s since 30's lastSeen: dead but retained.
        let scan = detector.scan(clock.now_millis()).await.unwrap();
        assert_eq!(
            scan.members,
            vec![
                MemberView { pid: 30, alive: false },
                MemberView { pid: 10, alive: true },
            ]
        );

        clock.advance(Duration::from_secs(2));
        registry.refresh(10, TTL).await.unwrap();
        let scan = detector.scan(clock.now_millis()).await.unwrap();
        assert_eq!(scan.evicted, vec![30]);
        assert_eq!(scan.alive(), vec![10]);
        assert_eq!(registry.members().await.unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn test_never_evicts_self() {
        let (clock, registry) = setup(&[10]).await;
        let detector = FailureDetector::new(registry.clone(), 10, GRACE);

        clock.advance(Duration::from_secs(60));
        let scan = detector.scan(clock.now_millis()).await.unwrap();
        assert!(scan.evicted.is_empty());
        assert_eq!(scan.members, vec![MemberView { pid: 10, alive: false }]);
    }

    #[tokio::test]
    async fn test_member_without_record_is_evicted() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let registry = MembershipRegistry::new(store.clone(), clock.clone());
        store
            .add_to_set(beacon_core::cluster::MEMBERS_KEY, "40", 40.0)
            .await
            .unwrap();

        let detector = FailureDetector::new(registry.clone(), 10, GRACE);
        let scan = detector.scan(clock.now_millis()).await.unwrap();
        assert_eq!(scan.evicted, vec![40]);
        assert!(scan.members.is_empty());
    }
}
