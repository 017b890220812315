//! Testing utilities for Beacon nodes.
//!
//! Provides an in-process coordination store and a hand-driven clock so
//! membership, election and eviction can be exercised without a live
//! Redis and without real waiting.

mod clock;
mod memory;

pub use clock::ManualClock;
pub use memory::MemoryStore;

use std::time::Duration;

use beacon_core::config::ClusterConfig;

/// Default test timeout.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cluster timing suited to tests: short intervals, no delays.
pub fn fast_cluster_config() -> ClusterConfig {
    ClusterConfig {
        heartbeat_interval_ms: 50,
        liveness_ttl_secs: 1,
        remove_delay_secs: 2,
        retry_backoff_ms: 50,
        chatter_interval_ms: 50,
        exit_delay_ms: 0,
        chatter_enabled: false,
        console_enabled: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_config_is_valid() {
        let config = beacon_core::BeaconConfig {
            cluster: fast_cluster_config(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
