use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and task configuration for cluster coordination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Coordinator tick interval in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Expiry of the liveness marker in seconds.
    #[serde(default = "default_liveness_ttl")]
    pub liveness_ttl_secs: u64,

    /// Grace window before a dead member is removed, in seconds.
    #[serde(default = "default_remove_delay")]
    pub remove_delay_secs: u64,

    /// Fixed sleep after any failed store operation, in milliseconds.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Interval between broadcast chatter lines, in milliseconds.
    #[serde(default = "default_chatter_interval")]
    pub chatter_interval_ms: u64,

    /// Delay between a kill/shutdown request and process exit, in milliseconds.
    #[serde(default = "default_exit_delay")]
    pub exit_delay_ms: u64,

    /// Whether to publish broadcast chatter.
    #[serde(default = "default_true")]
    pub chatter_enabled: bool,

    /// Whether to read operator commands from stdin.
    #[serde(default = "default_true")]
    pub console_enabled: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval(),
            liveness_ttl_secs: default_liveness_ttl(),
            remove_delay_secs: default_remove_delay(),
            retry_backoff_ms: default_retry_backoff(),
            chatter_interval_ms: default_chatter_interval(),
            exit_delay_ms: default_exit_delay(),
            chatter_enabled: true,
            console_enabled: true,
        }
    }
}

impl ClusterConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn liveness_ttl(&self) -> Duration {
        Duration::from_secs(self.liveness_ttl_secs)
    }

    pub fn remove_delay(&self) -> Duration {
        Duration::from_secs(self.remove_delay_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn chatter_interval(&self) -> Duration {
        Duration::from_millis(self.chatter_interval_ms)
    }

    pub fn exit_delay(&self) -> Duration {
        Duration::from_millis(self.exit_delay_ms)
    }
}

fn default_heartbeat_interval() -> u64 {
    2000
}

fn default_liveness_ttl() -> u64 {
    3
}

fn default_remove_delay() -> u64 {
    20
}

fn default_retry_backoff() -> u64 {
    2000
}

fn default_chatter_interval() -> u64 {
    1000
}

fn default_exit_delay() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}
