mod cluster;
mod store;

pub use cluster::ClusterConfig;
pub use store::StoreConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cluster::{NodeIdentity, Pid};
use crate::error::{BeaconError, Result};

/// Root configuration for a Beacon node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Coordination store connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Node identity configuration.
    #[serde(default)]
    pub node: NodeConfig,

    /// Coordination timing.
    #[serde(default)]
    pub cluster: ClusterConfig,
}

impl BeaconConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BeaconError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| BeaconError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timing combinations the protocol cannot work with.
    pub fn validate(&self) -> Result<()> {
        let cluster = &self.cluster;
        if cluster.heartbeat_interval_ms == 0 {
            return Err(BeaconError::Config(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }
        if cluster.liveness_ttl_secs == 0 {
            return Err(BeaconError::Config(
                "liveness_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if cluster.remove_delay_secs < cluster.liveness_ttl_secs {
            return Err(BeaconError::Config(format!(
                "remove_delay_secs ({}) must not be shorter than liveness_ttl_secs ({})",
                cluster.remove_delay_secs, cluster.liveness_ttl_secs
            )));
        }
        if let Some(pid) = self.node.pid {
            if pid < 0 {
                return Err(BeaconError::Config(format!(
                    "node pid must be non-negative, got {}",
                    pid
                )));
            }
        }
        Ok(())
    }
}

/// Node identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Display name.
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Fixed pid. A random one is drawn when unset.
    #[serde(default)]
    pub pid: Option<Pid>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            pid: None,
        }
    }
}

impl NodeConfig {
    /// Resolve the node identity for this process.
    pub fn identity(&self) -> NodeIdentity {
        match self.pid {
            Some(pid) => NodeIdentity::new(pid, self.name.clone()),
            None => NodeIdentity::random(self.name.clone()),
        }
    }
}

fn default_node_name() -> String {
    "node".to_string()
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BeaconConfig::default();
        assert_eq!(config.store.port, 6379);
        assert_eq!(config.node.name, "node");
        assert!(config.node.pid.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config() {
        let config = BeaconConfig::parse_toml("").unwrap();
        assert_eq!(config.store.host, "127.0.0.1");
        assert_eq!(config.cluster.remove_delay_secs, 20);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [store]
            host = "redis.internal"
            port = 6380
            password = "pw"

            [node]
            name = "alpha"
            pid = 10

            [cluster]
            heartbeat_interval_ms = 1000
            liveness_ttl_secs = 2
            remove_delay_secs = 10
        "#;

        let config = BeaconConfig::parse_toml(toml).unwrap();
        assert_eq!(config.store.host, "redis.internal");
        assert_eq!(config.store.password.as_deref(), Some("pw"));
        assert_eq!(config.node.identity(), NodeIdentity::new(10, "alpha"));
        assert_eq!(config.cluster.remove_delay_secs, 10);
    }

    #[test]
    fn test_reject_remove_delay_shorter_than_ttl() {
        let toml = r#"
            [cluster]
            liveness_ttl_secs = 5
            remove_delay_secs = 3
        "#;
        let err = BeaconConfig::parse_toml(toml).unwrap_err();
        assert!(matches!(err, BeaconError::Config(_)));
    }

    #[test]
    fn test_reject_negative_pid() {
        let toml = r#"
            [node]
            pid = -4
        "#;
        assert!(BeaconConfig::parse_toml(toml).is_err());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("BEACON_TEST_STORE_HOST", "10.1.2.3");

        let toml = r#"
            [store]
            host = "${BEACON_TEST_STORE_HOST}"
        "#;

        let config = BeaconConfig::parse_toml(toml).unwrap();
        assert_eq!(config.store.host, "10.1.2.3");

        std::env::remove_var("BEACON_TEST_STORE_HOST");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[node]\nname = \"from-file\"").unwrap();

        let config = BeaconConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node.name, "from-file");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = BeaconConfig::from_file("/nonexistent/beacon.toml").unwrap_err();
        assert!(matches!(err, BeaconError::Config(_)));
    }
}
