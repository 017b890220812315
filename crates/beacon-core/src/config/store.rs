use serde::{Deserialize, Serialize};

/// Coordination store (Redis) connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Store port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional password for AUTH.
    #[serde(default)]
    pub password: Option<String>,

    /// Full connection URL. Takes precedence over host/port/password.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            url: None,
        }
    }
}

impl StoreConfig {
    /// Password to authenticate with, if one is configured and non-empty.
    ///
    /// Passed to the client as a separate field, never spliced into a URL.
    pub fn auth_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Whether a password is configured.
    pub fn has_auth(&self) -> bool {
        self.auth_password().is_some()
    }

    /// `host:port` for log lines. Never includes credentials.
    pub fn display_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}
