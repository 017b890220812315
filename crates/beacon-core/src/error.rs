use thiserror::Error;

/// Core error type for Beacon operations.
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BeaconError {
    /// Whether the error came from the coordination store.
    ///
    /// Store errors are transient and always retried by the caller's loop.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Result type alias using BeaconError.
pub type Result<T> = std::result::Result<T, BeaconError>;
