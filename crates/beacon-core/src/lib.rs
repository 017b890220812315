pub mod clock;
pub mod cluster;
pub mod config;
pub mod error;
pub mod protocol;

pub use clock::{Clock, SystemClock};
pub use cluster::{NodeIdentity, NodeRole, NodeState, NodeStatus, Pid, NO_LEADER};
pub use config::BeaconConfig;
pub use error::{BeaconError, Result};
pub use protocol::{ControlCommand, PresenceEntry, PresenceSnapshot};
