//! Cluster coordination: membership records, failure detection, leader
//! election, presence and graceful shutdown.

mod coordinator;
mod detector;
mod leader;
mod presence;
mod registry;
mod shutdown;

pub use coordinator::{Coordinator, CoordinatorConfig, TickReport};
pub use detector::{FailureDetector, MemberView, MembershipScan};
pub use leader::{log_role, Election, LeaderElector, LeaderGuard};
pub use presence::PresencePublisher;
pub use registry::MembershipRegistry;
pub use shutdown::{
    sleep_or_shutdown, wait_for_shutdown, GracefulShutdown, ShutdownConfig, ShutdownReport,
};
