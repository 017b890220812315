pub mod channel;
pub mod cluster;
pub mod store;
pub mod testing;

pub use channel::{ChannelListener, ChatterPublisher, ClusterEvent, ConsoleOutcome, OperatorConsole};
pub use cluster::{Coordinator, CoordinatorConfig, GracefulShutdown, MembershipRegistry};
pub use store::{CoordinationStore, RedisStore, SharedStore};
