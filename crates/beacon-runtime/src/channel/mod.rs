//! Pub/sub side of a node: the channel listener, chatter and the operator
//! console.

mod chatter;
mod console;
mod listener;

pub use chatter::ChatterPublisher;
pub use console::{ConsoleOutcome, OperatorConsole};
pub use listener::{ChannelListener, ClusterEvent, ListenerConfig};
