//! BEACON - cluster membership, failure detection and leader election over
//! a shared Redis instance.
//!
//! Every node registers itself, refreshes a short-lived liveness marker,
//! elects the highest alive pid as leader and publishes a presence snapshot
//! each tick. The leader can stop other nodes from its console.

pub mod render;
mod runtime;

pub use runtime::{Node, NodeBuilder};
