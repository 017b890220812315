mod membership;
mod node;
mod roles;

pub use membership::{
    elect_leader, fallback_name, liveness_key, node_info_key, should_evict, InfoField, MEMBERS_KEY,
};
pub use node::{NodeIdentity, NodeState, Pid, NO_LEADER};
pub use roles::{NodeRole, NodeStatus};
