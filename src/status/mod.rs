//! Cluster status: leader, peer set, and the agent's self description.

pub mod agent_self;
pub mod flags;
pub mod peer;
pub mod peers;

pub use flags::{StatusFlags, StatusSelection};
pub use peer::Peer;
pub use peers::Peers;
