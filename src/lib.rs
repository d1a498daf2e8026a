//! wpan_cluster: self-organizing cluster-tree formation and data relay
//!
//! A fully decentralized protocol by which short-range wireless nodes, none
//! of which initially knows the topology, discover a spanning tree rooted at
//! a single coordinator, assign hierarchical cluster identifiers, and relay
//! application data hop-by-hop toward the coordinator. The radio itself is an
//! external collaborator behind the [`network::Transport`] seam; a
//! deterministic discrete-event simulator in [`sim`] stands in for it.

pub mod core;
pub mod network;
pub mod protocol;
pub mod sim;

// Re-export commonly used items
pub use self::core::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
