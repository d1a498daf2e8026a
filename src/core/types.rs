use std::fmt;

use serde::{Deserialize, Serialize};

/// 16-bit short address of a node on the wireless link.
///
/// Two values are reserved: all-ones is the link-layer broadcast address and
/// all-zeros is the null address ("no parent" on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShortAddress(pub u16);

impl ShortAddress {
    /// Link-layer broadcast address (`ff:ff`).
    pub const BROADCAST: ShortAddress = ShortAddress(0xffff);

    /// Null address (`00:00`), the wire sentinel for "no parent".
    pub const NULL: ShortAddress = ShortAddress(0x0000);

    /// Creates an address from its big-endian wire bytes.
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        ShortAddress(u16::from_be_bytes(bytes))
    }

    /// Returns the big-endian wire bytes of this address.
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Returns whether this is the broadcast address.
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    /// Returns whether this is the null address.
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [hi, lo] = self.to_bytes();
        write!(f, "{:02x}:{:02x}", hi, lo)
    }
}

/// Hierarchical cluster identifier: the node's depth in the tree.
///
/// The coordinator is 0 and every child is its parent's id plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u8);

impl ClusterId {
    /// The coordinator's fixed cluster id.
    pub const COORDINATOR: ClusterId = ClusterId(0);

    /// Returns the cluster id granted to a child of this node.
    pub fn child(self) -> Self {
        ClusterId(self.0.saturating_add(1))
    }

    /// Returns the depth level.
    pub fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// The single designated root of the cluster tree.
    Coordinator,
    /// Any other node; attaches to the tree via the beacon protocol.
    Device,
}
