use std::collections::BTreeSet;

use crate::core::{ClusterId, ShortAddress};

/// Per-node routing state, owned exclusively by that node's engine
///
/// A node has a cluster id only after receiving its grant (the coordinator is
/// pre-seeded with id 0). The parent field is recorded tentatively when a
/// beacon is answered and confirmed by the grant. `children` and
/// `pending_children` are disjoint at all times: an address moves from pending
/// to confirmed when the coordinator approves it, and never sits in both.
#[derive(Debug, Clone, Default)]
pub struct RoutingRecord {
    cluster_id: Option<ClusterId>,
    parent: Option<ShortAddress>,
    children: BTreeSet<ShortAddress>,
    pending_children: BTreeSet<ShortAddress>,
}

impl RoutingRecord {
    /// Creates the record of a parentless device
    pub fn new() -> Self {
        RoutingRecord::default()
    }

    /// Creates the coordinator's record, pre-seeded with cluster id 0
    pub fn new_coordinator() -> Self {
        RoutingRecord {
            cluster_id: Some(ClusterId::COORDINATOR),
            ..RoutingRecord::default()
        }
    }

    /// The node's cluster id, if assigned
    pub fn cluster_id(&self) -> Option<ClusterId> {
        self.cluster_id
    }

    /// The node's parent, if any
    pub fn parent(&self) -> Option<ShortAddress> {
        self.parent
    }

    /// Confirmed children
    pub fn children(&self) -> impl Iterator<Item = ShortAddress> + '_ {
        self.children.iter().copied()
    }

    /// Number of confirmed children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Children whose cluster-id grant is still awaiting approval
    pub fn pending_children(&self) -> impl Iterator<Item = ShortAddress> + '_ {
        self.pending_children.iter().copied()
    }

    /// Whether `addr` is a confirmed child
    pub fn is_child(&self, addr: ShortAddress) -> bool {
        self.children.contains(&addr)
    }

    /// Whether `addr` is parked awaiting the coordinator's approval
    pub fn is_pending(&self, addr: ShortAddress) -> bool {
        self.pending_children.contains(&addr)
    }

    /// Whether `addr` is a confirmed or pending child
    ///
    /// Used for duplicate-request suppression: a second REQUEST_FATHER from a
    /// known address is a no-op.
    pub fn is_known_child(&self, addr: ShortAddress) -> bool {
        self.children.contains(&addr) || self.pending_children.contains(&addr)
    }

    /// Records the parent address (tentatively on beacon, confirmed on grant)
    pub fn set_parent(&mut self, addr: ShortAddress) {
        self.parent = Some(addr);
    }

    /// Assigns the cluster id granted by the parent
    pub fn set_cluster_id(&mut self, id: ClusterId) {
        self.cluster_id = Some(id);
    }

    /// Adds a confirmed child directly (coordinator grant path)
    ///
    /// Returns false if the address was already a confirmed child.
    pub fn add_child(&mut self, addr: ShortAddress) -> bool {
        self.pending_children.remove(&addr);
        self.children.insert(addr)
    }

    /// Parks a requester until the coordinator approves it
    ///
    /// Returns false if the address is already confirmed or pending.
    pub fn add_pending(&mut self, addr: ShortAddress) -> bool {
        if self.children.contains(&addr) {
            return false;
        }
        self.pending_children.insert(addr)
    }

    /// Moves `addr` from pending to confirmed
    ///
    /// Returns true on a match, false if the address was not pending.
    pub fn promote_pending(&mut self, addr: ShortAddress) -> bool {
        if self.pending_children.remove(&addr) {
            self.children.insert(addr);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u16) -> ShortAddress {
        ShortAddress(n)
    }

    #[test]
    fn test_new_device_is_parentless() {
        let record = RoutingRecord::new();
        assert!(record.cluster_id().is_none());
        assert!(record.parent().is_none());
        assert_eq!(record.child_count(), 0);
    }

    #[test]
    fn test_coordinator_is_preseeded() {
        let record = RoutingRecord::new_coordinator();
        assert_eq!(record.cluster_id(), Some(ClusterId::COORDINATOR));
        assert!(record.parent().is_none());
    }

    #[test]
    fn test_children_and_pending_stay_disjoint() {
        let mut record = RoutingRecord::new();
        assert!(record.add_pending(addr(5)));
        assert!(record.is_known_child(addr(5)));
        assert!(!record.is_child(addr(5)));

        assert!(record.promote_pending(addr(5)));
        assert!(record.is_child(addr(5)));
        assert_eq!(record.pending_children().count(), 0);

        // Confirmed children never re-enter the pending set
        assert!(!record.add_pending(addr(5)));
        assert_eq!(record.pending_children().count(), 0);
    }

    #[test]
    fn test_duplicate_adds_are_no_ops() {
        let mut record = RoutingRecord::new_coordinator();
        assert!(record.add_child(addr(2)));
        assert!(!record.add_child(addr(2)));
        assert_eq!(record.child_count(), 1);

        assert!(!record.add_pending(addr(2)));
    }

    #[test]
    fn test_promote_unknown_is_no_match() {
        let mut record = RoutingRecord::new();
        record.add_pending(addr(3));
        assert!(!record.promote_pending(addr(9)));
        assert_eq!(record.pending_children().count(), 1);
        assert_eq!(record.child_count(), 0);
    }
}
