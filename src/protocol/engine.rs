use bytes::Bytes;
use tracing::{debug, trace, warn};

use super::message::{ChildGrant, Message};
use super::routing::RoutingRecord;
use crate::core::{NodeRole, Result, ShortAddress};

/// Effect produced by a protocol handler
///
/// Handlers never touch the transport directly; they return the frames to send
/// and payloads to hand to the application, and the caller dispatches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Send a message to a single peer
    Unicast {
        dest: ShortAddress,
        message: Message,
    },
    /// Send a message to every neighbor in range
    Broadcast { message: Message },
    /// Hand an application payload up the stack (coordinator only)
    Deliver { payload: Bytes },
}

/// Per-node protocol state machine
///
/// The engine reacts to inbound messages and to the topology driver's timed
/// entry points ([`Engine::emit_beacon`], [`Engine::generate_data`]); it is
/// otherwise passive. Node state is implicit in the [`RoutingRecord`]:
/// parentless devices answer beacons, attached devices relay toward the
/// coordinator and adopt children of their own.
pub struct Engine {
    address: ShortAddress,
    role: NodeRole,
    record: RoutingRecord,
}

impl Engine {
    /// Creates an engine for a node with the given address and role
    pub fn new(address: ShortAddress, role: NodeRole) -> Self {
        let record = match role {
            NodeRole::Coordinator => RoutingRecord::new_coordinator(),
            NodeRole::Device => RoutingRecord::new(),
        };
        Engine {
            address,
            role,
            record,
        }
    }

    /// This node's short address
    pub fn address(&self) -> ShortAddress {
        self.address
    }

    /// This node's role
    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Whether this node is the coordinator
    pub fn is_coordinator(&self) -> bool {
        self.role == NodeRole::Coordinator
    }

    /// Read access to the routing record
    pub fn record(&self) -> &RoutingRecord {
        &self.record
    }

    /// Decodes a received frame and dispatches it
    ///
    /// A frame that fails to decode is an error for the caller to log and
    /// drop; the protocol never retries.
    pub fn handle_frame(
        &mut self,
        src: ShortAddress,
        dst: ShortAddress,
        frame: &[u8],
    ) -> Result<Vec<Output>> {
        let message = Message::decode(frame)?;
        Ok(self.handle_message(src, dst, message))
    }

    /// Dispatches a decoded message
    pub fn handle_message(
        &mut self,
        src: ShortAddress,
        dst: ShortAddress,
        message: Message,
    ) -> Vec<Output> {
        trace!(
            "{} <- {} (dst {}): {:?}",
            self.address,
            src,
            dst,
            message.kind()
        );
        match self.role {
            NodeRole::Coordinator => self.handle_as_coordinator(src, message),
            NodeRole::Device => self.handle_as_device(src, dst, message),
        }
    }

    /// Driver entry point: broadcast a discovery beacon
    ///
    /// A node advertises only once it belongs to the tree, so a device that
    /// has not received its grant yet stays silent.
    pub fn emit_beacon(&self) -> Vec<Output> {
        if self.record.cluster_id().is_none() {
            trace!("{} has no cluster id yet, holding beacon", self.address);
            return Vec::new();
        }
        vec![Output::Broadcast {
            message: Message::Beacon,
        }]
    }

    /// Driver entry point: send one application payload toward the coordinator
    ///
    /// A node that has not attached yet drops the payload; the driver will
    /// simply try again on its next tick.
    pub fn generate_data(&self, payload: Bytes) -> Vec<Output> {
        match self.record.parent() {
            Some(parent) => vec![Output::Unicast {
                dest: parent,
                message: Message::SendDataToCoordinator { payload },
            }],
            None => {
                debug!("{} is parentless, skipping data generation", self.address);
                Vec::new()
            }
        }
    }

    fn handle_as_coordinator(&mut self, src: ShortAddress, message: Message) -> Vec<Output> {
        match message {
            Message::SendDataToCoordinator { payload } => {
                debug!(
                    "{} delivering {} data bytes from subtree via {}",
                    self.address,
                    payload.len(),
                    src
                );
                vec![Output::Deliver { payload }]
            }

            Message::RequestFather => {
                if self.record.is_child(src) {
                    // Duplicate request, already adopted
                    debug!("{} already has child {}, ignoring request", self.address, src);
                    return Vec::new();
                }
                self.record.add_child(src);
                let granted = self
                    .record
                    .cluster_id()
                    .expect("coordinator always has a cluster id")
                    .child();
                debug!(
                    "{} received {}'s request for a father, granting cluster {}",
                    self.address, src, granted
                );
                vec![Output::Unicast {
                    dest: src,
                    message: Message::AcceptChild {
                        cluster_id: granted,
                    },
                }]
            }

            Message::RequestClusterForChild(grant) => self.approve_grandchild(grant),

            other => {
                trace!(
                    "{} ignoring {:?} addressed to the coordinator",
                    self.address,
                    other.kind()
                );
                Vec::new()
            }
        }
    }

    /// Coordinator approval of a grandchild request
    ///
    /// If the asker is a direct child the approval goes straight back to it;
    /// otherwise it is fanned out to every child so the subtree containing
    /// the asker can relay it down. The fan-out is linear in the child count
    /// and intentionally not a least-cost search: narrowing it would change
    /// the observable wire traffic.
    fn approve_grandchild(&mut self, grant: ChildGrant) -> Vec<Output> {
        let reply = Message::ReturnClusterForChild(Some(grant));
        if self.record.is_child(grant.asker) {
            debug!(
                "{} approves {} adopting {}, telling it directly",
                self.address, grant.asker, grant.grandchild
            );
            vec![Output::Unicast {
                dest: grant.asker,
                message: reply,
            }]
        } else {
            debug!(
                "{} approves {} adopting {}, flooding the approval to all children",
                self.address, grant.asker, grant.grandchild
            );
            self.record
                .children()
                .map(|child| Output::Unicast {
                    dest: child,
                    message: reply.clone(),
                })
                .collect()
        }
    }

    fn handle_as_device(
        &mut self,
        src: ShortAddress,
        dst: ShortAddress,
        message: Message,
    ) -> Vec<Output> {
        match message {
            Message::Beacon => {
                if !dst.is_broadcast() {
                    return Vec::new();
                }
                if self.record.parent().is_some() {
                    // Already spoken for
                    return Vec::new();
                }
                debug!("{} requests father {}", self.address, src);
                // Tentatively record the beacon sender; the grant confirms it.
                self.record.set_parent(src);
                vec![Output::Unicast {
                    dest: src,
                    message: Message::RequestFather,
                }]
            }

            Message::RequestFather => self.park_requester(src),

            Message::ReturnClusterForChild(Some(grant)) => self.settle_grant(grant),

            Message::ReturnClusterForChild(None) => {
                // The deny path carries no addresses, so there is nothing to
                // match against the pending set.
                warn!("{} received a cluster-id denial, dropping it", self.address);
                Vec::new()
            }

            Message::AcceptChild { cluster_id } => {
                self.record.set_parent(src);
                self.record.set_cluster_id(cluster_id);
                debug!(
                    "{} got a father {} and cluster id {}",
                    self.address, src, cluster_id
                );
                // Grow the tree downward
                vec![Output::Broadcast {
                    message: Message::Beacon,
                }]
            }

            // Both relay hop-by-hop toward the coordinator unchanged
            Message::RequestClusterForChild(_) | Message::SendDataToCoordinator { .. } => {
                self.relay_to_parent(message)
            }
        }
    }

    /// Handles an adoption request at an intermediate node
    ///
    /// The node has no grant authority of its own: it parks the requester in
    /// the pending set and asks the coordinator (via its own parent) for a
    /// cluster id. A request from an already-known child is idempotent.
    fn park_requester(&mut self, src: ShortAddress) -> Vec<Output> {
        if self.record.is_known_child(src) {
            debug!("{} already knows child {}, ignoring request", self.address, src);
            return Vec::new();
        }
        let Some(parent) = self.record.parent() else {
            // Unreachable in practice: a node only receives requests after
            // beaconing, which requires a parent.
            warn!(
                "{} received a father request from {} while parentless",
                self.address, src
            );
            return Vec::new();
        };
        debug!("{} wants to be {}'s father", self.address, src);
        self.record.add_pending(src);
        vec![Output::Unicast {
            dest: parent,
            message: Message::RequestClusterForChild(ChildGrant {
                asker: self.address,
                grandchild: src,
            }),
        }]
    }

    /// Handles a coordinator approval arriving from above
    ///
    /// On a pending match the requester becomes a confirmed child and gets
    /// its grant; otherwise the approval is forwarded unchanged to every
    /// confirmed child so the right subtree can claim it.
    fn settle_grant(&mut self, grant: ChildGrant) -> Vec<Output> {
        if self.record.is_pending(grant.grandchild) {
            // Confirm the child only once we can actually hand it a cluster
            // id; otherwise leave it parked.
            let Some(cluster_id) = self.record.cluster_id() else {
                warn!(
                    "{} matched pending child {} without a cluster id of its own",
                    self.address, grant.grandchild
                );
                return Vec::new();
            };
            self.record.promote_pending(grant.grandchild);
            debug!(
                "{} gets son {} under the coordinator's agreement",
                self.address, grant.grandchild
            );
            vec![Output::Unicast {
                dest: grant.grandchild,
                message: Message::AcceptChild {
                    cluster_id: cluster_id.child(),
                },
            }]
        } else {
            debug!(
                "{} is not {}'s father, forwarding the approval down",
                self.address, grant.grandchild
            );
            self.record
                .children()
                .map(|child| Output::Unicast {
                    dest: child,
                    message: Message::ReturnClusterForChild(Some(grant)),
                })
                .collect()
        }
    }

    fn relay_to_parent(&self, message: Message) -> Vec<Output> {
        match self.record.parent() {
            Some(parent) => vec![Output::Unicast {
                dest: parent,
                message,
            }],
            None => {
                warn!(
                    "{} cannot relay {:?} without a parent",
                    self.address,
                    message.kind()
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClusterId;

    const COORD: ShortAddress = ShortAddress(0x0001);
    const NODE_A: ShortAddress = ShortAddress(0x0002);
    const NODE_B: ShortAddress = ShortAddress(0x0003);
    const NODE_D: ShortAddress = ShortAddress(0x0004);

    fn coordinator() -> Engine {
        Engine::new(COORD, NodeRole::Coordinator)
    }

    fn device(addr: ShortAddress) -> Engine {
        Engine::new(addr, NodeRole::Device)
    }

    /// Builds a device already attached under `parent` at the given depth.
    fn attached_device(addr: ShortAddress, parent: ShortAddress, cluster: u8) -> Engine {
        let mut engine = device(addr);
        let outputs = engine.handle_message(
            parent,
            addr,
            Message::AcceptChild {
                cluster_id: ClusterId(cluster),
            },
        );
        assert_eq!(
            outputs,
            vec![Output::Broadcast {
                message: Message::Beacon
            }]
        );
        engine
    }

    #[test]
    fn test_single_hop_attachment_trace() {
        let mut coord = coordinator();
        let mut node_a = device(NODE_A);

        // Coordinator beacon reaches A
        let outputs = node_a.handle_message(COORD, ShortAddress::BROADCAST, Message::Beacon);
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: COORD,
                message: Message::RequestFather
            }]
        );
        assert_eq!(node_a.record().parent(), Some(COORD));

        // Coordinator adopts A with cluster id 1
        let outputs = coord.handle_message(NODE_A, COORD, Message::RequestFather);
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: NODE_A,
                message: Message::AcceptChild {
                    cluster_id: ClusterId(1)
                }
            }]
        );
        assert!(coord.record().is_child(NODE_A));

        // A takes the grant and beacons in turn
        let outputs = node_a.handle_message(
            COORD,
            NODE_A,
            Message::AcceptChild {
                cluster_id: ClusterId(1),
            },
        );
        assert_eq!(
            outputs,
            vec![Output::Broadcast {
                message: Message::Beacon
            }]
        );
        assert_eq!(node_a.record().cluster_id(), Some(ClusterId(1)));
        assert_eq!(node_a.record().parent(), Some(COORD));
    }

    #[test]
    fn test_request_father_is_idempotent_at_coordinator() {
        let mut coord = coordinator();
        let first = coord.handle_message(NODE_A, COORD, Message::RequestFather);
        assert_eq!(first.len(), 1);

        // A retransmitted request must not produce a second grant or a
        // duplicate child entry.
        let second = coord.handle_message(NODE_A, COORD, Message::RequestFather);
        assert!(second.is_empty());
        assert_eq!(coord.record().child_count(), 1);
    }

    #[test]
    fn test_request_father_is_idempotent_at_device() {
        let mut node_b = attached_device(NODE_B, COORD, 1);

        let first = node_b.handle_message(NODE_D, NODE_B, Message::RequestFather);
        assert_eq!(
            first,
            vec![Output::Unicast {
                dest: COORD,
                message: Message::RequestClusterForChild(ChildGrant {
                    asker: NODE_B,
                    grandchild: NODE_D,
                })
            }]
        );
        assert_eq!(node_b.record().pending_children().count(), 1);

        let second = node_b.handle_message(NODE_D, NODE_B, Message::RequestFather);
        assert!(second.is_empty());
        assert_eq!(node_b.record().pending_children().count(), 1);
    }

    #[test]
    fn test_multi_hop_grant_scenario() {
        let mut coord = coordinator();
        let mut node_b = device(NODE_B);
        let mut node_d = device(NODE_D);

        // B attaches directly under the coordinator
        node_b.handle_message(COORD, ShortAddress::BROADCAST, Message::Beacon);
        coord.handle_message(NODE_B, COORD, Message::RequestFather);
        node_b.handle_message(
            COORD,
            NODE_B,
            Message::AcceptChild {
                cluster_id: ClusterId(1),
            },
        );

        // D answers B's beacon; B has no grant authority and asks upward
        let outputs = node_d.handle_message(NODE_B, ShortAddress::BROADCAST, Message::Beacon);
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: NODE_B,
                message: Message::RequestFather
            }]
        );
        let outputs = node_b.handle_message(NODE_D, NODE_B, Message::RequestFather);
        let grant = ChildGrant {
            asker: NODE_B,
            grandchild: NODE_D,
        };
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: COORD,
                message: Message::RequestClusterForChild(grant)
            }]
        );

        // The coordinator recognizes B as a direct child and replies only to it
        let outputs = coord.handle_message(NODE_B, COORD, Message::RequestClusterForChild(grant));
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: NODE_B,
                message: Message::ReturnClusterForChild(Some(grant))
            }]
        );

        // B matches D in its pending set and grants cluster id 2
        let outputs = node_b.handle_message(COORD, NODE_B, Message::ReturnClusterForChild(Some(grant)));
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: NODE_D,
                message: Message::AcceptChild {
                    cluster_id: ClusterId(2)
                }
            }]
        );
        assert!(node_b.record().is_child(NODE_D));
        assert_eq!(node_b.record().pending_children().count(), 0);

        // D finishes at depth 2 = its parent's depth + 1
        node_d.handle_message(
            NODE_B,
            NODE_D,
            Message::AcceptChild {
                cluster_id: ClusterId(2),
            },
        );
        assert_eq!(node_d.record().cluster_id(), Some(ClusterId(2)));
        assert_eq!(node_d.record().parent(), Some(NODE_B));
    }

    #[test]
    fn test_coordinator_floods_when_asker_is_not_a_direct_child() {
        let mut coord = coordinator();
        coord.handle_message(NODE_A, COORD, Message::RequestFather);
        coord.handle_message(NODE_B, COORD, Message::RequestFather);

        // The asker sits somewhere deeper in the tree
        let grant = ChildGrant {
            asker: ShortAddress(0x0009),
            grandchild: NODE_D,
        };
        let outputs = coord.handle_message(NODE_A, COORD, Message::RequestClusterForChild(grant));
        let dests: Vec<ShortAddress> = outputs
            .iter()
            .map(|o| match o {
                Output::Unicast { dest, message } => {
                    assert_eq!(*message, Message::ReturnClusterForChild(Some(grant)));
                    *dest
                }
                other => panic!("unexpected output {:?}", other),
            })
            .collect();
        assert_eq!(dests, vec![NODE_A, NODE_B]);
    }

    #[test]
    fn test_unmatched_approval_floods_down() {
        let mut node_b = attached_device(NODE_B, COORD, 1);
        node_b.handle_message(NODE_D, NODE_B, Message::RequestFather);
        let grant = ChildGrant {
            asker: NODE_B,
            grandchild: NODE_D,
        };
        node_b.handle_message(COORD, NODE_B, Message::ReturnClusterForChild(Some(grant)));
        assert!(node_b.record().is_child(NODE_D));

        // An approval for somebody else's child is forwarded to every
        // confirmed child, unchanged.
        let foreign = ChildGrant {
            asker: ShortAddress(0x0008),
            grandchild: ShortAddress(0x0009),
        };
        let outputs = node_b.handle_message(COORD, NODE_B, Message::ReturnClusterForChild(Some(foreign)));
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: NODE_D,
                message: Message::ReturnClusterForChild(Some(foreign))
            }]
        );
    }

    #[test]
    fn test_data_relay_chain_delivers_once() {
        let mut coord = coordinator();
        let mut node_b = attached_device(NODE_B, COORD, 1);
        let node_d = attached_device(NODE_D, NODE_B, 2);

        let payload = Bytes::from_static(b"reading 42");
        let outputs = node_d.generate_data(payload.clone());
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: NODE_B,
                message: Message::SendDataToCoordinator {
                    payload: payload.clone()
                }
            }]
        );

        // B relays unchanged toward its parent
        let outputs = node_b.handle_message(
            NODE_D,
            NODE_B,
            Message::SendDataToCoordinator {
                payload: payload.clone(),
            },
        );
        assert_eq!(
            outputs,
            vec![Output::Unicast {
                dest: COORD,
                message: Message::SendDataToCoordinator {
                    payload: payload.clone()
                }
            }]
        );

        // The coordinator terminates the relay with a single delivery
        let outputs = coord.handle_message(
            NODE_B,
            COORD,
            Message::SendDataToCoordinator {
                payload: payload.clone(),
            },
        );
        assert_eq!(outputs, vec![Output::Deliver { payload }]);
    }

    #[test]
    fn test_beacon_ignored_once_spoken_for() {
        let mut node_a = device(NODE_A);
        node_a.handle_message(COORD, ShortAddress::BROADCAST, Message::Beacon);
        let outputs = node_a.handle_message(NODE_B, ShortAddress::BROADCAST, Message::Beacon);
        assert!(outputs.is_empty());
        assert_eq!(node_a.record().parent(), Some(COORD));
    }

    #[test]
    fn test_unicast_beacon_ignored() {
        let mut node_a = device(NODE_A);
        let outputs = node_a.handle_message(COORD, NODE_A, Message::Beacon);
        assert!(outputs.is_empty());
        assert!(node_a.record().parent().is_none());
    }

    #[test]
    fn test_unattached_device_holds_beacon_and_data() {
        let node_a = device(NODE_A);
        assert!(node_a.emit_beacon().is_empty());
        assert!(node_a.generate_data(Bytes::from_static(b"x")).is_empty());

        let coord = coordinator();
        assert_eq!(coord.emit_beacon().len(), 1);
    }

    #[test]
    fn test_grant_without_own_cluster_id_leaves_requester_parked() {
        // B answered a beacon (tentative parent) but has no grant of its own
        // yet, so it cannot hand out a cluster id.
        let mut node_b = device(NODE_B);
        node_b.handle_message(COORD, ShortAddress::BROADCAST, Message::Beacon);
        node_b.handle_message(NODE_D, NODE_B, Message::RequestFather);

        let grant = ChildGrant {
            asker: NODE_B,
            grandchild: NODE_D,
        };
        let outputs = node_b.handle_message(COORD, NODE_B, Message::ReturnClusterForChild(Some(grant)));
        assert!(outputs.is_empty());
        // The requester stays parked instead of being half-confirmed
        assert!(!node_b.record().is_child(NODE_D));
        assert_eq!(node_b.record().pending_children().count(), 1);
    }

    #[test]
    fn test_denial_is_dropped() {
        let mut node_b = attached_device(NODE_B, COORD, 1);
        node_b.handle_message(NODE_D, NODE_B, Message::RequestFather);
        let outputs = node_b.handle_message(COORD, NODE_B, Message::ReturnClusterForChild(None));
        assert!(outputs.is_empty());
        // The requester stays parked
        assert_eq!(node_b.record().pending_children().count(), 1);
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        let mut coord = coordinator();
        assert!(coord.handle_frame(NODE_A, COORD, &[0x01]).is_err());
        assert_eq!(coord.record().child_count(), 0);
    }

    #[test]
    fn test_frame_round_trip_through_engine() {
        let mut coord = coordinator();
        let frame = Message::RequestFather.encode();
        let outputs = coord.handle_frame(NODE_A, COORD, &frame).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(coord.record().is_child(NODE_A));
    }
}
