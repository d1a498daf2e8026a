use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::codec::HeaderCodec;
use crate::core::{ClusterId, Error, Result, ShortAddress, ADDRESS_PAIR_LEN};

/// Closed set of protocol message kinds with their wire tag values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    /// A parentless node asks a beaconing neighbor to adopt it
    RequestFather = 0x0001,
    /// A parent finalizes the relationship and assigns the cluster id
    AcceptChild = 0x0002,
    /// A prospective parent asks the coordinator to approve a new grandchild
    RequestClusterForChild = 0x0003,
    /// The coordinator's approval, relayed back down the tree
    ReturnClusterForChild = 0x0004,
    /// Broadcast advertisement inviting parentless neighbors to attach
    Beacon = 0x0005,
    /// Application data relayed hop-by-hop toward the coordinator
    SendDataToCoordinator = 0x0006,
}

impl MessageKind {
    /// All kinds, in tag order
    pub const ALL: [MessageKind; 6] = [
        MessageKind::RequestFather,
        MessageKind::AcceptChild,
        MessageKind::RequestClusterForChild,
        MessageKind::ReturnClusterForChild,
        MessageKind::Beacon,
        MessageKind::SendDataToCoordinator,
    ];

    /// Returns the 16-bit wire tag
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Maps a wire tag back to a kind
    pub fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            0x0001 => Ok(MessageKind::RequestFather),
            0x0002 => Ok(MessageKind::AcceptChild),
            0x0003 => Ok(MessageKind::RequestClusterForChild),
            0x0004 => Ok(MessageKind::ReturnClusterForChild),
            0x0005 => Ok(MessageKind::Beacon),
            0x0006 => Ok(MessageKind::SendDataToCoordinator),
            other => Err(Error::UnknownTag(other)),
        }
    }
}

/// Address pair carried by the grandchild cluster-id negotiation
///
/// `asker` is the node that wants to adopt and `grandchild` is the node
/// requesting adoption. Both travel as big-endian 2-byte addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildGrant {
    /// The prospective parent asking for approval
    pub asker: ShortAddress,
    /// The node the asker wants to adopt
    pub grandchild: ShortAddress,
}

impl ChildGrant {
    fn write(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.asker.to_bytes());
        dst.put_slice(&self.grandchild.to_bytes());
    }

    fn read(src: &mut impl Buf) -> Self {
        ChildGrant {
            asker: ShortAddress(src.get_u16()),
            grandchild: ShortAddress(src.get_u16()),
        }
    }
}

/// Protocol messages: a 2-byte header followed by a small fixed body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Empty body
    RequestFather,
    /// 1-byte body: the granted cluster id
    AcceptChild { cluster_id: ClusterId },
    /// 4-byte body: asker and grandchild addresses
    RequestClusterForChild(ChildGrant),
    /// 4-byte body, or empty when the grant is a denial
    ReturnClusterForChild(Option<ChildGrant>),
    /// Empty body
    Beacon,
    /// Opaque application payload
    SendDataToCoordinator { payload: Bytes },
}

impl Message {
    /// Returns the wire kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::RequestFather => MessageKind::RequestFather,
            Message::AcceptChild { .. } => MessageKind::AcceptChild,
            Message::RequestClusterForChild(_) => MessageKind::RequestClusterForChild,
            Message::ReturnClusterForChild(_) => MessageKind::ReturnClusterForChild,
            Message::Beacon => MessageKind::Beacon,
            Message::SendDataToCoordinator { .. } => MessageKind::SendDataToCoordinator,
        }
    }

    /// Serializes the message into a complete wire frame
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        HeaderCodec::new().encode(self.kind(), &mut dst);
        match self {
            Message::RequestFather | Message::Beacon => {}
            Message::AcceptChild { cluster_id } => dst.put_u8(cluster_id.0),
            Message::RequestClusterForChild(grant) => grant.write(&mut dst),
            Message::ReturnClusterForChild(Some(grant)) => grant.write(&mut dst),
            Message::ReturnClusterForChild(None) => {}
            Message::SendDataToCoordinator { payload } => dst.put_slice(payload),
        }
        dst.freeze()
    }

    /// Parses a complete wire frame back into a message
    ///
    /// Empty-body kinds tolerate trailing padding (the link layer may pad
    /// short frames); fixed bodies are length-checked.
    pub fn decode(frame: &[u8]) -> Result<Message> {
        let mut src = frame;
        let kind = HeaderCodec::new().decode(&mut src)?;
        match kind {
            MessageKind::RequestFather => Ok(Message::RequestFather),
            MessageKind::Beacon => Ok(Message::Beacon),
            MessageKind::AcceptChild => {
                if src.remaining() < 1 {
                    return Err(Error::TruncatedBody {
                        kind: "ACCEPT_CHILD",
                        needed: 1,
                        available: src.remaining(),
                    });
                }
                Ok(Message::AcceptChild {
                    cluster_id: ClusterId(src.get_u8()),
                })
            }
            MessageKind::RequestClusterForChild => {
                if src.remaining() < ADDRESS_PAIR_LEN {
                    return Err(Error::TruncatedBody {
                        kind: "REQUEST_CLUSTER_FOR_CHILD",
                        needed: ADDRESS_PAIR_LEN,
                        available: src.remaining(),
                    });
                }
                Ok(Message::RequestClusterForChild(ChildGrant::read(&mut src)))
            }
            MessageKind::ReturnClusterForChild => {
                // An empty body is a denial
                if src.remaining() < ADDRESS_PAIR_LEN {
                    Ok(Message::ReturnClusterForChild(None))
                } else {
                    Ok(Message::ReturnClusterForChild(Some(ChildGrant::read(
                        &mut src,
                    ))))
                }
            }
            MessageKind::SendDataToCoordinator => Ok(Message::SendDataToCoordinator {
                payload: Bytes::copy_from_slice(src),
            }),
        }
    }
}
