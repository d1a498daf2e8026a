use bytes::{Buf, BufMut, BytesMut};

use super::message::MessageKind;
use crate::core::{Error, Result, HEADER_LEN};

/// Cluster header codec for the fixed 2-byte message-type tag
///
/// Every frame on the wire starts with the message kind serialized as a
/// big-endian unsigned 16-bit value. The codec is pure and stateless.
#[derive(Clone, Copy, Default)]
pub struct HeaderCodec;

impl HeaderCodec {
    /// Creates a new header codec
    pub fn new() -> Self {
        HeaderCodec
    }

    /// Writes the 2-byte header for `kind` into `dst`
    pub fn encode(&self, kind: MessageKind, dst: &mut BytesMut) {
        dst.put_u16(kind.tag());
    }

    /// Reads a 2-byte header from the front of `src`
    ///
    /// Fails with [`Error::MalformedHeader`] when fewer than two bytes are
    /// available and [`Error::UnknownTag`] when the tag is outside the
    /// enumerated message set.
    pub fn decode(&self, src: &mut impl Buf) -> Result<MessageKind> {
        if src.remaining() < HEADER_LEN {
            return Err(Error::MalformedHeader {
                needed: HEADER_LEN,
                available: src.remaining(),
            });
        }
        MessageKind::from_tag(src.get_u16())
    }
}
