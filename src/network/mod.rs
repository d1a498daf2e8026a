//! Link/transport adapter module
//!
//! The protocol core never reaches into transport internals; it depends only
//! on this seam. An external MAC layer (or the in-crate simulator) implements
//! [`Transport`], and [`dispatch`] moves engine outputs onto it.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::ShortAddress;
use crate::protocol::Output;

/// Best-effort send primitives provided by the underlying transport
///
/// Sends may silently fail; failure is observable only through the
/// send-confirmation callback, which the protocol logs and never retries.
pub trait Transport {
    /// Sends a frame to a single peer
    fn unicast(&mut self, source: ShortAddress, dest: ShortAddress, frame: Bytes);

    /// Sends a frame to every neighbor in range
    fn broadcast(&mut self, source: ShortAddress, frame: Bytes);
}

/// Outcome reported by the transport for one send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// The frame left the radio (and, for unicast, was acknowledged)
    Success,
    /// No acknowledgement from the destination
    NoAck,
    /// The destination address was the null sentinel or unknown
    InvalidAddress,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStatus::Success => write!(f, "SUCCESS"),
            TxStatus::NoAck => write!(f, "NO_ACK"),
            TxStatus::InvalidAddress => write!(f, "INVALID_ADDRESS"),
        }
    }
}

/// Send-confirmation callback: logged only, never retried
pub fn log_confirm(source: ShortAddress, status: TxStatus) {
    match status {
        TxStatus::Success => debug!("{} data confirm: {}", source, status),
        _ => warn!("{} data confirm: {}", source, status),
    }
}

/// Encodes engine outputs onto the transport
///
/// Returns the payloads the engine handed up to the application layer, so the
/// caller owns delivery bookkeeping.
pub fn dispatch(
    source: ShortAddress,
    outputs: Vec<Output>,
    transport: &mut impl Transport,
) -> Vec<Bytes> {
    let mut delivered = Vec::new();
    for output in outputs {
        match output {
            Output::Unicast { dest, message } => {
                transport.unicast(source, dest, message.encode());
            }
            Output::Broadcast { message } => {
                transport.broadcast(source, message.encode());
            }
            Output::Deliver { payload } => delivered.push(payload),
        }
    }
    delivered
}
