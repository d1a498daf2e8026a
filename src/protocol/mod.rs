//! Protocol implementation module
//!
//! This module defines the cluster-tree wire messages, encoding/decoding,
//! the per-node routing record, and the protocol engine.

pub mod codec;
pub mod engine;
pub mod message;
pub mod routing;

pub use self::codec::HeaderCodec;
pub use self::engine::{Engine, Output};
pub use self::message::{ChildGrant, Message, MessageKind};
pub use self::routing::RoutingRecord;
