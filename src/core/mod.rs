//! Core types and traits for the cluster-tree protocol
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod error;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{ClusterId, NodeRole, ShortAddress};

/// Length of the cluster header on the wire
pub const HEADER_LEN: usize = 2;

/// Length of an address-pair message body (two 2-byte addresses)
pub const ADDRESS_PAIR_LEN: usize = 4;
