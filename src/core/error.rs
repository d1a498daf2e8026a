use std::io;
use thiserror::Error;

/// Custom error types for the cluster-tree protocol
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed header: need {needed} bytes, have {available}")]
    MalformedHeader { needed: usize, available: usize },

    #[error("truncated {kind} body: need {needed} bytes, have {available}")]
    TruncatedBody {
        kind: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("unknown message tag {0:#06x}")]
    UnknownTag(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
