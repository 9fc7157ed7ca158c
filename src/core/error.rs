use std::io;
use thiserror::Error;

/// Custom error types for the wrist display daemon
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Frame checksum mismatch: expected {expected:#06x}, received {received:#06x}")]
    FrameIntegrity {
        /// Checksum computed over the received bytes
        expected: u16,
        /// Checksum carried by the frame
        received: u16,
    },

    #[error("Payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watch unavailable after {attempts} reconnection attempts")]
    RetriesExhausted { attempts: usize },

    #[error("Link is not connected")]
    NotConnected,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Whether the error only affects a single watch and the daemon keeps running
    pub fn is_terminal_for_unit(&self) -> bool {
        matches!(self, Error::Config(_) | Error::RetriesExhausted { .. })
    }
}
