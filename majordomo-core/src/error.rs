/// Majordomo Error Types
///
/// Error handling for broker, client and worker operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Majordomo operations
#[derive(Error, Debug)]
pub enum MajordomoError {
    /// IO error during transport operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error in an MDP frame list
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Channel send error
    #[error("Channel send error")]
    ChannelSend,

    /// Channel receive error
    #[error("Channel receive error")]
    ChannelRecv,

    /// Socket closed
    #[error("Socket closed")]
    SocketClosed,

    /// A request is already outstanding on this client
    #[error("Request already outstanding")]
    InvalidState,

    /// No reply arrived within the requested window
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// The broker sent an explicit DISCONNECT
    #[error("Disconnected by broker")]
    Disconnected,

    /// The broker missed too many heartbeat intervals in a row
    #[error("Broker heartbeat lost")]
    HeartbeatLost,
}

/// Result type alias for Majordomo operations
pub type Result<T> = std::result::Result<T, MajordomoError>;

impl MajordomoError {
    /// Create a protocol error with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Check if this error means the peer or transport is gone
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::SocketClosed
                | Self::ChannelSend
                | Self::ChannelRecv
                | Self::Disconnected
                | Self::HeartbeatLost
        )
    }
}
