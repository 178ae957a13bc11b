//! Error taxonomy for one command/response exchange.

use std::time::Duration;

use thiserror::Error;

/// Every way an exchange with the automation service can end badly.
///
/// Only [`RelayError::Decode`] is ever recovered from locally (the channel skips the
/// offending frame); everything else is terminal for the current invocation.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing credential or a structurally required command field.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The endpoint refused the connection or could not be reached.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The channel closed, errored or timed out before a terminal message arrived.
    #[error("channel interrupted while waiting for {request_id}: {reason}")]
    ChannelInterrupted { request_id: String, reason: String },

    /// An inbound message was not valid structured data.
    #[error("malformed message: {0}")]
    Decode(String),

    /// Polling ran past its deadline. The server-side job is left running.
    #[error("no answer for {request_id} after {elapsed:?}; it can still be queried later")]
    PollTimeout { request_id: String, elapsed: Duration },

    /// The service answered, and the answer carries an `error`.
    #[error("{action} failed: {error}")]
    RemoteReported { action: String, error: String },

    /// The service refused to enqueue the command.
    #[error("command rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Writing a message or reading an HTTP response failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RelayError {
    /// True for the condition that hands the exchange over to polling.
    pub fn is_interruption(&self) -> bool {
        matches!(self, RelayError::ChannelInterrupted { .. })
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayError::RemoteReported { .. } => 1,
            RelayError::Precondition(_) => 2,
            RelayError::Connection { .. } => 3,
            RelayError::ChannelInterrupted { .. } => 4,
            RelayError::PollTimeout { .. } => 5,
            RelayError::Decode(_) | RelayError::Rejected { .. } | RelayError::Transport(_) => 6,
        }
    }
}
