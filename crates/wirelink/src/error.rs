//! Error types.

use core::fmt;

use crate::ErrorObject;

/// Transport-level errors.
#[derive(Debug)]
pub enum TransportError {
    Closed,
    Io(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "transport closed"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// The ways a single call can fail.
///
/// Every call resolves exactly once, to a decoded result or to exactly one
/// of these. Framing problems and unmatched responses are contained inside
/// the inbound dispatcher and never show up here.
#[derive(Debug)]
pub enum CallError {
    /// The server answered with an error object; code/message/data verbatim.
    Rpc(ErrorObject),
    /// No response arrived within the caller's window.
    Timeout,
    /// Sending failed, or the transport closed while the call was pending.
    Transport(TransportError),
    /// The request could not be serialized.
    Serialize(serde_json::Error),
    /// The result payload could not be decoded into the requested type.
    /// Distinct from [`CallError::Rpc`]: the server said "ok".
    Deserialize(serde_json::Error),
    /// Internal consistency failure (e.g. a duplicate pending id).
    Internal(String),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e) => write!(f, "server error: {e}"),
            Self::Timeout => write!(f, "call timed out"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Serialize(e) => write!(f, "serialize error: {e}"),
            Self::Deserialize(e) => write!(f, "deserialize error: {e}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Serialize(e) | Self::Deserialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for CallError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
