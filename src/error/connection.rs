//! # Connection Error
//! These error types are used when an error occurs within the [`Connection`].
//!
//! [`Connection`]: crate::connection::Connection
use crate::connection::queue::SendQueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionError {
    /// The connection was closed, nothing more can be sent.
    Closed,
    /// The payload could not be framed.
    Encode,
    /// The socket refused the datagram.
    Io(std::io::ErrorKind),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Closed => write!(f, "Connection closed"),
            ConnectionError::Encode => write!(f, "Failed to encode payload"),
            ConnectionError::Io(kind) => write!(f, "Socket error: {}", kind),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<SendQueueError> for ConnectionError {
    fn from(_: SendQueueError) -> Self {
        ConnectionError::Encode
    }
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e.kind())
    }
}
