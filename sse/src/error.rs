use crate::connection::ConnectionId;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The `connected` message could not be queued, so the connection never went live
    HandshakeFailed(ConnectionId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::HandshakeFailed(id) => write!(f, "SSE handshake failed for connection {id}"),
        }
    }
}

impl StdError for Error {}
