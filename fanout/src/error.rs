use std::error::Error as StdError;
use std::fmt;

/// Failures talking to the fanout channel. None of these are fatal to the
/// caller: a publish that fails only costs the live push, the stored
/// notification is still there.
#[derive(Debug)]
pub enum Error {
    /// Could not establish a connection to the broker
    Connection(String),
    /// The broker refused or dropped a published message
    Publish(String),
    /// Subscribing to a topic failed
    Subscribe(String),
    /// An event could not be encoded, or a received payload decoded
    Serialization(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connection(msg) => write!(f, "Fanout connection error: {msg}"),
            Error::Publish(msg) => write!(f, "Fanout publish error: {msg}"),
            Error::Subscribe(msg) => write!(f, "Fanout subscribe error: {msg}"),
            Error::Serialization(err) => write!(f, "Fanout serialization error: {err}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}
