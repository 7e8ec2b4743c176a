use shared::ProtocolError;
use std::fmt;
use thiserror::Error;

/// Transport-assigned identity of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("room is full ({capacity} participants)")]
    RoomFull { capacity: usize },
    #[error("session {0} has already joined")]
    AlreadyJoined(SessionId),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
