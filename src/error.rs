//! Error types for dump and load passes
//!
//! Races against concurrent writers are recovered inside the snapshot reader
//! and never surface here. Every variant below aborts the running pass.

use crate::literal::quote_bytes;
use crate::protocol::RespError;
use bytes::Bytes;
use std::io;
use thiserror::Error;

/// Result type alias for ferrumdl operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The store reported a value kind no registered codec handles
    #[error("Unknown key type: {0}")]
    UnknownType(String),

    /// A key kept changing under the snapshot reader until retries ran out
    #[error("Key {} is being concurrently modified", quote_bytes(.key))]
    ConcurrentModification { key: Bytes },

    /// Textual input is not a well-formed literal of the dump grammar
    #[error("Parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A literal parsed fine but does not describe a valid record
    #[error("Invalid record for key {}: {reason}", quote_bytes(.key))]
    InvalidRecord { key: Bytes, reason: String },

    /// The server answered with an error reply
    #[error("Server error: {0}")]
    Server(String),

    /// The server answered with a reply of the wrong shape
    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },

    /// Malformed RESP data on the wire
    #[error("Protocol error: {0}")]
    Protocol(#[from] RespError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server closed the connection mid-reply
    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_record(key: &Bytes, reason: impl Into<String>) -> Self {
        Error::InvalidRecord {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unexpected(command: &'static str, reply: &crate::protocol::RespValue) -> Self {
        match reply {
            crate::protocol::RespValue::Error(e) => Error::Server(e.clone()),
            other => Error::UnexpectedReply {
                command,
                reply: other.to_string(),
            },
        }
    }
}
