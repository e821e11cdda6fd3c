//! Error types shared by both ends of a connection.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// A payload that could not be turned back into client states.
///
/// Always recoverable: the offending message is logged and discarded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] bincode::Error),

    #[error("snapshot of {len} values is not a whole number of records")]
    Truncated { len: usize },

    #[error("record {record} ends with {found} instead of the separator")]
    MissingSeparator { record: usize, found: i64 },

    #[error("report carries {0} values, expected 3 or 4")]
    BadReportLength(usize),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] bincode::Error),

    #[error("payload of {0} bytes does not fit in a frame")]
    TooLarge(usize),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed by peer")]
    Closed,

    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    Oversized { len: usize, max: usize },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no handshake response within {0:?}")]
    Timeout(Duration),

    #[error("peer answered with {0} instead of the acknowledgment byte")]
    Rejected(u8),

    #[error("server assigned invalid client id {0}")]
    InvalidIdentity(i64),

    #[error("i/o error during handshake: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
