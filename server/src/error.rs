use crate::registry::ConnectionHandle;
use shared::{BootstrapError, ConfigError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection has already been removed; treat it as disconnected.
    #[error("{0} is not registered")]
    UnknownConnection(ConnectionHandle),

    #[error("{0} is already registered")]
    AlreadyRegistered(ConnectionHandle),
}

/// A broadcast frame that could not be queued for a connection this tick.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryFailure {
    #[error("outbound queue is full")]
    Stalled,

    #[error("connection is closing")]
    Closed,
}

/// Reasons a connection never reached the active state.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("no client ids left to assign")]
    ServerFull,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
