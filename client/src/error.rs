use shared::{BootstrapError, ConfigError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("handshake failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
