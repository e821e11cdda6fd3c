//! Identity handshake run once on every new connection.
//!
//! The server writes the assigned id as a big-endian `i64`; the client
//! confirms with the single byte [`ACK`]. Only after that exchange is the
//! connection admitted to the broadcast set.

use crate::error::BootstrapError;
use crate::ClientId;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

pub const ACK: u8 = 1;

/// Server side: send `id` and wait up to `ack_timeout` for the acknowledgment.
pub async fn offer_identity<S>(
    stream: &mut S,
    id: ClientId,
    ack_timeout: Duration,
) -> Result<(), BootstrapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_i64(id).await?;
    stream.flush().await?;

    let ack = timeout(ack_timeout, stream.read_u8())
        .await
        .map_err(|_| BootstrapError::Timeout(ack_timeout))??;

    if ack != ACK {
        return Err(BootstrapError::Rejected(ack));
    }
    Ok(())
}

/// Client side: receive the assigned id and acknowledge it.
pub async fn accept_identity<S>(
    stream: &mut S,
    id_timeout: Duration,
) -> Result<ClientId, BootstrapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = timeout(id_timeout, stream.read_i64())
        .await
        .map_err(|_| BootstrapError::Timeout(id_timeout))??;

    if id <= 0 {
        return Err(BootstrapError::InvalidIdentity(id));
    }

    stream.write_u8(ACK).await?;
    stream.flush().await?;
    Ok(id)
}
