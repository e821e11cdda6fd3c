//! Server side of one client connection
//!
//! A session moves through `Bootstrapping -> Active -> Closed`:
//! - bootstrapping assigns a client id and waits for the acknowledgment; a
//!   connection that fails here never touches the registry
//! - active sessions register the spawn state, start a writer task for the
//!   connection's outbox and apply every decoded report to their own entry
//! - closing removes the entry before the connection is released
//!
//! Decode failures and oversized frames are logged and skipped. Only the end
//! of the stream, an I/O error, eviction by the broadcaster or server
//! shutdown end an active session.

use crate::broadcast::{Frame, Outbox};
use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use log::{debug, info, warn};
use shared::codec::decode_report;
use shared::frame::read_frame;
use shared::handshake::offer_identity;
use shared::{ClientId, ClientState, FrameError};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Bootstrapping,
    Active,
    Closed,
}

/// Why an active session ended.
#[derive(Debug)]
pub enum CloseReason {
    PeerClosed,
    Io(io::Error),
    /// The broadcaster or the writer task gave up on the connection.
    Evicted,
    Shutdown,
    /// The entry disappeared underneath the session.
    Unregistered,
}

/// Removes the registry entry when dropped, including when the session task
/// is aborted.
struct Registration {
    registry: Arc<ConnectionRegistry>,
    handle: ConnectionHandle,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.handle);
    }
}

pub struct ClientSession {
    handle: ConnectionHandle,
    registry: Arc<ConnectionRegistry>,
    config: Arc<ServerConfig>,
    state: SessionState,
    shutdown: CancellationToken,
    /// Child of `shutdown`; also cancelled on eviction
    token: CancellationToken,
}

impl ClientSession {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        config: Arc<ServerConfig>,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            handle: registry.allocate_handle(),
            registry,
            config,
            state: SessionState::Bootstrapping,
            shutdown: shutdown.clone(),
            token: shutdown.child_token(),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drives the connection until it closes.
    ///
    /// Returns an error only if the connection was never admitted.
    pub async fn run<S>(mut self, mut stream: S) -> Result<CloseReason, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let id = self.bootstrap(&mut stream).await?;

        let (outbox, frames) = Outbox::new(self.config.outbox_capacity, self.token.clone());
        if let Err(e) = self
            .registry
            .register(self.handle, ClientState::spawn(id), outbox)
        {
            self.registry.release_id(id);
            self.state = SessionState::Closed;
            return Err(e.into());
        }
        let registration = Registration {
            registry: Arc::clone(&self.registry),
            handle: self.handle,
        };
        self.state = SessionState::Active;
        info!("Client {} admitted as {}", id, self.handle);

        let (reader, writer) = tokio::io::split(stream);
        let writer_task = tokio::spawn(write_loop(
            writer,
            frames,
            self.token.clone(),
            self.config.write_timeout,
        ));

        let reason = self.read_loop(reader, id).await;

        self.state = SessionState::Closed;
        drop(registration);
        self.token.cancel();
        if let Err(e) = writer_task.await {
            warn!("Writer task of {} failed: {}", self.handle, e);
        }

        info!("Client {} disconnected ({:?})", id, reason);
        Ok(reason)
    }

    async fn bootstrap<S>(&mut self, stream: &mut S) -> Result<ClientId, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let id = match self.registry.reserve_id() {
            Some(id) => id,
            None => {
                self.state = SessionState::Closed;
                return Err(SessionError::ServerFull);
            }
        };

        match offer_identity(stream, id, self.config.ack_timeout).await {
            Ok(()) => Ok(id),
            Err(e) => {
                self.registry.release_id(id);
                self.state = SessionState::Closed;
                Err(e.into())
            }
        }
    }

    async fn read_loop<R>(&self, mut reader: R, id: ClientId) -> CloseReason
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let frame = tokio::select! {
                _ = self.token.cancelled() => {
                    return if self.shutdown.is_cancelled() {
                        CloseReason::Shutdown
                    } else {
                        CloseReason::Evicted
                    };
                }
                frame = read_frame(&mut reader, self.config.max_message_size) => frame,
            };

            let payload = match frame {
                Ok(payload) => payload,
                Err(FrameError::Closed) => return CloseReason::PeerClosed,
                Err(FrameError::Io(e)) => return CloseReason::Io(e),
                Err(e @ FrameError::Oversized { .. }) => {
                    warn!("Discarding message from client {}: {}", id, e);
                    continue;
                }
            };

            match decode_report(&payload) {
                Ok(Some(report)) => {
                    if let Err(e) = self.registry.update(self.handle, report.with_id(id)) {
                        debug!("Stopping session of client {}: {}", id, e);
                        return CloseReason::Unregistered;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Discarding message from client {}: {}", id, e),
            }
        }
    }
}

/// Drains the outbox onto the connection, one bounded write per frame.
async fn write_loop<W>(
    mut writer: W,
    mut frames: mpsc::Receiver<Frame>,
    token: CancellationToken,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let write = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };
        match timeout(write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Write failed: {}", e);
                token.cancel();
                break;
            }
            Err(_) => {
                warn!("Write did not complete within {:?}", write_timeout);
                token.cancel();
                break;
            }
        }
    }

    let _ = timeout(write_timeout, writer.shutdown()).await;
}
