use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::input::{InputCoalescer, InputEvent, InputSender};
use log::{debug, error, info, warn};
use shared::codec::{decode_snapshot, encode_report};
use shared::frame::{read_frame, write_frame};
use shared::handshake::accept_identity;
use shared::{ClientId, ClientState, FrameError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A connection that has completed the handshake but not started its tasks.
pub struct Client {
    id: ClientId,
    stream: TcpStream,
    config: ClientConfig,
}

impl Client {
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        info!("Connecting to server at {}...", config.server_addr);

        let mut stream = TcpStream::connect(&config.server_addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: config.server_addr.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let id = accept_identity(&mut stream, config.ack_timeout).await?;
        info!("Connected! Client ID: {}", id);

        Ok(Client { id, stream, config })
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Spawns the flush and inbound tasks and hands back the controls.
    pub fn start(self) -> ClientHandle {
        let (reader, writer) = self.stream.into_split();
        let (input, coalescer) =
            InputCoalescer::new(ClientState::spawn(self.id), self.config.input_capacity);
        let (world_tx, world) = watch::channel(Vec::new());
        let shutdown = CancellationToken::new();

        let flush_task = tokio::spawn(flush_loop(
            writer,
            coalescer,
            self.config.tick_interval,
            shutdown.clone(),
        ));
        let inbound_task = tokio::spawn(inbound_loop(
            reader,
            self.config.max_message_size,
            world_tx,
            shutdown.clone(),
        ));

        ClientHandle {
            id: self.id,
            input,
            world,
            shutdown,
            tasks: vec![flush_task, inbound_task],
        }
    }
}

/// Controls of a running client.
pub struct ClientHandle {
    id: ClientId,
    input: InputSender,
    world: watch::Receiver<Vec<ClientState>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queues a local event for the next report. `false` if it was dropped.
    pub fn push(&self, event: InputEvent) -> bool {
        self.input.push(event)
    }

    pub fn input(&self) -> InputSender {
        self.input.clone()
    }

    /// Latest world received from the server.
    pub fn world(&self) -> watch::Receiver<Vec<ClientState>> {
        self.world.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once the connection is lost or shut down.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!("Client task failed: {}", e);
            }
        }
    }
}

/// Dropping the handle stops both tasks without waiting for them.
impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Sends one coalesced report per client tick in which input happened.
async fn flush_loop(
    mut writer: OwnedWriteHalf,
    mut coalescer: InputCoalescer,
    tick_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            _ = ticker.tick() => {
                let Some(state) = coalescer.flush() else {
                    continue;
                };

                let sent = match encode_report(&state) {
                    Ok(payload) => write_frame(&mut writer, &payload).await,
                    Err(e) => {
                        error!("Error encoding report: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sent {
                    error!("Error sending report: {}", e);
                    shutdown.cancel();
                    break;
                }
            }
        }
    }

    let _ = writer.shutdown().await;
}

/// Publishes every world broadcast received from the server.
async fn inbound_loop(
    mut reader: OwnedReadHalf,
    max_message_size: usize,
    world: watch::Sender<Vec<ClientState>>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = read_frame(&mut reader, max_message_size) => frame,
        };

        match frame {
            Ok(payload) => match decode_snapshot(&payload) {
                Ok(snapshot) => {
                    debug!("World: {:?}", snapshot);
                    world.send_replace(snapshot);
                }
                Err(e) => warn!("Discarding broadcast: {}", e),
            },
            Err(e @ FrameError::Oversized { .. }) => warn!("Discarding broadcast: {}", e),
            Err(FrameError::Closed) => {
                info!("Server closed the connection");
                shutdown.cancel();
                break;
            }
            Err(FrameError::Io(e)) => {
                error!("Error receiving broadcast: {}", e);
                shutdown.cancel();
                break;
            }
        }
    }
}
