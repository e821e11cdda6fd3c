//! Server network layer: accepts connections and wires up the tasks

use crate::broadcast::TickBroadcaster;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::ConnectionRegistry;
use crate::session::ClientSession;
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Main server coordinating the accept loop, sessions and broadcaster
pub struct Server {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: Arc::new(ConnectionRegistry::new()),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Cancelling the token stops the accept loop, the broadcaster and every
    /// session.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts connections until shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        let broadcaster = TickBroadcaster::new(Arc::clone(&self.registry), self.config.tick_interval);
        let broadcast_task = tokio::spawn(broadcaster.run(self.shutdown.clone()));

        info!(
            "Server started, broadcasting every {:?}",
            self.config.tick_interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_session(stream, addr),
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        if let Err(e) = broadcast_task.await {
            warn!("Broadcaster task failed: {}", e);
        }
        info!("Server shutting down");
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Cannot disable Nagle for {}: {}", addr, e);
        }

        let session = ClientSession::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            &self.shutdown,
        );
        info!("New connection from {} ({})", addr, session.handle());

        tokio::spawn(async move {
            if let Err(e) = session.run(stream).await {
                warn!("Connection from {} rejected: {}", addr, e);
            }
        });
    }
}
