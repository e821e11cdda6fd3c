//! # Position Sync Server Library
//!
//! Authoritative hub of the position-sync service. Every connected client
//! reports its own position and last input; the server keeps the latest report
//! of each client and broadcasts the combined world to everyone at a fixed
//! tick rate.
//!
//! ## Architecture
//!
//! ### Task per Connection
//! Each accepted connection gets its own [`session::ClientSession`] task that
//! runs the identity handshake, then reads reports and writes them into the
//! connection's own registry entry. A second, per-connection writer task
//! drains the connection's outbox onto the socket.
//!
//! ### Sharded Registry
//! [`registry::ConnectionRegistry`] maps connection handles to the last known
//! state. Sessions only ever touch their own entry; the broadcaster reads all
//! of them. The map is sharded, so neither side waits on a lock that spans the
//! whole world.
//!
//! ### Tick Broadcaster
//! [`broadcast::TickBroadcaster`] wakes on a fixed interval, copies the
//! registry, encodes the world once and queues the same frame for every
//! connection without blocking. A connection whose queue is still full from
//! earlier ticks is evicted instead of slowing everyone down.
//!
//! ## Failure Containment
//! Malformed or oversized messages are logged and dropped. A failed handshake
//! closes the connection before it is ever registered. A disconnect, I/O error
//! or eviction ends only the affected session, which removes its entry on the
//! way out. Only failing to bind the listener is fatal.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod session;
