//! # Position Sync Client Library
//!
//! Client side of the position-sync service: connects to the server, accepts
//! the identity it is assigned, reports local movement and keeps the latest
//! world broadcast at hand.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Buffers local input events in a bounded queue and folds them into one
//! state per client tick. A full queue drops new events instead of making the
//! producer wait on the network.
//!
//! ### Network Module (`network`)
//! Runs the handshake and then two independent tasks: one flushes the
//! coalescer at the client tick rate, sending nothing on ticks without input;
//! the other reads world broadcasts and publishes them through a watch
//! channel. Input capture and rendering stay with the caller.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::input::InputEvent;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect(ClientConfig::default()).await?;
//!     let handle = client.start();
//!
//!     handle.push(InputEvent::Key(b'w'));
//!
//!     let mut world = handle.world();
//!     world.changed().await?;
//!     println!("{} clients online", world.borrow().len());
//!
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod network;
