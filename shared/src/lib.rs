pub mod codec;
pub mod error;
pub mod frame;
pub mod handshake;

pub use error::{BootstrapError, ConfigError, DecodeError, EncodeError, FrameError};

/// Server-assigned identity of a client. Never zero on the wire.
pub type ClientId = i64;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:3025";
pub const SERVER_TICK_MS: u64 = 30;
pub const CLIENT_TICK_MS: u64 = 30;
pub const ACK_TIMEOUT_MS: u64 = 2000;

/// Largest report frame the server accepts from a client.
pub const MAX_REPORT_SIZE: usize = 1024;
/// Largest snapshot frame a client accepts from the server.
pub const MAX_SNAPSHOT_SIZE: usize = 1 << 20;
pub const INPUT_CAPACITY: usize = 32;

/// Identifiers are drawn from `1..=MAX_CLIENT_ID`.
pub const MAX_CLIENT_ID: ClientId = 9999;

pub const SPAWN_X: i64 = -700;
pub const SPAWN_Y: i64 = -350;
pub const SPAWN_INPUT: i64 = b's' as i64;

/// Distance moved by one movement key press.
pub const MOVE_STEP: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientState {
    pub id: ClientId,
    pub x: i64,
    pub y: i64,
    pub last_input: i64,
}

impl ClientState {
    pub fn new(id: ClientId, x: i64, y: i64, last_input: i64) -> Self {
        Self {
            id,
            x,
            y,
            last_input,
        }
    }

    /// State of a client that has just been admitted and has not reported yet.
    pub fn spawn(id: ClientId) -> Self {
        Self::new(id, SPAWN_X, SPAWN_Y, SPAWN_INPUT)
    }

    pub fn with_id(self, id: ClientId) -> Self {
        Self { id, ..self }
    }
}
