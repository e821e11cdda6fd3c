use shared::{ConfigError, ACK_TIMEOUT_MS, DEFAULT_SERVER_ADDR, MAX_REPORT_SIZE, SERVER_TICK_MS};
use std::time::Duration;

pub const WRITE_TIMEOUT_MS: u64 = 100;
pub const OUTBOX_CAPACITY: usize = 4;

/// Runtime settings of the server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to, `host:port`.
    pub listen_addr: String,
    /// Interval between two world broadcasts.
    pub tick_interval: Duration,
    /// Largest inbound frame; bigger frames are discarded.
    pub max_message_size: usize,
    /// How long a new connection may take to acknowledge its id.
    pub ack_timeout: Duration,
    /// Upper bound for writing one frame to a connection.
    pub write_timeout: Duration,
    /// Broadcast frames a connection may have queued before it counts as stalled.
    pub outbox_capacity: usize,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Zero("tick interval"));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Zero("max message size"));
        }
        if self.ack_timeout.is_zero() {
            return Err(ConfigError::Zero("ack timeout"));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::Zero("write timeout"));
        }
        if self.outbox_capacity == 0 {
            return Err(ConfigError::Zero("outbox capacity"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_SERVER_ADDR.to_string(),
            tick_interval: Duration::from_millis(SERVER_TICK_MS),
            max_message_size: MAX_REPORT_SIZE,
            ack_timeout: Duration::from_millis(ACK_TIMEOUT_MS),
            write_timeout: Duration::from_millis(WRITE_TIMEOUT_MS),
            outbox_capacity: OUTBOX_CAPACITY,
        }
    }
}
