use shared::{
    ConfigError, ACK_TIMEOUT_MS, CLIENT_TICK_MS, DEFAULT_SERVER_ADDR, INPUT_CAPACITY,
    MAX_SNAPSHOT_SIZE,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    /// Interval between two coalesced reports.
    pub tick_interval: Duration,
    /// Largest accepted broadcast frame.
    pub max_message_size: usize,
    /// Input events buffered between flushes before new ones are dropped.
    pub input_capacity: usize,
    /// How long to wait for the server to assign an id.
    pub ack_timeout: Duration,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Zero("tick interval"));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Zero("max message size"));
        }
        if self.input_capacity == 0 {
            return Err(ConfigError::Zero("input capacity"));
        }
        if self.ack_timeout.is_zero() {
            return Err(ConfigError::Zero("ack timeout"));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            tick_interval: Duration::from_millis(CLIENT_TICK_MS),
            max_message_size: MAX_SNAPSHOT_SIZE,
            input_capacity: INPUT_CAPACITY,
            ack_timeout: Duration::from_millis(ACK_TIMEOUT_MS),
        }
    }
}
