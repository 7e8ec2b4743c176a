use crate::network::ClientError;
use shared::{DEFAULT_ROOM_NAME, INTERPOLATION_FACTOR};
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address to connect to
    pub server: String,
    pub room: String,
    pub width: usize,
    pub height: usize,
    /// Fraction of the remaining distance covered per rendered frame
    pub interpolation_factor: f32,
    pub heartbeat_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            room: DEFAULT_ROOM_NAME.to_string(),
            width: 800,
            height: 600,
            interpolation_factor: INTERPOLATION_FACTOR,
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.room.is_empty() {
            return Err(ClientError::InvalidConfig("room name is empty".into()));
        }
        if !(self.interpolation_factor > 0.0 && self.interpolation_factor <= 1.0) {
            return Err(ClientError::InvalidConfig(format!(
                "interpolation factor must be in (0, 1], got {}",
                self.interpolation_factor
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ClientError::InvalidConfig("window size must be non-zero".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ClientError::InvalidConfig("heartbeat interval must be > 0".into()));
        }
        Ok(())
    }
}
