use crate::error::ServerError;
use shared::{DEFAULT_MAX_PARTICIPANTS, DEFAULT_ROOM_NAME, DEFAULT_TICK_MS, MOVE_SPEED};
use std::time::Duration;

/// Room-level settings, fixed for the lifetime of the room.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub name: String,
    pub max_participants: usize,
    /// Distance moved per tick at full x deflection.
    pub speed: f32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_ROOM_NAME.to_string(),
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            speed: MOVE_SPEED,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: String,
    pub room: RoomConfig,
    pub tick_interval: Duration,
    /// Sessions silent for longer than this are disconnected
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            room: RoomConfig::default(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            client_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.room.name.is_empty() {
            return Err(ServerError::InvalidConfig("room name is empty".into()));
        }
        if self.room.max_participants == 0 {
            return Err(ServerError::InvalidConfig(
                "max participants must be at least 1".into(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ServerError::InvalidConfig("tick interval must be > 0".into()));
        }
        if self.client_timeout <= self.tick_interval {
            return Err(ServerError::InvalidConfig(
                "client timeout must exceed the tick interval".into(),
            ));
        }
        if !self.room.speed.is_finite() {
            return Err(ServerError::InvalidConfig("speed must be finite".into()));
        }
        Ok(())
    }
}
