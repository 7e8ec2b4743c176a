//! Keyboard capture with change detection

use macroquad::prelude::*;
use shared::Intent;

/// Raw key states sampled once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySample {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub low_attack: bool,
    pub high_attack: bool,
}

impl KeySample {
    pub fn from_keyboard() -> Self {
        Self {
            left: is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::Right),
            up: is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::Down),
            low_attack: is_key_down(KeyCode::Space),
            high_attack: is_key_down(KeyCode::X),
        }
    }
}

fn axis(negative: bool, positive: bool) -> i8 {
    match (negative, positive) {
        (true, false) => -1,
        (false, true) => 1,
        _ => 0,
    }
}

/// Maps sampled keys onto the wire intent. Opposing keys cancel out; up is
/// the negative y direction, which the server reads as a jump.
pub fn intent_from_keys(keys: KeySample) -> Intent {
    Intent::new(
        axis(keys.left, keys.right),
        axis(keys.up, keys.down),
        keys.low_attack as u8,
        keys.high_attack as u8,
    )
}

/// Tracks the last intent handed to the network so only changes are sent.
#[derive(Debug, Default)]
pub struct InputManager {
    last_sent: Option<Intent>,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the intent to send, or `None` when nothing changed.
    pub fn update(&mut self, keys: KeySample) -> Option<Intent> {
        let intent = intent_from_keys(keys);
        if self.last_sent == Some(intent) {
            return None;
        }
        self.last_sent = Some(intent);
        Some(intent)
    }

    pub fn current(&self) -> Intent {
        self.last_sent.unwrap_or(Intent::ZERO)
    }

    /// Forgets what was sent, so the next update resends (after a reconnect).
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        let keys = KeySample {
            right: true,
            up: true,
            high_attack: true,
            ..KeySample::default()
        };
        assert_eq!(intent_from_keys(keys), Intent::new(1, -1, 0, 1));

        let keys = KeySample {
            left: true,
            right: true,
            down: true,
            low_attack: true,
            ..KeySample::default()
        };
        assert_eq!(intent_from_keys(keys), Intent::new(0, 1, 1, 0));
        assert!(intent_from_keys(keys).validate().is_ok());
    }

    #[test]
    fn test_only_changes_are_sent() {
        let mut input = InputManager::new();
        let idle = KeySample::default();
        let moving = KeySample {
            left: true,
            ..KeySample::default()
        };

        assert_eq!(input.update(idle), Some(Intent::ZERO));
        assert_eq!(input.update(idle), None);
        assert_eq!(input.update(moving), Some(Intent::new(-1, 0, 0, 0)));
        assert_eq!(input.update(moving), None);
        assert_eq!(input.current(), Intent::new(-1, 0, 0, 0));

        input.reset();
        assert_eq!(input.update(moving), Some(Intent::new(-1, 0, 0, 0)));
    }
}
