//! Per-participant latest input, shared between connection tasks and the tick
//!
//! Writers overwrite; there is no queue. The whole map sits behind one mutex
//! so a participant's four fields are always replaced together and the tick
//! can copy every intent in a single critical section.

use log::debug;
use parking_lot::Mutex;
use shared::{Intent, ParticipantId, ProtocolError};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct IntentBuffer {
    intents: Mutex<HashMap<ParticipantId, Intent>>,
}

impl IntentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a slot for a newly admitted participant, starting at the zero intent.
    pub fn register(&self, identity: ParticipantId) {
        self.intents.lock().insert(identity, Intent::ZERO);
    }

    pub fn remove(&self, identity: ParticipantId) {
        self.intents.lock().remove(&identity);
    }

    /// Overwrites the stored intent (last write wins).
    ///
    /// Out-of-range values are rejected before anything is stored. Returns
    /// `Ok(false)` when the identity has no slot, which happens when input
    /// races with a leave.
    pub fn set_intent(&self, identity: ParticipantId, intent: Intent) -> Result<bool, ProtocolError> {
        intent.validate()?;

        match self.intents.lock().get_mut(&identity) {
            Some(slot) => {
                *slot = intent;
                Ok(true)
            }
            None => {
                debug!("Dropping input for unknown participant {}", identity);
                Ok(false)
            }
        }
    }

    /// Most recent intent, or the zero intent if none was ever received.
    pub fn read_intent(&self, identity: ParticipantId) -> Intent {
        self.intents
            .lock()
            .get(&identity)
            .copied()
            .unwrap_or(Intent::ZERO)
    }

    /// Copies every intent at once so a tick sees one consistent view.
    pub fn snapshot(&self) -> HashMap<ParticipantId, Intent> {
        self.intents.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.intents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_unread_intent_is_zero() {
        let buffer = IntentBuffer::new();
        assert_eq!(buffer.read_intent(1), Intent::ZERO);
        buffer.register(1);
        assert_eq!(buffer.read_intent(1), Intent::ZERO);
    }

    #[test]
    fn test_last_write_wins() {
        let buffer = IntentBuffer::new();
        buffer.register(1);

        buffer.set_intent(1, Intent::new(1, 0, 0, 0)).unwrap();
        buffer.set_intent(1, Intent::new(-1, 1, 0, 1)).unwrap();

        assert_eq!(buffer.read_intent(1), Intent::new(-1, 1, 0, 1));
    }

    #[test]
    fn test_invalid_intent_does_not_mutate() {
        let buffer = IntentBuffer::new();
        buffer.register(1);
        buffer.set_intent(1, Intent::new(1, 0, 0, 0)).unwrap();

        let result = buffer.set_intent(1, Intent::new(2, 0, 0, 0));
        assert!(matches!(result, Err(ProtocolError::InvalidIntent { .. })));
        assert_eq!(buffer.read_intent(1), Intent::new(1, 0, 0, 0));
    }

    #[test]
    fn test_unknown_identity_is_noop() {
        let buffer = IntentBuffer::new();
        assert!(!buffer.set_intent(9, Intent::new(1, 0, 0, 0)).unwrap());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_remove_drops_slot() {
        let buffer = IntentBuffer::new();
        buffer.register(1);
        buffer.set_intent(1, Intent::new(0, -1, 0, 0)).unwrap();
        buffer.remove(1);

        assert_eq!(buffer.read_intent(1), Intent::ZERO);
        assert!(!buffer.set_intent(1, Intent::new(1, 0, 0, 0)).unwrap());
    }

    #[test]
    fn test_concurrent_writers_never_tear() {
        let buffer = Arc::new(IntentBuffer::new());
        buffer.register(1);

        let a = Intent::new(1, 1, 1, 1);
        let b = Intent::new(-1, -1, 0, 0);

        let writers: Vec<_> = [a, b]
            .into_iter()
            .map(|intent| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        buffer.set_intent(1, intent).unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..10_000 {
            let seen = buffer.snapshot()[&1];
            assert!(seen == a || seen == b || seen == Intent::ZERO);
        }

        for writer in writers {
            writer.join().unwrap();
        }
    }
}
