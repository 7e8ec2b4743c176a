//! The single shared room: sessions, intents, store and simulation together
//!
//! `Room` is synchronous and owns no sockets. The network layer drives it
//! from one event loop, which is what serializes join, leave and tick.

use crate::config::RoomConfig;
use crate::error::{SessionError, SessionId};
use crate::game::Simulation;
use crate::intent::IntentBuffer;
use crate::session::SessionManager;
use crate::store::StateStore;
use shared::{Intent, ParticipantId, ParticipantState, ProtocolError, Snapshot, StateDiff};
use std::net::SocketAddr;
use std::sync::Arc;

/// What a newly admitted session is told.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinAck {
    pub identity: ParticipantId,
    pub snapshot: Snapshot,
}

pub struct Room {
    config: RoomConfig,
    sessions: SessionManager,
    store: StateStore,
    intents: Arc<IntentBuffer>,
    simulation: Simulation,
}

impl Room {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            sessions: SessionManager::new(config.max_participants),
            store: StateStore::new(),
            intents: Arc::new(IntentBuffer::new()),
            simulation: Simulation::new(config.speed),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Handle for connection tasks to write intents without going through the
    /// event loop.
    pub fn intents(&self) -> Arc<IntentBuffer> {
        Arc::clone(&self.intents)
    }

    pub fn join(&mut self, session: SessionId, addr: SocketAddr) -> Result<JoinAck, SessionError> {
        let identity = self.sessions.join(session, addr, &mut self.store)?.identity;
        self.intents.register(identity);
        Ok(JoinAck {
            identity,
            snapshot: self.snapshot(),
        })
    }

    /// Removes the session's participant. Returns its identity, or `None`
    /// when the session had already left (or never joined).
    pub fn leave(&mut self, session: SessionId) -> Option<ParticipantId> {
        let removed = self.sessions.leave(session, &mut self.store)?;
        self.intents.remove(removed.identity);
        Some(removed.identity)
    }

    pub fn submit_input(&self, identity: ParticipantId, intent: Intent) -> Result<bool, ProtocolError> {
        self.intents.set_intent(identity, intent)
    }

    /// Advances the simulation by one step and returns the diff to broadcast.
    pub fn tick(&mut self) -> StateDiff {
        self.simulation.step(&mut self.store, &self.intents);
        self.store.flush(self.simulation.tick())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot(self.simulation.tick())
    }

    pub fn current_tick(&self) -> u32 {
        self.simulation.tick()
    }

    pub fn participant(&self, identity: ParticipantId) -> Option<&ParticipantState> {
        self.store.get(identity)
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantState> {
        self.store.participants()
    }

    pub fn identity_of(&self, session: SessionId) -> Option<ParticipantId> {
        self.sessions.identity_of(session)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.session_ids()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{ActionState, FieldId, Vec3};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn test_two_player_scenario() {
        let mut room = Room::default();

        let a = room.join(SessionId(1), test_addr()).unwrap();
        assert_eq!(a.identity, 1);
        assert_eq!(a.snapshot.entities(), vec![1]);
        let p = room.participant(1).unwrap();
        assert_eq!(p.position, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(p.action_state, ActionState::Idle);

        let b = room.join(SessionId(2), test_addr()).unwrap();
        assert_eq!(b.identity, 2);
        assert_eq!(b.snapshot.entities(), vec![1, 2]);
        assert_eq!(room.participant(2).unwrap().position, Vec3::new(1.0, 0.0, 0.0));

        room.submit_input(1, Intent::new(1, 0, 0, 0)).unwrap();
        for _ in 0..5 {
            room.tick();
        }
        assert_approx_eq!(room.participant(1).unwrap().position.x, -0.5, 1e-5);
        assert_eq!(room.participant(2).unwrap().position, Vec3::new(1.0, 0.0, 0.0));

        room.submit_input(2, Intent::new(0, 0, 1, 0)).unwrap();
        let diff = room.tick();
        assert_eq!(room.participant(2).unwrap().action_state, ActionState::LowAttack);
        assert!(diff
            .changes
            .iter()
            .any(|c| c.entity == 2 && c.field == FieldId::ActionState));

        assert_eq!(room.leave(SessionId(2)), Some(2));
        let diff = room.tick();
        assert!(diff.changes.iter().all(|c| c.entity != 2));
        assert_eq!(diff.removed, vec![2]);
        assert!(room.participant(2).is_none());
    }

    #[test]
    fn test_room_full_leaves_state_unchanged() {
        let mut room = Room::new(RoomConfig {
            max_participants: 1,
            ..RoomConfig::default()
        });
        room.join(SessionId(1), test_addr()).unwrap();
        room.tick();

        let err = room.join(SessionId(2), test_addr()).unwrap_err();
        assert_eq!(err, SessionError::RoomFull { capacity: 1 });
        assert_eq!(room.len(), 1);
        assert!(room.tick().is_empty());
        assert_eq!(room.snapshot().entities(), vec![1]);
    }

    #[test]
    fn test_input_after_leave_is_noop() {
        let mut room = Room::default();
        room.join(SessionId(1), test_addr()).unwrap();
        room.leave(SessionId(1));

        assert!(!room.submit_input(1, Intent::new(1, 0, 0, 0)).unwrap());
        assert_eq!(room.leave(SessionId(1)), None);
        assert!(room.is_empty());
    }

    #[test]
    fn test_malformed_input_keeps_previous_intent() {
        let mut room = Room::default();
        room.join(SessionId(1), test_addr()).unwrap();
        room.submit_input(1, Intent::new(1, 0, 0, 0)).unwrap();
        assert!(room.submit_input(1, Intent::new(3, 0, 0, 0)).is_err());

        room.tick();
        assert_approx_eq!(room.participant(1).unwrap().position.x, -0.9, 1e-5);
    }

    #[test]
    fn test_first_diff_announces_new_participants() {
        let mut room = Room::default();
        room.join(SessionId(1), test_addr()).unwrap();
        let diff = room.tick();
        assert_eq!(diff.tick, 1);
        assert!(diff.changes.iter().any(|c| c.field == FieldId::DisplayName));
    }
}
