//! Session lifecycle and admission control for the room
//!
//! This module handles the server-side management of joined sessions:
//! - Admission against the room capacity
//! - Identity assignment and spawn placement for the backing participant
//! - Idempotent removal when a session leaves or its connection drops
//!
//! Admission is only ever performed from the server's single event loop, so
//! identity assignment and spawning happen as one step and two joins can
//! never observe the same admitted count.

use crate::error::{SessionError, SessionId};
use crate::store::StateStore;
use log::info;
use shared::{ParticipantId, ParticipantState, Vec3};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

/// A connected session and the participant it controls
#[derive(Debug, Clone)]
pub struct Session {
    /// Identifier assigned by the transport when the connection was accepted
    pub id: SessionId,
    /// Identity of the backing participant
    pub identity: ParticipantId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    pub joined_at: Instant,
}

/// Spawn point for a participant: identity 1 starts on the left, everyone
/// else on the right.
///
/// More than two simultaneous participants therefore overlap at spawn.
pub fn spawn_position(identity: ParticipantId) -> Vec3 {
    let x = if identity == 1 { -1.0 } else { 1.0 };
    Vec3::new(x, 0.0, 0.0)
}

/// Manages all joined sessions
///
/// Identities are handed out as 1 + the number of participants admitted
/// before, so they are never reused for the lifetime of the room.
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    admitted: u32,
    max_participants: usize,
}

impl SessionManager {
    pub fn new(max_participants: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            admitted: 0,
            max_participants,
        }
    }

    /// Admits a session and creates its participant in the store
    ///
    /// Fails with `RoomFull` when the room is at capacity, leaving both the
    /// session table and the store untouched.
    pub fn join(
        &mut self,
        id: SessionId,
        addr: SocketAddr,
        store: &mut StateStore,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&id) {
            return Err(SessionError::AlreadyJoined(id));
        }
        if self.sessions.len() >= self.max_participants {
            return Err(SessionError::RoomFull {
                capacity: self.max_participants,
            });
        }

        self.admitted += 1;
        let identity = self.admitted;

        let participant = ParticipantState {
            identity,
            display_name: format!("Player {}", identity),
            position: spawn_position(identity),
            action_state: Default::default(),
        };
        info!(
            "Session {} from {} joined as participant {} at x={}",
            id, addr, identity, participant.position.x
        );
        store.insert(participant);

        let session = self.sessions.entry(id).or_insert(Session {
            id,
            identity,
            addr,
            joined_at: Instant::now(),
        });
        Ok(session)
    }

    /// Removes a session and its participant
    ///
    /// Returns the removed session, or `None` if it was already gone.
    pub fn leave(&mut self, id: SessionId, store: &mut StateStore) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        store.remove(session.identity);
        info!(
            "Session {} left, removed participant {} after {:.1}s",
            id,
            session.identity,
            session.joined_at.elapsed().as_secs_f32()
        );
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn identity_of(&self, id: SessionId) -> Option<ParticipantId> {
        self.sessions.get(&id).map(|s| s.identity)
    }

    /// Joined sessions in accept order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn capacity(&self) -> usize {
        self.max_participants
    }

    /// Returns the number of joined sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
