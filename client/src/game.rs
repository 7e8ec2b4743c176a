use crate::mirror::{Mirror, MirrorEvent};
use log::{info, warn};
use shared::{Packet, ParticipantId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Joined(ParticipantId),
    Rejected(String),
    Disconnected(String),
}

/// Client-side view of the room: who we are plus the mirror.
pub struct ClientGameState {
    pub status: ConnectionStatus,
    pub mirror: Mirror,
}

impl ClientGameState {
    pub fn new(mirror: Mirror) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            mirror,
        }
    }

    pub fn identity(&self) -> Option<ParticipantId> {
        match self.status {
            ConnectionStatus::Joined(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.identity().is_some()
    }

    /// Applies one server packet and returns what the presentation layer
    /// should react to.
    pub fn handle_packet(&mut self, packet: Packet) -> Vec<MirrorEvent> {
        match packet {
            Packet::Joined { identity, snapshot } => {
                info!(
                    "Joined as participant {} ({} participants in room)",
                    identity,
                    snapshot.entities().len()
                );
                self.status = ConnectionStatus::Joined(identity);
                self.mirror.apply_snapshot(&snapshot)
            }

            Packet::Patch(diff) => {
                if !self.is_joined() {
                    warn!("Patch for tick {} before join, ignoring", diff.tick);
                    return Vec::new();
                }
                self.mirror.apply_diff(&diff)
            }

            Packet::Rejected { reason } => {
                warn!("Join rejected: {}", reason);
                self.status = ConnectionStatus::Rejected(reason);
                Vec::new()
            }

            other => {
                warn!("Unexpected packet from server: {:?}", other);
                Vec::new()
            }
        }
    }

    /// Marks the session as gone and clears the mirror.
    pub fn disconnect(&mut self, reason: String) -> Vec<MirrorEvent> {
        if !matches!(self.status, ConnectionStatus::Rejected(_)) {
            self.status = ConnectionStatus::Disconnected(reason);
        }
        let events = self
            .mirror
            .identities()
            .into_iter()
            .map(MirrorEvent::Left)
            .collect();
        self.mirror = Mirror::new(self.mirror.factor());
        events
    }
}
