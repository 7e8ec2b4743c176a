//! Local mirror of the authoritative participant state
//!
//! The mirror applies snapshots and diffs through the shared field-descriptor
//! table and keeps, per participant, a displayed position that is eased toward
//! the authoritative one once per rendered frame.

use log::{debug, warn};
use shared::{
    ActionState, FieldChange, ParticipantId, ParticipantState, Snapshot, StateDiff, Vec3,
    INTERPOLATION_FACTOR,
};
use std::collections::BTreeMap;

/// Something the presentation layer should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorEvent {
    Joined(ParticipantId),
    Left(ParticipantId),
    ActionChanged {
        identity: ParticipantId,
        from: ActionState,
        to: ActionState,
    },
}

#[derive(Debug, Clone)]
pub struct MirrorEntry {
    /// Last known authoritative state.
    pub state: ParticipantState,
    /// Where the participant is drawn this frame.
    pub displayed: Vec3,
}

impl MirrorEntry {
    pub fn target(&self) -> Vec3 {
        self.state.position
    }
}

#[derive(Debug)]
pub struct Mirror {
    entries: BTreeMap<ParticipantId, MirrorEntry>,
    last_tick: Option<u32>,
    factor: f32,
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new(INTERPOLATION_FACTOR)
    }
}

impl Mirror {
    /// `factor` is the fraction of the remaining distance covered per frame.
    ///
    /// Convergence therefore depends on the frame rate, not on elapsed time.
    pub fn new(factor: f32) -> Self {
        Self {
            entries: BTreeMap::new(),
            last_tick: None,
            factor,
        }
    }

    pub fn get(&self, identity: ParticipantId) -> Option<&MirrorEntry> {
        self.entries.get(&identity)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MirrorEntry> {
        self.entries.values()
    }

    pub fn identities(&self) -> Vec<ParticipantId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    /// Replaces the whole mirror with a full snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Vec<MirrorEvent> {
        let mut events = Vec::new();
        let live = snapshot.entities();

        let stale: Vec<ParticipantId> = self
            .entries
            .keys()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();
        for identity in stale {
            self.entries.remove(&identity);
            events.push(MirrorEvent::Left(identity));
        }

        self.apply_changes(&snapshot.changes, &mut events);
        self.last_tick = Some(snapshot.tick);
        events
    }

    /// Applies an incremental diff.
    ///
    /// Diffs that are not newer than the last applied tick are ignored.
    /// Removals of identities the mirror never saw are no-ops.
    pub fn apply_diff(&mut self, diff: &StateDiff) -> Vec<MirrorEvent> {
        if let Some(last) = self.last_tick {
            if diff.tick <= last {
                debug!("Ignoring stale diff for tick {} (at {})", diff.tick, last);
                return Vec::new();
            }
        }

        let mut events = Vec::new();
        for identity in &diff.removed {
            if self.entries.remove(identity).is_some() {
                events.push(MirrorEvent::Left(*identity));
            }
        }

        self.apply_changes(&diff.changes, &mut events);
        self.last_tick = Some(diff.tick);
        events
    }

    fn apply_changes(&mut self, changes: &[FieldChange], events: &mut Vec<MirrorEvent>) {
        let mut created = Vec::new();

        for change in changes {
            let entry = self.entries.entry(change.entity).or_insert_with(|| {
                created.push(change.entity);
                MirrorEntry {
                    state: ParticipantState::new(change.entity),
                    displayed: Vec3::ZERO,
                }
            });

            let before = entry.state.action_state;
            if let Err(e) = entry.state.set_field(change.field, change.value.clone()) {
                warn!("Skipping change for participant {}: {}", change.entity, e);
                continue;
            }
            let after = entry.state.action_state;

            if before != after && !created.contains(&change.entity) {
                events.push(MirrorEvent::ActionChanged {
                    identity: change.entity,
                    from: before,
                    to: after,
                });
            }
        }

        // New participants appear where they are rather than sliding in.
        for identity in created {
            if let Some(entry) = self.entries.get_mut(&identity) {
                entry.displayed = entry.state.position;
            }
            events.push(MirrorEvent::Joined(identity));
        }
    }

    /// Advances every displayed position one frame toward its target.
    pub fn interpolate(&mut self) {
        for entry in self.entries.values_mut() {
            entry.displayed = entry.displayed.lerp(entry.state.position, self.factor);
        }
    }
}
