//! Replicated state store
//!
//! Owns every live participant and records each field write made since the
//! last flush. Pending changes are keyed by (participant, field), so a field
//! written several times between flushes is reported once with its final
//! value.

use shared::{
    ActionState, FieldChange, FieldId, FieldValue, ParticipantId, ParticipantState, Snapshot,
    StateDiff, Vec3,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct StateStore {
    participants: BTreeMap<ParticipantId, ParticipantState>,
    pending: BTreeMap<(ParticipantId, FieldId), FieldValue>,
    removed: BTreeSet<ParticipantId>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant; all of its fields go into the next diff.
    pub fn insert(&mut self, participant: ParticipantState) {
        let identity = participant.identity;
        for change in participant.fields() {
            self.pending.insert((identity, change.field), change.value);
        }
        self.removed.remove(&identity);
        self.participants.insert(identity, participant);
    }

    /// Removes a participant and discards any of its unflushed changes.
    pub fn remove(&mut self, identity: ParticipantId) -> Option<ParticipantState> {
        let participant = self.participants.remove(&identity)?;
        self.pending.retain(|(id, _), _| *id != identity);
        self.removed.insert(identity);
        Some(participant)
    }

    pub fn get(&self, identity: ParticipantId) -> Option<&ParticipantState> {
        self.participants.get(&identity)
    }

    pub fn contains(&self, identity: ParticipantId) -> bool {
        self.participants.contains_key(&identity)
    }

    pub fn identities(&self) -> Vec<ParticipantId> {
        self.participants.keys().copied().collect()
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantState> {
        self.participants.values()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Writes one field and records it if the value changed.
    ///
    /// Returns `false` for unknown identities, type mismatches and writes that
    /// leave the value as it was.
    pub fn set_field(&mut self, identity: ParticipantId, field: FieldId, value: FieldValue) -> bool {
        let Some(participant) = self.participants.get_mut(&identity) else {
            return false;
        };

        match participant.set_field(field, value) {
            Ok(true) => {
                self.pending
                    .insert((identity, field), participant.field(field));
                true
            }
            Ok(false) | Err(_) => false,
        }
    }

    pub fn set_position(&mut self, identity: ParticipantId, position: Vec3) -> bool {
        let x = self.set_field(identity, FieldId::PositionX, FieldValue::Number(position.x));
        let y = self.set_field(identity, FieldId::PositionY, FieldValue::Number(position.y));
        let z = self.set_field(identity, FieldId::PositionZ, FieldValue::Number(position.z));
        x || y || z
    }

    pub fn set_action_state(&mut self, identity: ParticipantId, state: ActionState) -> bool {
        self.set_field(identity, FieldId::ActionState, FieldValue::State(state.as_wire()))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.removed.is_empty()
    }

    /// Hands out everything recorded since the previous flush and clears it.
    pub fn flush(&mut self, tick: u32) -> StateDiff {
        let changes = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|((entity, field), value)| FieldChange {
                entity,
                field,
                value,
            })
            .collect();

        StateDiff {
            tick,
            changes,
            removed: std::mem::take(&mut self.removed).into_iter().collect(),
        }
    }

    /// Every field of every live participant, for clients with no prior state.
    pub fn snapshot(&self, tick: u32) -> Snapshot {
        Snapshot {
            tick,
            changes: self
                .participants
                .values()
                .flat_map(|p| p.fields())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PARTICIPANT_FIELDS;

    fn participant(identity: ParticipantId, x: f32) -> ParticipantState {
        ParticipantState {
            identity,
            display_name: format!("Player {}", identity),
            position: Vec3::new(x, 0.0, 0.0),
            action_state: ActionState::Idle,
        }
    }

    #[test]
    fn test_insert_reports_every_field() {
        let mut store = StateStore::new();
        store.insert(participant(1, -1.0));

        let diff = store.flush(1);
        assert_eq!(diff.changes.len(), PARTICIPANT_FIELDS.len());
        assert!(diff.changes.iter().all(|c| c.entity == 1));
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_flush_clears_pending() {
        let mut store = StateStore::new();
        store.insert(participant(1, -1.0));
        store.flush(1);

        assert!(!store.has_pending());
        assert!(store.flush(2).is_empty());
    }

    #[test]
    fn test_changes_coalesce_to_final_value() {
        let mut store = StateStore::new();
        store.insert(participant(1, 0.0));
        store.flush(1);

        store.set_position(1, Vec3::new(0.5, 0.0, 0.0));
        store.set_position(1, Vec3::new(0.7, 0.0, 0.0));

        let diff = store.flush(2);
        assert_eq!(
            diff.changes,
            vec![FieldChange {
                entity: 1,
                field: FieldId::PositionX,
                value: FieldValue::Number(0.7),
            }]
        );
    }

    #[test]
    fn test_unchanged_write_is_not_recorded() {
        let mut store = StateStore::new();
        store.insert(participant(1, 0.0));
        store.flush(1);

        assert!(!store.set_action_state(1, ActionState::Idle));
        assert!(!store.set_position(1, Vec3::ZERO));
        assert!(store.flush(2).is_empty());
    }

    #[test]
    fn test_write_to_unknown_participant_is_ignored() {
        let mut store = StateStore::new();
        assert!(!store.set_action_state(3, ActionState::LowAttack));
        assert!(!store.has_pending());
    }

    #[test]
    fn test_wrong_type_is_ignored() {
        let mut store = StateStore::new();
        store.insert(participant(1, 0.0));
        store.flush(1);

        assert!(!store.set_field(1, FieldId::PositionX, FieldValue::Text("x".into())));
        assert!(store.flush(2).is_empty());
    }

    #[test]
    fn test_remove_discards_pending_and_marks_removal() {
        let mut store = StateStore::new();
        store.insert(participant(1, 0.0));
        store.insert(participant(2, 1.0));
        store.flush(1);

        store.set_action_state(2, ActionState::HighAttack);
        assert!(store.remove(2).is_some());
        assert!(store.remove(2).is_none());

        let diff = store.flush(2);
        assert!(diff.changes.is_empty());
        assert_eq!(diff.removed, vec![2]);
        assert!(!store.contains(2));
        assert!(store.snapshot(2).changes.iter().all(|c| c.entity != 2));
    }

    #[test]
    fn test_snapshot_contains_every_live_field() {
        let mut store = StateStore::new();
        store.insert(participant(1, -1.0));
        store.insert(participant(2, 1.0));
        store.set_action_state(2, ActionState::JumpUp);

        let snapshot = store.snapshot(5);
        assert_eq!(snapshot.tick, 5);
        assert_eq!(snapshot.changes.len(), 2 * PARTICIPANT_FIELDS.len());
        assert_eq!(snapshot.entities(), vec![1, 2]);
        assert!(snapshot.changes.contains(&FieldChange {
            entity: 2,
            field: FieldId::ActionState,
            value: FieldValue::State(ActionState::JumpUp.as_wire()),
        }));
        // Taking a snapshot leaves the pending diff alone.
        assert!(store.has_pending());
    }
}
