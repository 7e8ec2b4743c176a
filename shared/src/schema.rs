//! Field-descriptor table for the replicated entity tree
//!
//! Every replicated field has a stable wire id, a name and a type tag. The
//! server walks this table when it builds snapshots and diffs, and the client
//! walks the same table when it applies them, so wire compatibility depends
//! only on the ids below and never on struct layout.

use crate::{ParticipantId, ProtocolError};
use serde::{Deserialize, Serialize};

/// Stable wire identifier of a replicated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum FieldId {
    DisplayName = 0,
    PositionX = 1,
    PositionY = 2,
    PositionZ = 3,
    ActionState = 4,
}

impl From<FieldId> for u8 {
    fn from(field: FieldId) -> u8 {
        field as u8
    }
}

impl TryFrom<u8> for FieldId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PARTICIPANT_FIELDS
            .iter()
            .map(|d| d.id)
            .find(|id| *id as u8 == value)
            .ok_or(ProtocolError::UnknownField(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Text,
    Number,
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Participant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub name: &'static str,
    pub tag: TypeTag,
    pub owner: EntityKind,
}

pub const PARTICIPANT_FIELDS: [FieldDescriptor; 5] = [
    FieldDescriptor {
        id: FieldId::DisplayName,
        name: "name",
        tag: TypeTag::Text,
        owner: EntityKind::Participant,
    },
    FieldDescriptor {
        id: FieldId::PositionX,
        name: "position.x",
        tag: TypeTag::Number,
        owner: EntityKind::Participant,
    },
    FieldDescriptor {
        id: FieldId::PositionY,
        name: "position.y",
        tag: TypeTag::Number,
        owner: EntityKind::Participant,
    },
    FieldDescriptor {
        id: FieldId::PositionZ,
        name: "position.z",
        tag: TypeTag::Number,
        owner: EntityKind::Participant,
    },
    FieldDescriptor {
        id: FieldId::ActionState,
        name: "state",
        tag: TypeTag::State,
        owner: EntityKind::Participant,
    },
];

/// Looks up the descriptor of a field. The table is indexed by wire id.
pub fn descriptor(field: FieldId) -> &'static FieldDescriptor {
    &PARTICIPANT_FIELDS[field as usize]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f32),
    /// Raw `ActionState` wire value.
    State(u8),
}

impl FieldValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            FieldValue::Text(_) => TypeTag::Text,
            FieldValue::Number(_) => TypeTag::Number,
            FieldValue::State(_) => TypeTag::State,
        }
    }
}

/// One field of one entity set to a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub entity: ParticipantId,
    pub field: FieldId,
    pub value: FieldValue,
}

/// Everything that changed between two flushes of the state store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateDiff {
    pub tick: u32,
    pub changes: Vec<FieldChange>,
    /// Participants removed since the previous flush.
    pub removed: Vec<ParticipantId>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.removed.is_empty()
    }
}

/// Every field of every live participant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u32,
    pub changes: Vec<FieldChange>,
}

impl Snapshot {
    pub fn entities(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.changes.iter().map(|c| c.entity).collect();
        ids.dedup();
        ids
    }
}
