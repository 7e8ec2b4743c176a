use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod framing;
pub mod schema;

pub use framing::{encode_packet, read_frame, read_packet, write_frame};
pub use schema::{
    descriptor, EntityKind, FieldChange, FieldDescriptor, FieldId, FieldValue, Snapshot,
    StateDiff, TypeTag, PARTICIPANT_FIELDS,
};

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_ROOM_NAME: &str = "game";
pub const DEFAULT_MAX_PARTICIPANTS: usize = 8;
pub const DEFAULT_TICK_MS: u64 = 50;
/// Distance moved along x per tick at full axis deflection.
pub const MOVE_SPEED: f32 = 0.1;
/// Fraction of the remaining distance closed per rendered frame.
pub const INTERPOLATION_FACTOR: f32 = 0.05;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

pub type ParticipantId = u32;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid intent: {field} = {value}")]
    InvalidIntent { field: &'static str, value: i16 },
    #[error("field {field:?} expects a {expected:?} value")]
    TypeMismatch { field: FieldId, expected: TypeTag },
    #[error("unknown field id {0}")]
    UnknownField(u8),
    #[error("message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Faults that concern a single message; the connection can keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidIntent { .. }
                | ProtocolError::TypeMismatch { .. }
                | ProtocolError::UnknownField(_)
                | ProtocolError::Codec(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn lerp(self, target: Vec3, t: f32) -> Vec3 {
        Vec3 {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Discrete behaviour mode of a participant, recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ActionState {
    #[default]
    Idle,
    Crouch,
    CrouchLoop,
    JumpUp,
    JumpLoop,
    JumpFall,
    LowAttack,
    HighAttack,
}

impl ActionState {
    pub const ALL: [ActionState; 8] = [
        ActionState::Idle,
        ActionState::Crouch,
        ActionState::CrouchLoop,
        ActionState::JumpUp,
        ActionState::JumpLoop,
        ActionState::JumpFall,
        ActionState::LowAttack,
        ActionState::HighAttack,
    ];

    pub fn as_wire(self) -> u8 {
        self as u8
    }

    /// Out-of-range values decode to `Idle` instead of failing.
    pub fn from_wire(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(ActionState::Idle)
    }
}

/// Latest raw input snapshot from a participant.
///
/// Fields hold the values exactly as received so that malformed input can be
/// detected by [`Intent::validate`] rather than silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Intent {
    pub x: i8,
    pub y: i8,
    /// Low attack button.
    pub a: u8,
    /// High attack button.
    pub b: u8,
}

impl Intent {
    pub const ZERO: Intent = Intent {
        x: 0,
        y: 0,
        a: 0,
        b: 0,
    };

    pub fn new(x: i8, y: i8, a: u8, b: u8) -> Self {
        Self { x, y, a, b }
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        for (field, value) in [("x", self.x), ("y", self.y)] {
            if !(-1..=1).contains(&value) {
                return Err(ProtocolError::InvalidIntent {
                    field,
                    value: value as i16,
                });
            }
        }
        for (field, value) in [("a", self.a), ("b", self.b)] {
            if value > 1 {
                return Err(ProtocolError::InvalidIntent {
                    field,
                    value: value as i16,
                });
            }
        }
        Ok(())
    }
}

/// The replicated participant entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantState {
    pub identity: ParticipantId,
    pub display_name: String,
    pub position: Vec3,
    pub action_state: ActionState,
}

impl ParticipantState {
    pub fn new(identity: ParticipantId) -> Self {
        Self {
            identity,
            display_name: String::new(),
            position: Vec3::ZERO,
            action_state: ActionState::Idle,
        }
    }

    /// Reads a field through the descriptor table.
    pub fn field(&self, field: FieldId) -> FieldValue {
        match field {
            FieldId::DisplayName => FieldValue::Text(self.display_name.clone()),
            FieldId::PositionX => FieldValue::Number(self.position.x),
            FieldId::PositionY => FieldValue::Number(self.position.y),
            FieldId::PositionZ => FieldValue::Number(self.position.z),
            FieldId::ActionState => FieldValue::State(self.action_state.as_wire()),
        }
    }

    /// Writes a field, checking the value against its descriptor.
    ///
    /// Returns whether the stored value changed.
    pub fn set_field(&mut self, field: FieldId, value: FieldValue) -> Result<bool, ProtocolError> {
        let expected = descriptor(field).tag;
        if value.tag() != expected {
            return Err(ProtocolError::TypeMismatch { field, expected });
        }

        let changed = self.field(field) != value;
        match (field, value) {
            (FieldId::DisplayName, FieldValue::Text(name)) => self.display_name = name,
            (FieldId::PositionX, FieldValue::Number(v)) => self.position.x = v,
            (FieldId::PositionY, FieldValue::Number(v)) => self.position.y = v,
            (FieldId::PositionZ, FieldValue::Number(v)) => self.position.z = v,
            (FieldId::ActionState, FieldValue::State(raw)) => {
                self.action_state = ActionState::from_wire(raw)
            }
            _ => return Err(ProtocolError::TypeMismatch { field, expected }),
        }
        Ok(changed)
    }

    /// Every field of this participant as change records, in table order.
    pub fn fields(&self) -> impl Iterator<Item = FieldChange> + '_ {
        PARTICIPANT_FIELDS.iter().map(move |d| FieldChange {
            entity: self.identity,
            field: d.id,
            value: self.field(d.id),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Join { room: String, client_version: u32 },
    Key(Intent),
    Heartbeat,
    Leave,

    Joined {
        identity: ParticipantId,
        snapshot: Snapshot,
    },
    Patch(StateDiff),
    Rejected { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_intent_validation_accepts_full_range() {
        for x in -1..=1 {
            for y in -1..=1 {
                for a in 0..=1 {
                    for b in 0..=1 {
                        assert!(Intent::new(x, y, a, b).validate().is_ok());
                    }
                }
            }
        }
    }

    #[test]
    fn test_intent_validation_rejects_out_of_range() {
        match Intent::new(2, 0, 0, 0).validate() {
            Err(ProtocolError::InvalidIntent { field, value }) => {
                assert_eq!(field, "x");
                assert_eq!(value, 2);
            }
            other => panic!("expected invalid intent, got {:?}", other),
        }
        assert!(Intent::new(0, -2, 0, 0).validate().is_err());
        assert!(Intent::new(0, 0, 3, 0).validate().is_err());
        assert!(Intent::new(0, 0, 0, 255).validate().is_err());
    }

    #[test]
    fn test_action_state_wire_values() {
        for (i, state) in ActionState::ALL.iter().enumerate() {
            assert_eq!(state.as_wire() as usize, i);
            assert_eq!(ActionState::from_wire(i as u8), *state);
        }
        assert_eq!(ActionState::from_wire(8), ActionState::Idle);
        assert_eq!(ActionState::from_wire(200), ActionState::Idle);
    }

    #[test]
    fn test_vec3_lerp() {
        let from = Vec3::new(0.0, 0.0, 0.0);
        let to = Vec3::new(10.0, -10.0, 2.0);
        let mid = from.lerp(to, 0.5);
        assert_approx_eq!(mid.x, 5.0);
        assert_approx_eq!(mid.y, -5.0);
        assert_approx_eq!(mid.z, 1.0);
        assert_eq!(from.lerp(to, 1.0), to);
        assert_eq!(from.lerp(to, 0.0), from);
    }

    #[test]
    fn test_participant_set_field_reports_change() {
        let mut p = ParticipantState::new(1);
        assert!(p.set_field(FieldId::PositionX, FieldValue::Number(1.0)).unwrap());
        assert!(!p.set_field(FieldId::PositionX, FieldValue::Number(1.0)).unwrap());
        assert_eq!(p.position.x, 1.0);

        assert!(p
            .set_field(FieldId::ActionState, FieldValue::State(6))
            .unwrap());
        assert_eq!(p.action_state, ActionState::LowAttack);
    }

    #[test]
    fn test_participant_set_field_rejects_wrong_type() {
        let mut p = ParticipantState::new(1);
        let err = p
            .set_field(FieldId::PositionY, FieldValue::Text("nope".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TypeMismatch {
                field: FieldId::PositionY,
                expected: TypeTag::Number
            }
        ));
        assert_eq!(p.position.y, 0.0);
    }

    #[test]
    fn test_participant_fields_roundtrip_through_table() {
        let mut source = ParticipantState::new(7);
        source.display_name = "Player 7".to_string();
        source.position = Vec3::new(1.5, 0.0, -2.0);
        source.action_state = ActionState::HighAttack;

        let mut copy = ParticipantState::new(7);
        for change in source.fields() {
            assert_eq!(change.entity, 7);
            copy.set_field(change.field, change.value).unwrap();
        }
        assert_eq!(copy, source);
    }

    #[test]
    fn test_packet_serialization_key() {
        let packet = Packet::Key(Intent::new(-1, 0, 1, 0));
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_malformed_intent_survives_decoding() {
        // Range checks happen after decoding so the receiver can report them.
        let packet = Packet::Key(Intent::new(5, 0, 0, 9));
        let serialized = bincode::serialize(&packet).unwrap();
        match bincode::deserialize::<Packet>(&serialized).unwrap() {
            Packet::Key(intent) => assert!(intent.validate().is_err()),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(ProtocolError::InvalidIntent {
            field: "x",
            value: 3
        }
        .is_recoverable());
        assert!(!ProtocolError::ConnectionClosed.is_recoverable());
        assert!(!ProtocolError::MessageTooLarge(1, 0).is_recoverable());
    }
}
