//! Action state to animation clip lookup for the reference character

use shared::ActionState;

/// `(state, clip name)` pairs. States without an entry play `Idle`.
pub const ANIMATION_TABLE: [(ActionState, &str); 6] = [
    (ActionState::Idle, "Idle"),
    (ActionState::Crouch, "Crouch"),
    (ActionState::CrouchLoop, "CrouchLoop"),
    (ActionState::JumpUp, "Jump"),
    (ActionState::LowAttack, "LowAttack"),
    (ActionState::HighAttack, "HighAttack"),
];

pub fn animation_name(state: ActionState) -> Option<&'static str> {
    ANIMATION_TABLE
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, name)| *name)
}

/// Clip to play for `state`, falling back to the idle clip.
pub fn clip_for(state: ActionState) -> &'static str {
    animation_name(state).unwrap_or("Idle")
}
