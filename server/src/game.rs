use crate::intent::IntentBuffer;
use crate::store::StateStore;
use log::trace;
use shared::{ActionState, Intent};

/// Derives the action state from the current intent alone.
///
/// First match wins: low attack, high attack, jump, idle. Nothing carries over
/// from the previous tick.
pub fn derive_action_state(intent: &Intent) -> ActionState {
    if intent.a == 1 {
        ActionState::LowAttack
    } else if intent.b == 1 {
        ActionState::HighAttack
    } else if intent.y < 0 {
        ActionState::JumpUp
    } else {
        ActionState::Idle
    }
}

/// Authoritative fixed-step simulation.
///
/// Each step moves every participant by `intent.x * speed` along x (one tick
/// is the unit of time, wall-clock jitter is ignored) and recomputes its
/// action state. All writes go through the store so they show up in the next
/// diff.
#[derive(Debug, Clone)]
pub struct Simulation {
    tick: u32,
    speed: f32,
}

impl Simulation {
    pub fn new(speed: f32) -> Self {
        Self { tick: 0, speed }
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn step(&mut self, store: &mut StateStore, intents: &IntentBuffer) {
        let intents = intents.snapshot();

        for identity in store.identities() {
            let intent = intents.get(&identity).copied().unwrap_or(Intent::ZERO);
            let Some(participant) = store.get(identity) else {
                continue;
            };

            let mut position = participant.position;
            position.x += intent.x as f32 * self.speed;
            store.set_position(identity, position);

            let state = derive_action_state(&intent);
            if store.set_action_state(identity, state) {
                trace!("Participant {} is now {:?}", identity, state);
            }
        }

        self.tick = self.tick.wrapping_add(1);
    }
}
