use serde::{Deserialize, Serialize};

/// Discrete action/animation phase of an entity. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionState {
    #[default]
    Idle,
    Walk,
    Run,
    Jump,
    Pick,
    Throw,
    PutItem,
}

impl ActionState {
    pub const ALL: [ActionState; 7] = [
        ActionState::Idle,
        ActionState::Walk,
        ActionState::Run,
        ActionState::Jump,
        ActionState::Pick,
        ActionState::Throw,
        ActionState::PutItem,
    ];

    /// States that lock out movement intents until their timer runs out.
    pub fn blocks_movement(self) -> bool {
        matches!(
            self,
            ActionState::Pick | ActionState::Throw | ActionState::PutItem
        )
    }

    /// States an observer may predict for its own entity ahead of the authority.
    pub fn is_locomotion(self) -> bool {
        matches!(
            self,
            ActionState::Idle | ActionState::Walk | ActionState::Run
        )
    }

    /// Timed states fall back to `Idle` when their duration elapses.
    pub fn is_timed(self) -> bool {
        self.blocks_movement() || self == ActionState::Jump
    }
}

/// Authority-side goal an agent pursues this tick. Recomputed every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentGoal {
    AcquireItem,
    DeliverItem,
    ReturnToBase,
    Pursue,
    #[default]
    Idle,
}
