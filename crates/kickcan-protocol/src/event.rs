use serde::{Deserialize, Serialize};

use crate::{ActionState, AgentGoal, EntityId, EntityKind, ItemId, ReleaseKind, Transform};

/// Confirmed authority → observer change. Fully serializable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // Entity lifecycle
    EntitySpawned {
        entity: EntityId,
        kind: EntityKind,
        name: String,
        transform: Transform,
        state: ActionState,
    },
    EntityDespawned {
        entity: EntityId,
    },

    // Discrete state channel
    StateChanged {
        entity: EntityId,
        old: ActionState,
        new: ActionState,
    },

    // Ownership
    ItemSpawned {
        item: ItemId,
        transform: Transform,
        positioned: bool,
    },
    ItemPickedUp {
        item: ItemId,
        holder: EntityId,
    },
    ItemReleased {
        item: ItemId,
        holder: EntityId,
        kind: ReleaseKind,
    },
    ItemRetired {
        item: ItemId,
    },
    ItemDelivered {
        item: ItemId,
        by: EntityId,
    },

    // Feedback for UI panels; not on the consistency path
    ScoreChanged {
        entity: EntityId,
        score: u32,
    },
    AgentGoalChanged {
        agent: EntityId,
        goal: AgentGoal,
    },
    AvatarCaught {
        avatar: EntityId,
        by: EntityId,
    },
}

/// Observer-specific UI cue, delivered to a single observer unless the
/// authority decides it is global.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Cue {
    EnteredSafeZone,
    LeftSafeZone,
    GameOver { caught_by: EntityId },
}

/// Authority → observer transform sample. Newest supersedes older ones.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransformSample {
    Entity { entity: EntityId, transform: Transform },
    Item { item: ItemId, transform: Transform },
}
