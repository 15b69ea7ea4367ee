use serde::{Deserialize, Serialize};

use crate::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Player-controlled character.
    Avatar,
    /// AI-controlled guard driven by the decision loop.
    Agent,
}

/// Who steers an entity, from the point of view of the node holding the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    /// Simulated by the authority itself (agents).
    AuthorityControlled,
    /// Driven by the intents of the observer that owns it.
    ObserverControlled,
    /// Someone else's entity; only ever shown.
    Remote,
}

/// Tag carried by trigger volumes reported by the collision collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeTag {
    SafeZone,
    /// Reach volume around an agent; touching it outside the safe zone gets an avatar caught.
    CatchZone(EntityId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerEdge {
    Enter,
    Exit,
}

/// Enter/exit notification from the collision collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub entity: EntityId,
    pub volume: VolumeTag,
    pub edge: TriggerEdge,
}

impl TriggerEvent {
    pub fn enter(entity: EntityId, volume: VolumeTag) -> Self {
        Self {
            entity,
            volume,
            edge: TriggerEdge::Enter,
        }
    }

    pub fn exit(entity: EntityId, volume: VolumeTag) -> Self {
        Self {
            entity,
            volume,
            edge: TriggerEdge::Exit,
        }
    }
}

/// How a holder let go of the item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseKind {
    Throw,
    /// Returned to the spawn slot.
    PlaceBack,
    /// Holder left the session or got caught.
    Drop,
}
