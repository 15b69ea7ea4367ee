use serde::{Deserialize, Serialize};

use crate::{ActionState, EntityId, EntityKind, ItemId, Transform};

/// Full replicated state for initial sync or resync.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub entities: Vec<EntitySnapshot>,
    /// `None` while a replacement instance is pending.
    pub item: Option<ItemSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub transform: Transform,
    pub state: ActionState,
    pub held_item: Option<ItemId>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub caught: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub transform: Transform,
    pub holder: Option<EntityId>,
    pub positioned: bool,
}

impl WorldSnapshot {
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }
}
