use std::collections::BTreeMap;

use kickcan_protocol::EntityId;

/// Authority's record of which entities are inside the safe zone.
///
/// Fed only by trigger enter/exit notifications; the last notification for an
/// entity wins.
#[derive(Clone, Debug, Default)]
pub struct SafeZoneRegistry {
    inside: BTreeMap<EntityId, bool>,
}

impl SafeZoneRegistry {
    pub fn register(&mut self, entity: EntityId, safe: bool) {
        self.inside.insert(entity, safe);
    }

    pub fn remove(&mut self, entity: EntityId) {
        self.inside.remove(&entity);
    }

    /// Returns `true` when the flag flipped.
    pub fn on_enter(&mut self, entity: EntityId) -> bool {
        self.set(entity, true)
    }

    /// Returns `true` when the flag flipped.
    pub fn on_exit(&mut self, entity: EntityId) -> bool {
        self.set(entity, false)
    }

    fn set(&mut self, entity: EntityId, safe: bool) -> bool {
        let previous = self.inside.insert(entity, safe);
        previous != Some(safe)
    }

    /// Unknown entities are treated as exposed.
    pub fn is_safe(&self, entity: EntityId) -> bool {
        self.inside.get(&entity).copied().unwrap_or(false)
    }

    pub fn snapshot(&self) -> BTreeMap<EntityId, bool> {
        self.inside.clone()
    }
}
