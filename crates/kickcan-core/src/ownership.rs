use std::collections::BTreeMap;

use kickcan_protocol::{EntityId, ItemId, ItemTag, ReleaseKind, Transform, Vec3};

use crate::entities::Arena;
use crate::error::Denial;

#[derive(Clone, Debug, PartialEq)]
pub struct ItemInstance {
    pub transform: Transform,
    pub holder: Option<EntityId>,
    /// Resting at the spawn slot.
    pub positioned: bool,
    /// Released and waiting to be destroyed; no longer grantable.
    pub retiring: bool,
    picked_from_slot: bool,
}

/// Replacement instance scheduled after a release.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingSpawn {
    pub ticket: u64,
    pub transform: Transform,
    pub positioned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grant {
    pub item: ItemId,
    pub holder: EntityId,
    /// The instance was sitting in the spawn slot when it was taken.
    pub from_slot: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Released {
    pub item: ItemId,
    pub holder: EntityId,
    pub kind: ReleaseKind,
    /// Ticket of the replacement; pass it back to [`OwnershipRegistry::complete_spawn`].
    pub ticket: u64,
    pub from_slot: bool,
}

/// Read-side view of the item for decision making.
///
/// While a replacement is pending this reports where it is going to appear.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ItemStatus {
    pub item: Option<ItemId>,
    pub holder: Option<EntityId>,
    pub positioned: bool,
    pub position: Vec3,
}

/// Single source of truth for who holds the shared item.
///
/// At most one instance is live at a time. Every release retires the live
/// instance and reserves a replacement, so a stale grant can never be reused
/// under the same id.
#[derive(Clone, Debug, Default)]
pub struct OwnershipRegistry {
    items: Arena<ItemTag, ItemInstance>,
    current: Option<ItemId>,
    pending: Option<PendingSpawn>,
    last_release: BTreeMap<EntityId, u64>,
    cooldown_ticks: u64,
    next_ticket: u64,
}

impl OwnershipRegistry {
    pub fn new(cooldown_ticks: u64) -> Self {
        Self {
            cooldown_ticks,
            ..Self::default()
        }
    }

    /// Creates the live instance. Any previous live instance must have been
    /// released first.
    pub fn spawn(&mut self, transform: Transform, positioned: bool) -> ItemId {
        debug_assert!(self.current.is_none(), "two live item instances");
        let id = self.items.insert(ItemInstance {
            transform,
            holder: None,
            positioned,
            retiring: false,
            picked_from_slot: false,
        });
        self.current = Some(id);
        self.pending = None;
        id
    }

    /// Whether [`Self::request_pickup`] would grant, without granting.
    pub fn check_pickup(&self, requester: EntityId, item: ItemId, now: u64) -> Result<(), Denial> {
        if self.current != Some(item) {
            return Err(Denial::ItemUnavailable);
        }
        let instance = self.items.get(item).ok_or(Denial::ItemUnavailable)?;
        if instance.retiring || instance.holder.is_some() {
            return Err(Denial::ItemUnavailable);
        }
        if self
            .last_release
            .get(&requester)
            .is_some_and(|&at| now < at.saturating_add(self.cooldown_ticks))
        {
            return Err(Denial::PickupCooldown);
        }
        Ok(())
    }

    pub fn request_pickup(
        &mut self,
        requester: EntityId,
        item: ItemId,
        now: u64,
    ) -> Result<Grant, Denial> {
        self.check_pickup(requester, item, now)?;
        let instance = self.items.get_mut(item).ok_or(Denial::ItemUnavailable)?;

        let from_slot = instance.positioned;
        instance.holder = Some(requester);
        instance.positioned = false;
        instance.picked_from_slot = from_slot;
        Ok(Grant {
            item,
            holder: requester,
            from_slot,
        })
    }

    /// Lets go of `item`. The instance starts retiring and a replacement is
    /// reserved at `respawn_at`.
    pub fn request_release(
        &mut self,
        requester: EntityId,
        item: ItemId,
        kind: ReleaseKind,
        respawn_at: Transform,
        positioned: bool,
        now: u64,
    ) -> Result<Released, Denial> {
        let instance = self.items.get_mut(item).ok_or(Denial::NotHolder)?;
        if instance.holder != Some(requester) {
            return Err(Denial::NotHolder);
        }

        instance.holder = None;
        instance.retiring = true;
        let from_slot = instance.picked_from_slot;

        self.current = None;
        self.last_release.insert(requester, now);
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending = Some(PendingSpawn {
            ticket,
            transform: respawn_at,
            positioned,
        });

        Ok(Released {
            item,
            holder: requester,
            kind,
            ticket,
            from_slot,
        })
    }

    /// Spawns the replacement reserved under `ticket`. Skipped when the
    /// reservation is gone or was superseded.
    pub fn complete_spawn(&mut self, ticket: u64) -> Option<(ItemId, PendingSpawn)> {
        let pending = self.pending.filter(|p| p.ticket == ticket)?;
        if self.current.is_some() {
            return None;
        }
        let id = self.spawn(pending.transform, pending.positioned);
        Some((id, pending))
    }

    /// Destroys a released instance. Live instances are never retired.
    pub fn retire(&mut self, item: ItemId) -> bool {
        match self.items.get(item) {
            Some(instance) if instance.retiring => {
                self.items.remove(item);
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<ItemId> {
        self.current
    }

    pub fn instance(&self, item: ItemId) -> Option<&ItemInstance> {
        self.items.get(item)
    }

    pub fn holder_of(&self, item: ItemId) -> Option<EntityId> {
        self.items.get(item)?.holder
    }

    pub fn held_by(&self, entity: EntityId) -> Option<ItemId> {
        self.items
            .iter()
            .find(|(_, instance)| instance.holder == Some(entity))
            .map(|(id, _)| id)
    }

    pub fn pending(&self) -> Option<PendingSpawn> {
        self.pending
    }

    /// Number of instances with a holder. Never more than one.
    pub fn held_count(&self) -> usize {
        self.items
            .iter()
            .filter(|(_, instance)| instance.holder.is_some())
            .count()
    }

    /// Instances that exist, live or retiring.
    pub fn instances(&self) -> impl Iterator<Item = (ItemId, &ItemInstance)> {
        self.items.iter()
    }

    pub fn status(&self) -> ItemStatus {
        if let Some((id, instance)) = self
            .current
            .and_then(|id| self.items.get(id).map(|instance| (id, instance)))
        {
            return ItemStatus {
                item: Some(id),
                holder: instance.holder,
                positioned: instance.positioned,
                position: instance.transform.position,
            };
        }
        match self.pending {
            Some(pending) => ItemStatus {
                item: None,
                holder: None,
                positioned: pending.positioned,
                position: pending.transform.position,
            },
            None => ItemStatus {
                item: None,
                holder: None,
                positioned: false,
                position: Vec3::ZERO,
            },
        }
    }

    /// Moves a held live instance to wherever `anchor` says its holder's hand is.
    pub fn follow_holder(&mut self, anchor: impl Fn(EntityId) -> Option<Transform>) {
        let Some(id) = self.current else {
            return;
        };
        if let Some(instance) = self.items.get_mut(id) {
            if let Some(transform) = instance.holder.and_then(&anchor) {
                instance.transform = transform;
            }
        }
    }

    /// Drops the cooldown bookkeeping of a despawned entity.
    pub fn forget(&mut self, entity: EntityId) {
        self.last_release.remove(&entity);
    }
}
