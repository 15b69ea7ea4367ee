use std::collections::BTreeMap;

use kickcan_protocol::{ActionState, EntityId, Event};

use crate::error::Denial;

#[derive(Clone, Debug)]
struct StateRecord {
    current: ActionState,
    /// Last value observers were told about.
    last_sent: ActionState,
    /// Tick at which a timed state falls back to `Idle`.
    expires_at: Option<u64>,
}

/// Authority-owned discrete state per entity.
///
/// Only the authority writes here. Changes are coalesced per tick and
/// published by [`StateChannel::flush`] when the value differs from the last
/// one sent, so re-applying the current state produces no traffic.
#[derive(Clone, Debug, Default)]
pub struct StateChannel {
    records: BTreeMap<EntityId, StateRecord>,
}

impl StateChannel {
    /// Starts tracking `entity`. The spawn event already carries `initial`.
    pub fn register(&mut self, entity: EntityId, initial: ActionState) {
        self.records.insert(
            entity,
            StateRecord {
                current: initial,
                last_sent: initial,
                expires_at: None,
            },
        );
    }

    pub fn remove(&mut self, entity: EntityId) {
        self.records.remove(&entity);
    }

    pub fn state(&self, entity: EntityId) -> Option<ActionState> {
        self.records.get(&entity).map(|r| r.current)
    }

    pub fn is_blocked(&self, entity: EntityId) -> bool {
        self.state(entity)
            .is_some_and(|state| state.blocks_movement())
    }

    /// Unconditional write. Clears any running timer.
    pub fn set_state(&mut self, entity: EntityId, state: ActionState) -> Result<(), Denial> {
        let record = self.records.get_mut(&entity).ok_or(Denial::UnknownEntity)?;
        record.current = state;
        record.expires_at = None;
        Ok(())
    }

    /// Locomotion update from movement. Refused while a blocking transition
    /// runs; a running jump keeps its state until it lands.
    pub fn set_locomotion(&mut self, entity: EntityId, state: ActionState) -> Result<(), Denial> {
        debug_assert!(state.is_locomotion());
        let record = self.records.get_mut(&entity).ok_or(Denial::UnknownEntity)?;
        if record.current.blocks_movement() {
            return Err(Denial::ActionBlocked);
        }
        if record.expires_at.is_none() {
            record.current = state;
        }
        Ok(())
    }

    /// Enters a timed state that reverts to `Idle` at `ends_at`.
    pub fn begin_transition(
        &mut self,
        entity: EntityId,
        state: ActionState,
        ends_at: u64,
    ) -> Result<(), Denial> {
        let record = self.records.get_mut(&entity).ok_or(Denial::UnknownEntity)?;
        if record.current.blocks_movement() {
            return Err(Denial::ActionBlocked);
        }
        record.current = state;
        record.expires_at = Some(ends_at);
        Ok(())
    }

    /// Resets every timed state whose timer has run out. Returns the entities
    /// that went back to `Idle`.
    pub fn expire(&mut self, now: u64) -> Vec<EntityId> {
        let mut reset = Vec::new();
        for (&entity, record) in &mut self.records {
            if record.expires_at.is_some_and(|at| at <= now) {
                record.current = ActionState::Idle;
                record.expires_at = None;
                reset.push(entity);
            }
        }
        reset
    }

    /// Change notifications for every entity whose state differs from the
    /// last value sent, in entity order.
    pub fn flush(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        for (&entity, record) in &mut self.records {
            if record.current != record.last_sent {
                events.push(Event::StateChanged {
                    entity,
                    old: record.last_sent,
                    new: record.current,
                });
                record.last_sent = record.current;
            }
        }
        events
    }
}
