use std::collections::{BTreeMap, BTreeSet};

use kickcan_protocol::{Command, EntityId};
use tracing::trace;

use crate::error::Denial;

/// An intent as received, tagged with the entity it is on behalf of.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Inbound {
    pub from: EntityId,
    pub command: Command,
}

/// Observer-to-authority intent queue for one tick.
///
/// Arrival order is preserved. Movement is latest-wins: when several moves
/// from one entity arrive in the same tick only the last one survives the
/// drain. Discrete actions are first-wins: a second action from the same
/// entity in the same tick is refused as stale.
#[derive(Clone, Debug, Default)]
pub struct CommandChannel {
    queue: Vec<Inbound>,
    acted: BTreeSet<EntityId>,
}

impl CommandChannel {
    pub fn submit(&mut self, from: EntityId, command: Command) -> Result<(), Denial> {
        if let Command::Action { .. } = command {
            if !self.acted.insert(from) {
                return Err(Denial::StaleCommand);
            }
        }
        self.queue.push(Inbound { from, command });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Takes the tick's intents in arrival order with superseded moves removed.
    pub fn drain(&mut self) -> Vec<Inbound> {
        self.acted.clear();
        let queue = std::mem::take(&mut self.queue);

        let mut last_move: BTreeMap<EntityId, usize> = BTreeMap::new();
        for (index, inbound) in queue.iter().enumerate() {
            if let Command::Move { .. } = inbound.command {
                last_move.insert(inbound.from, index);
            }
        }

        queue
            .into_iter()
            .enumerate()
            .filter(|(index, inbound)| match inbound.command {
                Command::Move { .. } => {
                    let keep = last_move.get(&inbound.from) == Some(index);
                    if !keep {
                        trace!(entity = %inbound.from, "{}", Denial::StaleCommand);
                    }
                    keep
                }
                Command::Action { .. } => true,
            })
            .map(|(_, inbound)| inbound)
            .collect()
    }

    /// Drops everything queued on behalf of a despawned entity.
    pub fn forget(&mut self, entity: EntityId) {
        self.queue.retain(|inbound| inbound.from != entity);
        self.acted.remove(&entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_moves_supersede_earlier_ones() {
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        let mut channel = CommandChannel::default();
        channel.submit(a, Command::move_toward(1.0, 0.0, false)).unwrap();
        channel.submit(b, Command::move_toward(0.0, 1.0, false)).unwrap();
        channel.submit(a, Command::move_toward(-1.0, 0.0, true)).unwrap();

        let drained = channel.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].from, b);
        assert_eq!(drained[1].command, Command::move_toward(-1.0, 0.0, true));
        assert!(channel.is_empty());
    }

    #[test]
    fn first_action_per_tick_wins() {
        let a = EntityId::new(0, 0);
        let mut channel = CommandChannel::default();
        channel.submit(a, Command::pickup()).unwrap();
        assert_eq!(channel.submit(a, Command::throw()), Err(Denial::StaleCommand));
        assert_eq!(channel.drain().len(), 1);

        // A new tick accepts actions again.
        channel.submit(a, Command::throw()).unwrap();
        assert_eq!(channel.drain()[0].command, Command::throw());
    }

    #[test]
    fn actions_keep_their_place_relative_to_moves() {
        let a = EntityId::new(0, 0);
        let mut channel = CommandChannel::default();
        channel.submit(a, Command::pickup()).unwrap();
        channel.submit(a, Command::move_toward(0.0, 1.0, false)).unwrap();
        let drained = channel.drain();
        assert_eq!(drained[0].command, Command::pickup());
        assert!(matches!(drained[1].command, Command::Move { .. }));
    }
}
