use std::collections::BTreeMap;

use kickcan_protocol::ItemId;

/// Authority-side deferred work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deferred {
    /// Bring in the replacement reserved under `ticket`.
    SpawnItem { ticket: u64 },
    /// Destroy a released instance.
    RetireItem { item: ItemId },
}

/// Tick-based timer queue.
///
/// Actions fire in due-tick order, ties in scheduling order. Nothing is
/// cancelled; the consumer re-checks each action's precondition when it fires
/// and skips the ones that no longer apply.
#[derive(Clone, Debug)]
pub struct Scheduler<A> {
    queue: BTreeMap<(u64, u64), A>,
    next_seq: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<A> Scheduler<A> {
    pub fn schedule(&mut self, due_tick: u64, action: A) {
        self.queue.insert((due_tick, self.next_seq), action);
        self.next_seq += 1;
    }

    /// Removes and returns everything due at or before `now`.
    pub fn due(&mut self, now: u64) -> Vec<A> {
        let later = self.queue.split_off(&(now.saturating_add(1), 0));
        let due = std::mem::replace(&mut self.queue, later);
        due.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.keys().next().map(|&(tick, _)| tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order_then_insertion_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(5, "late");
        scheduler.schedule(2, "early-a");
        scheduler.schedule(2, "early-b");

        assert!(scheduler.due(1).is_empty());
        assert_eq!(scheduler.next_due(), Some(2));
        assert_eq!(scheduler.due(4), vec!["early-a", "early-b"]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.due(5), vec!["late"]);
        assert!(scheduler.is_empty());
    }
}
