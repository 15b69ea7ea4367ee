//! Agent decision loop.
//!
//! [`decide`] is a pure function of the current world view; [`AgentBrain`]
//! holds the little state that has to survive between ticks (the tracked
//! avatar list and the one-shot delivery flag).

use kickcan_protocol::{AgentGoal, EntityId, Vec3};

use crate::ownership::ItemStatus;

/// What an agent knows about one tracked avatar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AvatarView {
    pub id: EntityId,
    pub position: Vec3,
    pub safe: bool,
    /// Currently in the `Pick` state.
    pub picking_up: bool,
}

#[derive(Clone, Debug)]
pub struct DecisionInput<'a> {
    pub agent_position: Vec3,
    pub item: ItemStatus,
    pub agent_holds_item: bool,
    pub delivered_this_tick: bool,
    pub avatars: &'a [AvatarView],
    pub spawn_slot: Vec3,
    pub base: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Target {
    Point(Vec3),
    Avatar { id: EntityId, position: Vec3 },
}

impl Target {
    pub fn position(&self) -> Vec3 {
        match *self {
            Target::Point(position) => position,
            Target::Avatar { position, .. } => position,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    pub goal: AgentGoal,
    pub target: Option<Target>,
}

impl Decision {
    fn idle() -> Self {
        Self {
            goal: AgentGoal::Idle,
            target: None,
        }
    }
}

/// Evaluates the goal table top to bottom; the first matching row wins.
///
/// With exposed avatars around but none of them mid-pickup the agent idles
/// where it is.
pub fn decide(input: &DecisionInput<'_>) -> Decision {
    if input.item.holder.is_none() && !input.item.positioned {
        return Decision {
            goal: AgentGoal::AcquireItem,
            target: Some(Target::Point(input.item.position)),
        };
    }

    if input.agent_holds_item {
        return Decision {
            goal: AgentGoal::DeliverItem,
            target: Some(Target::Point(input.spawn_slot)),
        };
    }

    if input.delivered_this_tick {
        return Decision {
            goal: AgentGoal::ReturnToBase,
            target: Some(Target::Point(input.base)),
        };
    }

    if input.avatars.is_empty() {
        return Decision::idle();
    }

    if input.avatars.iter().all(|avatar| avatar.safe) {
        return Decision {
            goal: AgentGoal::ReturnToBase,
            target: Some(Target::Point(input.base)),
        };
    }

    let nearest = input
        .avatars
        .iter()
        .filter(|avatar| !avatar.safe && avatar.picking_up)
        .min_by(|a, b| {
            let da = input.agent_position.horizontal_distance(a.position);
            let db = input.agent_position.horizontal_distance(b.position);
            da.total_cmp(&db)
        });

    match nearest {
        Some(avatar) => Decision {
            goal: AgentGoal::Pursue,
            target: Some(Target::Avatar {
                id: avatar.id,
                position: avatar.position,
            }),
        },
        None => Decision::idle(),
    }
}

/// Per-agent memory kept by the authority.
#[derive(Clone, Debug, Default)]
pub struct AgentBrain {
    tracked: Vec<EntityId>,
    next_refresh: u64,
    just_delivered: bool,
    goal: AgentGoal,
}

impl AgentBrain {
    pub fn refresh_due(&self, now: u64) -> bool {
        now >= self.next_refresh
    }

    /// Replaces the tracked list. Avatars joining before `now + interval` are
    /// not seen until the following refresh.
    pub fn refresh(&mut self, avatars: Vec<EntityId>, now: u64, interval: u64) {
        self.tracked = avatars;
        self.next_refresh = now.saturating_add(interval.max(1));
    }

    pub fn tracked(&self) -> &[EntityId] {
        &self.tracked
    }

    pub fn note_delivery(&mut self) {
        self.just_delivered = true;
    }

    /// Reads and clears the delivery flag.
    pub fn take_delivered(&mut self) -> bool {
        std::mem::take(&mut self.just_delivered)
    }

    pub fn goal(&self) -> AgentGoal {
        self.goal
    }

    /// Stores the selected goal; `true` when it differs from the previous one.
    pub fn set_goal(&mut self, goal: AgentGoal) -> bool {
        std::mem::replace(&mut self.goal, goal) != goal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resting_item() -> ItemStatus {
        ItemStatus {
            item: None,
            holder: None,
            positioned: true,
            position: Vec3::ZERO,
        }
    }

    fn input(avatars: &[AvatarView]) -> DecisionInput<'_> {
        DecisionInput {
            agent_position: Vec3::ZERO,
            item: resting_item(),
            agent_holds_item: false,
            delivered_this_tick: false,
            avatars,
            spawn_slot: Vec3::ZERO,
            base: Vec3::new(0.0, 0.0, 6.0),
        }
    }

    fn avatar(index: u32, x: f32, safe: bool, picking_up: bool) -> AvatarView {
        AvatarView {
            id: EntityId::new(index, 0),
            position: Vec3::new(x, 0.0, 0.0),
            safe,
            picking_up,
        }
    }

    #[test]
    fn loose_item_takes_priority() {
        let mut i = input(&[]);
        i.item.positioned = false;
        i.item.position = Vec3::new(3.0, 0.0, 3.0);
        let decision = decide(&i);
        assert_eq!(decision.goal, AgentGoal::AcquireItem);
        assert_eq!(decision.target, Some(Target::Point(Vec3::new(3.0, 0.0, 3.0))));
    }

    #[test]
    fn holding_agent_delivers() {
        let mut i = input(&[]);
        i.item.holder = Some(EntityId::new(9, 0));
        i.item.positioned = false;
        i.agent_holds_item = true;
        assert_eq!(decide(&i).goal, AgentGoal::DeliverItem);
    }

    #[test]
    fn delivery_sends_the_agent_home_once() {
        let avatars = [avatar(0, 1.0, false, true)];
        let mut i = input(&avatars);
        i.delivered_this_tick = true;
        assert_eq!(decide(&i).goal, AgentGoal::ReturnToBase);
        i.delivered_this_tick = false;
        assert_eq!(decide(&i).goal, AgentGoal::Pursue);
    }

    #[test]
    fn nobody_tracked_means_idle() {
        assert_eq!(decide(&input(&[])), Decision::idle());
    }

    #[test]
    fn everyone_safe_means_return_to_base() {
        let avatars = [avatar(0, 1.0, true, true), avatar(1, 2.0, true, false)];
        let decision = decide(&input(&avatars));
        assert_eq!(decision.goal, AgentGoal::ReturnToBase);
        assert_eq!(decision.target, Some(Target::Point(Vec3::new(0.0, 0.0, 6.0))));
    }

    #[test]
    fn pursues_the_nearest_exposed_avatar_mid_pickup() {
        let avatars = [
            avatar(0, 1.0, false, false),
            avatar(1, 8.0, false, true),
            avatar(2, 4.0, false, true),
            avatar(3, 0.5, true, true),
        ];
        let decision = decide(&input(&avatars));
        assert_eq!(decision.goal, AgentGoal::Pursue);
        assert_eq!(
            decision.target,
            Some(Target::Avatar {
                id: EntityId::new(2, 0),
                position: Vec3::new(4.0, 0.0, 0.0)
            })
        );
    }

    #[test]
    fn exposed_avatars_not_picking_up_leave_the_agent_idle() {
        let avatars = [avatar(0, 1.0, false, false)];
        assert_eq!(decide(&input(&avatars)).goal, AgentGoal::Idle);
    }

    #[test]
    fn brain_refreshes_on_interval_and_reports_goal_changes() {
        let mut brain = AgentBrain::default();
        assert!(brain.refresh_due(0));
        brain.refresh(vec![EntityId::new(0, 0)], 0, 300);
        assert!(!brain.refresh_due(299));
        assert!(brain.refresh_due(300));
        assert_eq!(brain.tracked().len(), 1);

        assert!(!brain.set_goal(AgentGoal::Idle));
        assert!(brain.set_goal(AgentGoal::Pursue));
        brain.note_delivery();
        assert!(brain.take_delivered());
        assert!(!brain.take_delivered());
    }
}
