//! Trigger-volume collaborator.
//!
//! Stands in for a physics engine's overlap callbacks: each tick it compares
//! avatar positions against the static safe zone and the catch spheres around
//! agents and reports membership changes as enter/exit edges.

use std::collections::BTreeSet;

use kickcan_core::Authority;
use kickcan_protocol::{EntityId, EntityKind, TriggerEvent, Vec3, VolumeTag};
use serde::{Deserialize, Serialize};

/// Axis-aligned box, inclusive on every face.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&point.x)
            && (self.min.y..=self.max.y).contains(&point.y)
            && (self.min.z..=self.max.z).contains(&point.z)
    }
}

pub struct TriggerVolumes {
    safe_zone: Aabb,
    catch_radius: f32,
    in_safe_zone: BTreeSet<EntityId>,
    /// (avatar, agent) pairs currently overlapping.
    in_reach: BTreeSet<(EntityId, EntityId)>,
}

impl TriggerVolumes {
    pub fn new(safe_zone: Aabb, catch_radius: f32) -> Self {
        Self {
            safe_zone,
            catch_radius,
            in_safe_zone: BTreeSet::new(),
            in_reach: BTreeSet::new(),
        }
    }

    /// Edges since the previous scan. Exits come before enters so an avatar
    /// crossing from the zone into reach is judged on its new membership.
    pub fn scan(&mut self, authority: &Authority) -> Vec<TriggerEvent> {
        let mut avatars = Vec::new();
        let mut agents = Vec::new();
        for (id, entity) in authority.entities() {
            match entity.kind {
                EntityKind::Avatar => avatars.push((id, entity.transform.position)),
                EntityKind::Agent => agents.push((id, entity.transform.position)),
            }
        }

        let safe_now: BTreeSet<EntityId> = avatars
            .iter()
            .filter(|(_, position)| self.safe_zone.contains(*position))
            .map(|(id, _)| *id)
            .collect();

        let radius_sq = self.catch_radius * self.catch_radius;
        let reach_now: BTreeSet<(EntityId, EntityId)> = avatars
            .iter()
            .flat_map(|&(avatar, position)| {
                agents.iter().filter_map(move |&(agent, agent_position)| {
                    let offset = position - agent_position;
                    let dist_sq = offset.x * offset.x + offset.y * offset.y + offset.z * offset.z;
                    (dist_sq <= radius_sq).then_some((avatar, agent))
                })
            })
            .collect();

        let live: BTreeSet<EntityId> = avatars.iter().chain(&agents).map(|(id, _)| *id).collect();
        self.in_safe_zone.retain(|id| live.contains(id));
        self.in_reach
            .retain(|(avatar, agent)| live.contains(avatar) && live.contains(agent));

        let mut edges = Vec::new();
        for &id in self.in_safe_zone.difference(&safe_now) {
            edges.push(TriggerEvent::exit(id, VolumeTag::SafeZone));
        }
        for &(avatar, agent) in self.in_reach.difference(&reach_now) {
            edges.push(TriggerEvent::exit(avatar, VolumeTag::CatchZone(agent)));
        }
        for &id in safe_now.difference(&self.in_safe_zone) {
            edges.push(TriggerEvent::enter(id, VolumeTag::SafeZone));
        }
        for &(avatar, agent) in reach_now.difference(&self.in_reach) {
            edges.push(TriggerEvent::enter(avatar, VolumeTag::CatchZone(agent)));
        }

        self.in_safe_zone = safe_now;
        self.in_reach = reach_now;
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_is_inclusive() {
        let zone = Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0));
        assert!(zone.contains(Vec3::new(1.0, 0.0, -1.0)));
        assert!(zone.contains(Vec3::ZERO));
        assert!(!zone.contains(Vec3::new(1.01, 0.0, 0.0)));
        assert!(!zone.contains(Vec3::new(0.0, -0.5, 0.0)));
    }
}
