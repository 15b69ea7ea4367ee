//! The authoritative simulation.
//!
//! One [`Authority`] value owns every registry the game needs (ownership,
//! discrete state, safe zone, agent memory, deferred work) and is the only
//! thing allowed to mutate them. Hosts feed it intents and trigger events,
//! call [`Authority::tick`] at a fixed rate and forward what comes out.

use std::collections::BTreeMap;

use kickcan_protocol::{
    ActionKind, ActionState, AgentGoal, Command, Control, Cue, EntityId, EntityKind, EntitySnapshot,
    EntityTag, Event, ItemId, ItemSnapshot, MoveIntent, ReleaseKind, Transform, TransformSample,
    TriggerEdge, TriggerEvent, Vec3, VolumeTag, WorldSnapshot,
};
use tracing::{debug, info, trace};

use crate::agent::{decide, AgentBrain, AvatarView, DecisionInput};
use crate::commands::{CommandChannel, Inbound};
use crate::config::{ConfigError, SimConfig};
use crate::entities::Arena;
use crate::error::Denial;
use crate::locomotion::{steer_toward, Locomotion, NodeRole};
use crate::outbox::{Envelope, Outbox};
use crate::ownership::{Grant, ItemStatus, OwnershipRegistry, Released};
use crate::safe_zone::SafeZoneRegistry;
use crate::scheduler::{Deferred, Scheduler};
use crate::state_channel::StateChannel;
use crate::tick::TickContext;
use crate::transform::TransformPublisher;

/// Authority-side record of an avatar or agent.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    pub control: Control,
    pub transform: Transform,
    /// Latest movement intent; avatars only.
    pub intent: MoveIntent,
    pub score: u32,
    /// Caught avatars stay in the world but no longer act.
    pub caught: bool,
}

/// Everything a tick produced for the host to deliver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickOutput {
    pub tick: u64,
    /// Reliable events and cues in confirmation order.
    pub envelopes: Vec<Envelope>,
    /// Transform samples for the unreliable channel; empty between publications.
    pub transforms: Vec<TransformSample>,
}

pub struct Authority {
    config: SimConfig,
    locomotion: Locomotion,
    clock: TickContext,
    entities: Arena<EntityTag, Entity>,
    states: StateChannel,
    commands: CommandChannel,
    ownership: OwnershipRegistry,
    safe_zone: SafeZoneRegistry,
    brains: BTreeMap<EntityId, AgentBrain>,
    scheduler: Scheduler<Deferred>,
    publisher: TransformPublisher,
    outbox: Outbox,
    triggers: Vec<TriggerEvent>,
    avatars_spawned: u32,
}

impl Authority {
    /// Builds a session: the item at its spawn slot plus the configured agents.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut authority = Self {
            locomotion: Locomotion::from_config(&config),
            clock: TickContext::new(config.tick_rate_hz),
            entities: Arena::default(),
            states: StateChannel::default(),
            commands: CommandChannel::default(),
            ownership: OwnershipRegistry::new(config.ticks(config.pickup_cooldown)),
            safe_zone: SafeZoneRegistry::default(),
            brains: BTreeMap::new(),
            scheduler: Scheduler::default(),
            publisher: TransformPublisher::new(config.publish_interval_ticks()),
            outbox: Outbox::default(),
            triggers: Vec::new(),
            avatars_spawned: 0,
            config,
        };

        let slot = Transform::at(authority.config.item_spawn);
        let item = authority.ownership.spawn(slot, true);
        authority.outbox.broadcast(Event::ItemSpawned {
            item,
            transform: slot,
            positioned: true,
        });

        for n in 0..authority.config.agent_count {
            authority.spawn_agent(format!("agent-{n}"));
        }
        Ok(authority)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.tick
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn state_of(&self, id: EntityId) -> Option<ActionState> {
        self.states.state(id)
    }

    pub fn is_safe(&self, id: EntityId) -> bool {
        self.safe_zone.is_safe(id)
    }

    pub fn safe_zone(&self) -> &SafeZoneRegistry {
        &self.safe_zone
    }

    pub fn ownership(&self) -> &OwnershipRegistry {
        &self.ownership
    }

    pub fn item_status(&self) -> ItemStatus {
        self.ownership.status()
    }

    pub fn agent_goal(&self, agent: EntityId) -> Option<AgentGoal> {
        self.brains.get(&agent).map(AgentBrain::goal)
    }

    pub fn agents(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.brains.keys().copied()
    }

    /// Admits a new avatar. The first one appears at the avatar spawn point,
    /// later ones on a ring around it.
    pub fn spawn_avatar(&mut self, name: impl Into<String>) -> EntityId {
        let n = self.avatars_spawned;
        self.avatars_spawned += 1;

        let origin = self.config.avatar_spawn;
        let position = if n == 0 {
            origin
        } else {
            let angle = (n as f32 * 45.0).to_radians();
            origin + Vec3::new(angle.cos(), 0.0, angle.sin()) * self.config.spawn_ring_radius
        };

        let id = self.insert_entity(
            EntityKind::Avatar,
            Control::ObserverControlled,
            name.into(),
            Transform::at(position),
        );
        self.safe_zone.register(id, self.config.avatars_start_safe);
        id
    }

    pub fn spawn_agent(&mut self, name: impl Into<String>) -> EntityId {
        let offset = Vec3::new(1.5 * self.brains.len() as f32, 0.0, 0.0);
        let position = self.config.agent.base_position + offset;
        let id = self.insert_entity(
            EntityKind::Agent,
            Control::AuthorityControlled,
            name.into(),
            Transform::at(position),
        );
        self.safe_zone.register(id, false);
        self.brains.insert(id, AgentBrain::default());
        id
    }

    fn insert_entity(
        &mut self,
        kind: EntityKind,
        control: Control,
        name: String,
        transform: Transform,
    ) -> EntityId {
        let id = self.entities.insert(Entity {
            kind,
            name: name.clone(),
            control,
            transform,
            intent: MoveIntent::STOP,
            score: 0,
            caught: false,
        });
        self.states.register(id, ActionState::Idle);
        info!(entity = %id, ?kind, %name, "entity spawned");
        self.outbox.broadcast(Event::EntitySpawned {
            entity: id,
            kind,
            name,
            transform,
            state: ActionState::Idle,
        });
        id
    }

    /// Removes an entity. Anything it was holding is dropped where it stood.
    pub fn despawn(&mut self, id: EntityId) -> Result<(), Denial> {
        let position = self.entities.get(id).ok_or(Denial::UnknownEntity)?.transform.position;

        if let Some(item) = self.ownership.held_by(id) {
            self.release(id, item, ReleaseKind::Drop, Transform::at(position), false)?;
        }

        self.entities.remove(id);
        self.states.remove(id);
        self.safe_zone.remove(id);
        self.commands.forget(id);
        self.brains.remove(&id);
        self.ownership.forget(id);

        info!(entity = %id, "entity despawned");
        self.outbox.broadcast(Event::EntityDespawned { entity: id });
        Ok(())
    }

    /// Queues an intent from the observer owning `from`.
    pub fn submit(&mut self, from: EntityId, command: Command) -> Result<(), Denial> {
        if !self.entities.contains(from) {
            return Err(Denial::UnknownEntity);
        }
        self.commands.submit(from, command)
    }

    /// Queues an enter/exit notification from the collision collaborator.
    pub fn report_trigger(&mut self, event: TriggerEvent) {
        self.triggers.push(event);
    }

    /// Advances the simulation by one fixed step.
    pub fn tick(&mut self) -> TickOutput {
        self.clock.advance();
        let now = self.clock.tick;

        for entity in self.states.expire(now) {
            trace!(entity = %entity, "transition finished");
        }
        self.run_deferred(now);
        self.apply_triggers();

        for inbound in self.commands.drain() {
            if let Err(denial) = self.apply(inbound) {
                debug!(entity = %inbound.from, command = ?inbound.command, %denial, "intent denied");
            }
        }

        self.move_avatars();
        self.run_agents(now);
        self.sync_held_item();

        for event in self.states.flush() {
            self.outbox.broadcast(event);
        }

        let transforms = if self.publisher.is_due(now) {
            self.publisher.publish(self.transform_samples())
        } else {
            Vec::new()
        };

        TickOutput {
            tick: now,
            envelopes: self.outbox.drain(),
            transforms,
        }
    }

    /// Full replicated state for joining or resyncing observers.
    pub fn snapshot(&self) -> WorldSnapshot {
        let entities = self
            .entities
            .iter()
            .map(|(id, entity)| EntitySnapshot {
                id,
                kind: entity.kind,
                name: entity.name.clone(),
                transform: entity.transform,
                state: self.states.state(id).unwrap_or_default(),
                held_item: self.ownership.held_by(id),
                score: entity.score,
                caught: entity.caught,
            })
            .collect();

        let item = self.ownership.current().and_then(|id| {
            let instance = self.ownership.instance(id)?;
            Some(ItemSnapshot {
                id,
                transform: instance.transform,
                holder: instance.holder,
                positioned: instance.positioned,
            })
        });

        WorldSnapshot {
            tick: self.clock.tick,
            entities,
            item,
        }
    }

    fn apply(&mut self, inbound: Inbound) -> Result<(), Denial> {
        let Inbound { from, command } = inbound;
        let entity = self.entities.get(from).ok_or(Denial::UnknownEntity)?;
        if entity.caught || self.states.is_blocked(from) {
            return Err(Denial::ActionBlocked);
        }

        match command {
            Command::Move { intent } => {
                if let Some(entity) = self.entities.get_mut(from) {
                    entity.intent = intent.clamped();
                }
                Ok(())
            }
            Command::Action {
                kind: ActionKind::Pickup,
            } => self.try_pickup(from).map(|_| ()),
            Command::Action {
                kind: ActionKind::Throw,
            } => self.throw(from),
            Command::Action {
                kind: ActionKind::Jump,
            } => {
                let ends_at = self.clock.after(self.config.ticks(self.config.jump_duration));
                self.states.begin_transition(from, ActionState::Jump, ends_at)
            }
        }
    }

    fn try_pickup(&mut self, entity: EntityId) -> Result<Grant, Denial> {
        if self.states.is_blocked(entity) {
            return Err(Denial::ActionBlocked);
        }
        if self.ownership.held_by(entity).is_some() {
            // Already holding: duplicate pickups change nothing.
            return Err(Denial::StaleCommand);
        }

        let now = self.clock.tick;
        let item = self.ownership.current().ok_or(Denial::ItemUnavailable)?;
        self.ownership.check_pickup(entity, item, now)?;

        let position = self
            .entities
            .get(entity)
            .ok_or(Denial::UnknownEntity)?
            .transform
            .position;
        let item_position = self
            .ownership
            .instance(item)
            .ok_or(Denial::ItemUnavailable)?
            .transform
            .position;
        if position.horizontal_distance(item_position) > self.config.pickup_range {
            return Err(Denial::OutOfRange);
        }

        let grant = self.ownership.request_pickup(entity, item, now)?;
        let ends_at = self.clock.after(self.config.ticks(self.config.pick_duration));
        self.states.begin_transition(entity, ActionState::Pick, ends_at)?;
        self.stop(entity);

        debug!(entity = %entity, item = %item, from_slot = grant.from_slot, "pickup granted");
        self.outbox.broadcast(Event::ItemPickedUp {
            item,
            holder: entity,
        });
        Ok(grant)
    }

    fn throw(&mut self, entity: EntityId) -> Result<(), Denial> {
        let item = self.ownership.held_by(entity).ok_or(Denial::NotHolder)?;
        let (kind, transform) = {
            let record = self.entities.get(entity).ok_or(Denial::UnknownEntity)?;
            (record.kind, record.transform)
        };

        let landing = Transform::new(
            transform.position + transform.forward() * self.config.throw_distance,
            transform.yaw,
        );
        let released = self.release(entity, item, ReleaseKind::Throw, landing, false)?;

        let ends_at = self.clock.after(self.config.ticks(self.config.throw_duration));
        self.states.begin_transition(entity, ActionState::Throw, ends_at)?;
        self.stop(entity);

        if released.from_slot && kind == EntityKind::Avatar {
            if let Some(record) = self.entities.get_mut(entity) {
                record.score += 1;
                let score = record.score;
                info!(entity = %entity, score, "scored");
                self.outbox.broadcast(Event::ScoreChanged { entity, score });
            }
        }
        Ok(())
    }

    fn place_back(&mut self, agent: EntityId) -> Result<(), Denial> {
        let item = self.ownership.held_by(agent).ok_or(Denial::NotHolder)?;
        let slot = Transform::at(self.config.item_spawn);
        self.release(agent, item, ReleaseKind::PlaceBack, slot, true)?;

        let ends_at = self.clock.after(self.config.ticks(self.config.put_duration));
        self.states.begin_transition(agent, ActionState::PutItem, ends_at)?;

        if let Some(brain) = self.brains.get_mut(&agent) {
            brain.note_delivery();
        }
        info!(agent = %agent, item = %item, "item delivered");
        self.outbox.broadcast(Event::ItemDelivered { item, by: agent });
        Ok(())
    }

    /// Releases `item` and schedules its replacement and its retirement.
    fn release(
        &mut self,
        holder: EntityId,
        item: ItemId,
        kind: ReleaseKind,
        respawn_at: Transform,
        positioned: bool,
    ) -> Result<Released, Denial> {
        let now = self.clock.tick;
        let released = self
            .ownership
            .request_release(holder, item, kind, respawn_at, positioned, now)?;

        self.scheduler.schedule(
            self.clock.after(self.config.ticks(self.config.respawn_delay)),
            Deferred::SpawnItem {
                ticket: released.ticket,
            },
        );
        self.scheduler.schedule(
            self.clock.after(self.config.ticks(self.config.retire_delay)),
            Deferred::RetireItem { item },
        );

        debug!(holder = %holder, item = %item, ?kind, "item released");
        self.outbox
            .broadcast(Event::ItemReleased { item, holder, kind });
        Ok(released)
    }

    fn stop(&mut self, entity: EntityId) {
        if let Some(record) = self.entities.get_mut(entity) {
            record.intent = MoveIntent::STOP;
        }
    }

    fn run_deferred(&mut self, now: u64) {
        for action in self.scheduler.due(now) {
            match action {
                Deferred::SpawnItem { ticket } => match self.ownership.complete_spawn(ticket) {
                    Some((item, spawn)) => {
                        debug!(item = %item, positioned = spawn.positioned, "item respawned");
                        self.outbox.broadcast(Event::ItemSpawned {
                            item,
                            transform: spawn.transform,
                            positioned: spawn.positioned,
                        });
                    }
                    None => trace!(ticket, "respawn skipped"),
                },
                Deferred::RetireItem { item } => {
                    if self.ownership.retire(item) {
                        self.outbox.broadcast(Event::ItemRetired { item });
                    } else {
                        trace!(item = %item, "retire skipped");
                    }
                }
            }
        }
    }

    fn apply_triggers(&mut self) {
        for trigger in std::mem::take(&mut self.triggers) {
            let Some(kind) = self.entities.get(trigger.entity).map(|e| e.kind) else {
                continue;
            };
            match (trigger.volume, trigger.edge) {
                (VolumeTag::SafeZone, TriggerEdge::Enter) => {
                    if self.safe_zone.on_enter(trigger.entity) && kind == EntityKind::Avatar {
                        self.outbox.notify(trigger.entity, Cue::EnteredSafeZone);
                    }
                }
                (VolumeTag::SafeZone, TriggerEdge::Exit) => {
                    if self.safe_zone.on_exit(trigger.entity) && kind == EntityKind::Avatar {
                        self.outbox.notify(trigger.entity, Cue::LeftSafeZone);
                    }
                }
                (VolumeTag::CatchZone(agent), TriggerEdge::Enter) => {
                    self.catch(trigger.entity, agent);
                }
                (VolumeTag::CatchZone(_), TriggerEdge::Exit) => {}
            }
        }
    }

    fn catch(&mut self, avatar: EntityId, agent: EntityId) {
        let catchable = self
            .entities
            .get(avatar)
            .is_some_and(|e| e.kind == EntityKind::Avatar && !e.caught);
        let by_agent = self
            .entities
            .get(agent)
            .is_some_and(|e| e.kind == EntityKind::Agent);
        if !catchable || !by_agent || self.safe_zone.is_safe(avatar) {
            return;
        }

        if let Some(item) = self.ownership.held_by(avatar) {
            let position = self
                .entities
                .get(avatar)
                .map(|e| e.transform.position)
                .unwrap_or(self.config.item_spawn);
            if let Err(denial) =
                self.release(avatar, item, ReleaseKind::Drop, Transform::at(position), false)
            {
                debug!(entity = %avatar, %denial, "drop on catch failed");
            }
        }

        if let Some(record) = self.entities.get_mut(avatar) {
            record.caught = true;
            record.intent = MoveIntent::STOP;
        }
        let _ = self.states.set_state(avatar, ActionState::Idle);

        info!(avatar = %avatar, agent = %agent, "avatar caught");
        self.outbox.broadcast(Event::AvatarCaught { avatar, by: agent });
        let cue = Cue::GameOver { caught_by: agent };
        if self.config.global_game_over {
            self.outbox.cue_all(cue);
        } else {
            self.outbox.notify(avatar, cue);
        }
    }

    fn move_avatars(&mut self) {
        let dt = self.clock.dt_seconds;
        for (id, entity) in self.entities.iter_mut() {
            if entity.kind != EntityKind::Avatar || entity.caught || self.states.is_blocked(id) {
                continue;
            }
            let Some(step) = self.locomotion.step(
                NodeRole::Authority,
                entity.control,
                entity.transform,
                entity.intent,
                dt,
            ) else {
                continue;
            };
            entity.transform = step.transform;
            let _ = self.states.set_locomotion(id, step.state);
        }
    }

    fn run_agents(&mut self, now: u64) {
        let interval = self.config.ticks(self.config.agent.target_refresh_interval);
        let agents: Vec<EntityId> = self.brains.keys().copied().collect();
        for agent in agents {
            self.step_agent(agent, now, interval);
        }
    }

    fn step_agent(&mut self, agent: EntityId, now: u64, refresh_interval: u64) {
        let Some(transform) = self.entities.get(agent).map(|e| e.transform) else {
            return;
        };

        let candidates: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.kind == EntityKind::Avatar && !e.caught)
            .map(|(id, _)| id)
            .collect();
        let Some(brain) = self.brains.get_mut(&agent) else {
            return;
        };
        if brain.refresh_due(now) {
            brain.refresh(candidates, now, refresh_interval);
        }
        let delivered = brain.take_delivered();
        let tracked = brain.tracked().to_vec();

        let views: Vec<AvatarView> = tracked
            .iter()
            .filter_map(|&id| {
                let avatar = self.entities.get(id).filter(|e| !e.caught)?;
                Some(AvatarView {
                    id,
                    position: avatar.transform.position,
                    safe: self.safe_zone.is_safe(id),
                    picking_up: self.states.state(id) == Some(ActionState::Pick),
                })
            })
            .collect();

        let decision = decide(&DecisionInput {
            agent_position: transform.position,
            item: self.ownership.status(),
            agent_holds_item: self.ownership.held_by(agent).is_some(),
            delivered_this_tick: delivered,
            avatars: &views,
            spawn_slot: self.config.item_spawn,
            base: self.config.agent.base_position,
        });

        if let Some(brain) = self.brains.get_mut(&agent) {
            if brain.set_goal(decision.goal) {
                debug!(agent = %agent, goal = ?decision.goal, "agent goal changed");
                self.outbox.broadcast(Event::AgentGoalChanged {
                    agent,
                    goal: decision.goal,
                });
            }
        }

        if self.states.is_blocked(agent) {
            return;
        }

        let target = match (decision.goal, decision.target) {
            (AgentGoal::Idle, _) | (_, None) => {
                let _ = self.states.set_locomotion(agent, ActionState::Idle);
                return;
            }
            (_, Some(target)) => target,
        };

        let tuning = &self.config.agent;
        let step = steer_toward(
            transform,
            target.position(),
            tuning.follow_speed,
            tuning.rotation_speed,
            tuning.stopping_distance,
            self.clock.dt_seconds,
        );
        if let Some(record) = self.entities.get_mut(agent) {
            record.transform = step.transform;
        }
        let _ = self.states.set_locomotion(agent, step.state);

        if step.state != ActionState::Idle {
            return;
        }
        let arrived = match decision.goal {
            AgentGoal::AcquireItem => self.try_pickup(agent).map(|_| ()),
            AgentGoal::DeliverItem => self.place_back(agent),
            _ => Ok(()),
        };
        if let Err(denial) = arrived {
            trace!(agent = %agent, %denial, "agent action denied");
        }
    }

    fn sync_held_item(&mut self) {
        let hand = self.config.hand_offset;
        let entities = &self.entities;
        self.ownership.follow_holder(|holder| {
            let transform = entities.get(holder)?.transform;
            Some(Transform::new(transform.transform_point(hand), transform.yaw))
        });
    }

    fn transform_samples(&self) -> Vec<TransformSample> {
        let mut samples: Vec<TransformSample> = self
            .entities
            .iter()
            .map(|(entity, record)| TransformSample::Entity {
                entity,
                transform: record.transform,
            })
            .collect();
        if let Some(item) = self.ownership.current() {
            if let Some(instance) = self.ownership.instance(item) {
                samples.push(TransformSample::Item {
                    item,
                    transform: instance.transform,
                });
            }
        }
        samples
    }
}
