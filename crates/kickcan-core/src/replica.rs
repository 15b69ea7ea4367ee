//! Observer-side mirror of the authoritative world.
//!
//! A [`Replica`] never decides anything. It applies confirmed events and
//! transform samples, smooths remote motion, and predicts the local avatar's
//! locomotion so input feels immediate. Authority notifications always win
//! for anything other than locomotion.

use std::collections::BTreeMap;

use kickcan_protocol::{
    ActionState, AgentGoal, Command, Control, Cue, EntityId, EntityKind, Event, ItemId, MoveIntent,
    Transform, TransformSample, Vec3, WorldSnapshot,
};
use tracing::{debug, warn};

use crate::config::SimConfig;
use crate::error::Denial;
use crate::locomotion::{Locomotion, NodeRole};
use crate::transform::SmoothedTransform;

/// Local drift from the authority beyond this snaps the predicted avatar back.
const RECONCILE_DISTANCE: f32 = 1.0;
/// Unchanged intents are repeated this often since they travel unreliably.
const INTENT_REPEAT_FRAMES: u32 = 15;

/// Receives discrete state changes to drive animation.
pub trait AnimationSink {
    fn play(&mut self, entity: EntityId, state: ActionState);
}

#[derive(Clone, Debug)]
pub struct ReplicaEntity {
    pub kind: EntityKind,
    pub name: String,
    pub control: Control,
    pub state: ActionState,
    pub held_item: Option<ItemId>,
    pub score: u32,
    pub caught: bool,
    /// Last goal announced for an agent.
    pub goal: Option<AgentGoal>,
    motion: SmoothedTransform,
}

impl ReplicaEntity {
    pub fn transform(&self) -> Transform {
        self.motion.current()
    }
}

#[derive(Clone, Debug)]
pub struct ReplicaItem {
    pub id: ItemId,
    pub holder: Option<EntityId>,
    pub positioned: bool,
    motion: SmoothedTransform,
}

impl ReplicaItem {
    pub fn transform(&self) -> Transform {
        self.motion.current()
    }
}

pub struct Replica {
    local: Option<EntityId>,
    entities: BTreeMap<EntityId, ReplicaEntity>,
    item: Option<ReplicaItem>,
    locomotion: Locomotion,
    hand_offset: Vec3,
    smooth_time: f32,
    animation: Option<Box<dyn AnimationSink + Send>>,
    warned_missing_sink: bool,
    last_intent: Option<MoveIntent>,
    frames_since_intent: u32,
    cues: Vec<Cue>,
    safe: bool,
    caught_by: Option<EntityId>,
    tick: u64,
}

impl Replica {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            local: None,
            entities: BTreeMap::new(),
            item: None,
            locomotion: Locomotion::from_config(config),
            hand_offset: config.hand_offset,
            smooth_time: SmoothedTransform::DEFAULT_SMOOTH_TIME,
            animation: None,
            warned_missing_sink: false,
            last_intent: None,
            frames_since_intent: 0,
            cues: Vec::new(),
            safe: config.avatars_start_safe,
            caught_by: None,
            tick: 0,
        }
    }

    pub fn with_animation_sink(mut self, sink: Box<dyn AnimationSink + Send>) -> Self {
        self.animation = Some(sink);
        self
    }

    /// Marks `entity` as the avatar this observer drives.
    pub fn set_local(&mut self, entity: EntityId) {
        self.local = Some(entity);
        self.last_intent = None;
        for (&id, replica) in &mut self.entities {
            replica.control = control_for(Some(entity), id);
        }
    }

    pub fn local(&self) -> Option<EntityId> {
        self.local
    }

    pub fn entity(&self, id: EntityId) -> Option<&ReplicaEntity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &ReplicaEntity)> {
        self.entities.iter().map(|(&id, entity)| (id, entity))
    }

    pub fn state_of(&self, id: EntityId) -> Option<ActionState> {
        self.entities.get(&id).map(|e| e.state)
    }

    pub fn transform_of(&self, id: EntityId) -> Option<Transform> {
        self.entities.get(&id).map(ReplicaEntity::transform)
    }

    pub fn item(&self) -> Option<&ReplicaItem> {
        self.item.as_ref()
    }

    /// Whether the local avatar was last reported inside the safe zone.
    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// The agent that caught the local avatar, once the game is over.
    pub fn caught_by(&self) -> Option<EntityId> {
        self.caught_by
    }

    pub fn last_tick(&self) -> u64 {
        self.tick
    }

    pub fn take_cues(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.cues)
    }

    /// Replaces everything with a full snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) {
        self.tick = snapshot.tick;
        self.entities.clear();
        for entity in &snapshot.entities {
            self.entities.insert(
                entity.id,
                ReplicaEntity {
                    kind: entity.kind,
                    name: entity.name.clone(),
                    control: control_for(self.local, entity.id),
                    state: entity.state,
                    held_item: entity.held_item,
                    score: entity.score,
                    caught: entity.caught,
                    goal: None,
                    motion: SmoothedTransform::new(entity.transform, self.smooth_time),
                },
            );
            self.play(entity.id, entity.state);
        }

        self.item = snapshot.item.as_ref().map(|item| ReplicaItem {
            id: item.id,
            holder: item.holder,
            positioned: item.positioned,
            motion: SmoothedTransform::new(item.transform, self.smooth_time),
        });
        self.last_intent = None;
    }

    pub fn apply_events(&mut self, events: &[Event]) {
        for event in events {
            self.apply_event(event);
        }
    }

    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::EntitySpawned {
                entity,
                kind,
                name,
                transform,
                state,
            } => {
                self.entities.insert(
                    *entity,
                    ReplicaEntity {
                        kind: *kind,
                        name: name.clone(),
                        control: control_for(self.local, *entity),
                        state: *state,
                        held_item: None,
                        score: 0,
                        caught: false,
                        goal: None,
                        motion: SmoothedTransform::new(*transform, self.smooth_time),
                    },
                );
                self.play(*entity, *state);
            }
            Event::EntityDespawned { entity } => {
                self.entities.remove(entity);
                if let Some(item) = &mut self.item {
                    if item.holder == Some(*entity) {
                        item.holder = None;
                    }
                }
            }
            Event::StateChanged { entity, old, new } => self.on_state_changed(*entity, *old, *new),
            Event::ItemSpawned {
                item,
                transform,
                positioned,
            } => {
                self.item = Some(ReplicaItem {
                    id: *item,
                    holder: None,
                    positioned: *positioned,
                    motion: SmoothedTransform::new(*transform, self.smooth_time),
                });
            }
            Event::ItemPickedUp { item, holder } => {
                if let Some(current) = self.item.as_mut().filter(|i| i.id == *item) {
                    current.holder = Some(*holder);
                    current.positioned = false;
                }
                if let Some(entity) = self.entities.get_mut(holder) {
                    entity.held_item = Some(*item);
                }
            }
            Event::ItemReleased { item, holder, .. } => {
                if let Some(current) = self.item.as_mut().filter(|i| i.id == *item) {
                    current.holder = None;
                }
                if let Some(entity) = self.entities.get_mut(holder) {
                    if entity.held_item == Some(*item) {
                        entity.held_item = None;
                    }
                }
            }
            Event::ItemRetired { item } => {
                if self.item.as_ref().is_some_and(|i| i.id == *item) {
                    self.item = None;
                }
            }
            Event::ItemDelivered { item, by } => {
                debug!(item = %item, by = %by, "item delivered");
            }
            Event::ScoreChanged { entity, score } => {
                if let Some(record) = self.entities.get_mut(entity) {
                    record.score = *score;
                }
            }
            Event::AgentGoalChanged { agent, goal } => {
                if let Some(record) = self.entities.get_mut(agent) {
                    record.goal = Some(*goal);
                }
            }
            Event::AvatarCaught { avatar, .. } => {
                if let Some(record) = self.entities.get_mut(avatar) {
                    record.caught = true;
                }
            }
        }
    }

    pub fn apply_cue(&mut self, cue: Cue) {
        match &cue {
            Cue::EnteredSafeZone => self.safe = true,
            Cue::LeftSafeZone => self.safe = false,
            Cue::GameOver { caught_by } => self.caught_by = Some(*caught_by),
        }
        self.cues.push(cue);
    }

    pub fn apply_transforms(&mut self, samples: &[TransformSample]) {
        for sample in samples {
            match *sample {
                TransformSample::Entity { entity, transform } => {
                    let local = self.local == Some(entity);
                    let Some(record) = self.entities.get_mut(&entity) else {
                        continue;
                    };
                    if local && predicting(record) {
                        let drift = (record.motion.current().position - transform.position).length();
                        if drift > RECONCILE_DISTANCE {
                            debug!(entity = %entity, drift, "prediction corrected");
                            record.motion.snap(transform);
                        }
                    } else {
                        record.motion.set_target(transform);
                    }
                }
                TransformSample::Item { item, transform } => {
                    if let Some(current) = self.item.as_mut().filter(|i| i.id == item) {
                        current.motion.set_target(transform);
                    }
                }
            }
        }
    }

    /// Predicts the local avatar's motion for one frame and returns the
    /// intent to send, or `None` when there is nothing new to tell the
    /// authority. Unchanged intents are still repeated every few frames.
    pub fn predict_move(&mut self, intent: MoveIntent, dt: f32) -> Option<Command> {
        let local = self.local?;
        let record = self.entities.get_mut(&local)?;
        if !predicting(record) {
            return None;
        }

        let step = self.locomotion.step(
            NodeRole::Observer,
            record.control,
            record.motion.current(),
            intent,
            dt,
        )?;
        record.motion.snap(step.transform);
        if record.state != step.state && record.state.is_locomotion() {
            record.state = step.state;
            play(
                &mut self.animation,
                &mut self.warned_missing_sink,
                local,
                step.state,
            );
        }

        let intent = intent.clamped();
        self.frames_since_intent += 1;
        if self.last_intent == Some(intent) && self.frames_since_intent < INTENT_REPEAT_FRAMES {
            return None;
        }
        self.last_intent = Some(intent);
        self.frames_since_intent = 0;
        Some(Command::Move { intent })
    }

    /// Advances interpolation for everything the local observer does not predict.
    pub fn advance(&mut self, dt: f32) {
        for (&id, record) in &mut self.entities {
            if self.local == Some(id) && predicting(record) {
                continue;
            }
            record.motion.advance(dt);
        }

        let hand = self.hand_offset;
        if let Some(item) = &mut self.item {
            let anchor = item
                .holder
                .and_then(|holder| self.entities.get(&holder))
                .map(|holder| {
                    let t = holder.motion.current();
                    Transform::new(t.transform_point(hand), t.yaw)
                });
            match anchor {
                Some(transform) => item.motion.snap(transform),
                None => {
                    item.motion.advance(dt);
                }
            }
        }
    }

    fn on_state_changed(&mut self, entity: EntityId, old: ActionState, new: ActionState) {
        let local = self.local == Some(entity);
        let Some(record) = self.entities.get_mut(&entity) else {
            return;
        };

        // Locomotion on the local avatar is already predicted.
        if local && new.is_locomotion() && record.state.is_locomotion() {
            return;
        }
        if local && old.blocks_movement() && !new.blocks_movement() {
            // Movement resumes; make sure the authority hears the current input.
            self.last_intent = None;
        }
        if record.state == new {
            return;
        }
        record.state = new;
        self.play(entity, new);
    }

    fn play(&mut self, entity: EntityId, state: ActionState) {
        play(
            &mut self.animation,
            &mut self.warned_missing_sink,
            entity,
            state,
        );
    }
}

fn control_for(local: Option<EntityId>, entity: EntityId) -> Control {
    if local == Some(entity) {
        Control::ObserverControlled
    } else {
        Control::Remote
    }
}

fn predicting(record: &ReplicaEntity) -> bool {
    !record.caught && !record.state.blocks_movement()
}

fn play(
    sink: &mut Option<Box<dyn AnimationSink + Send>>,
    warned: &mut bool,
    entity: EntityId,
    state: ActionState,
) {
    match sink {
        Some(sink) => sink.play(entity, state),
        None if !*warned => {
            *warned = true;
            warn!(
                "{}; state changes will not be animated",
                Denial::MissingCollaboratorReference("animation sink")
            );
        }
        None => {}
    }
}
