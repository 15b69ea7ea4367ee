use kickcan_protocol::{angle_delta, wrap_angle, ActionState, Control, MoveIntent, Transform, Vec3};

use crate::config::SimConfig;

/// Capability flag passed to shared movement code instead of asking a
/// global "am I the server" question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Authority,
    Observer,
}

impl NodeRole {
    /// Whether a node in this role may author motion for an entity with the
    /// given control mode.
    pub fn may_steer(self, control: Control) -> bool {
        match self {
            NodeRole::Authority => true,
            NodeRole::Observer => control == Control::ObserverControlled,
        }
    }
}

/// Result of one movement step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    pub transform: Transform,
    pub state: ActionState,
}

/// Movement model shared by the authority and by observers predicting their
/// own avatar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Locomotion {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub rotation_speed: f32,
}

impl Locomotion {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            walk_speed: config.walk_speed,
            run_speed: config.run_speed,
            rotation_speed: config.rotation_speed,
        }
    }

    /// Applies an intent for one tick. Returns `None` when `role` may not
    /// author motion for an entity under `control`.
    pub fn step(
        &self,
        role: NodeRole,
        control: Control,
        current: Transform,
        intent: MoveIntent,
        dt: f32,
    ) -> Option<Step> {
        if !role.may_steer(control) {
            return None;
        }

        let intent = intent.clamped();
        if !intent.is_moving() {
            return Some(Step {
                transform: current,
                state: ActionState::Idle,
            });
        }

        let direction = Vec3::new(intent.x, 0.0, intent.z).normalized_or_zero();
        let (speed, state) = if intent.run {
            (self.run_speed, ActionState::Run)
        } else {
            (self.walk_speed, ActionState::Walk)
        };

        let mut transform = current;
        transform.position += direction * (speed * dt.max(0.0));
        if let Some(facing) = direction.yaw() {
            transform.yaw = turn_toward(current.yaw, facing, self.rotation_speed, dt);
        }
        Some(Step { transform, state })
    }
}

const ARRIVAL_EPSILON: f32 = 1e-3;

/// Moves `current` toward `target` at `speed`, stopping `stop_radius` short
/// of it. Always turns to face the target.
pub fn steer_toward(
    current: Transform,
    target: Vec3,
    speed: f32,
    rotation_speed: f32,
    stop_radius: f32,
    dt: f32,
) -> Step {
    let offset = (target - current.position).flat();
    let distance = offset.length();

    let mut transform = current;
    if let Some(facing) = offset.yaw() {
        transform.yaw = turn_toward(current.yaw, facing, rotation_speed, dt);
    }

    let remaining = distance - stop_radius;
    if remaining <= ARRIVAL_EPSILON {
        return Step {
            transform,
            state: ActionState::Idle,
        };
    }

    let travel = (speed.max(0.0) * dt.max(0.0)).min(remaining);
    transform.position += offset.normalized_or_zero() * travel;
    Step {
        transform,
        state: ActionState::Run,
    }
}

/// Rotates a fraction of the remaining angle, proportional to `rate * dt`.
pub fn turn_toward(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    let t = (rate * dt).clamp(0.0, 1.0);
    wrap_angle(current + angle_delta(current, target) * t)
}
