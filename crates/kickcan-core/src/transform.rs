use std::collections::BTreeMap;

use kickcan_protocol::{angle_delta, wrap_angle, EntityId, ItemId, Transform, TransformSample, Vec3};

/// Samples that moved less than this are not worth resending.
const POSITION_EPSILON: f32 = 1e-3;
const YAW_EPSILON: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SampleKey {
    Entity(EntityId),
    Item(ItemId),
}

fn key_of(sample: &TransformSample) -> (SampleKey, Transform) {
    match *sample {
        TransformSample::Entity { entity, transform } => (SampleKey::Entity(entity), transform),
        TransformSample::Item { item, transform } => (SampleKey::Item(item), transform),
    }
}

fn moved(a: Transform, b: Transform) -> bool {
    (a.position - b.position).length() > POSITION_EPSILON
        || angle_delta(a.yaw, b.yaw).abs() > YAW_EPSILON
}

/// Authority-side transform publisher.
///
/// Runs at a fixed rate below the tick rate and only sends what changed since
/// the previous publication. Every `keyframe_every` publications all samples
/// go out regardless, so observers recover from lost unreliable packets.
#[derive(Clone, Debug)]
pub struct TransformPublisher {
    interval_ticks: u64,
    keyframe_every: u32,
    publications: u32,
    last_sent: BTreeMap<SampleKey, Transform>,
}

impl TransformPublisher {
    pub const DEFAULT_KEYFRAME_EVERY: u32 = 10;

    pub fn new(interval_ticks: u64) -> Self {
        Self {
            interval_ticks: interval_ticks.max(1),
            keyframe_every: Self::DEFAULT_KEYFRAME_EVERY,
            publications: 0,
            last_sent: BTreeMap::new(),
        }
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.interval_ticks == 0
    }

    pub fn publish(&mut self, samples: Vec<TransformSample>) -> Vec<TransformSample> {
        let keyframe = self.publications % self.keyframe_every == 0;
        self.publications = self.publications.wrapping_add(1);

        let mut live = BTreeMap::new();
        let mut out = Vec::new();
        for sample in samples {
            let (key, transform) = key_of(&sample);
            let changed = self
                .last_sent
                .get(&key)
                .map_or(true, |&previous| moved(previous, transform));
            if keyframe || changed {
                out.push(sample);
                live.insert(key, transform);
            } else if let Some(&previous) = self.last_sent.get(&key) {
                live.insert(key, previous);
            }
        }
        // Keys that were not offered this round belong to despawned or retired things.
        self.last_sent = live;
        out
    }
}

/// Observer-side smoothing toward the newest authoritative sample.
///
/// Critically damped spring per axis: no overshoot, converges in roughly
/// `smooth_time` seconds regardless of the sample rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothedTransform {
    current: Transform,
    target: Transform,
    velocity: Vec3,
    yaw_velocity: f32,
    smooth_time: f32,
}

impl SmoothedTransform {
    pub const DEFAULT_SMOOTH_TIME: f32 = 0.1;

    pub fn new(initial: Transform, smooth_time: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            velocity: Vec3::ZERO,
            yaw_velocity: 0.0,
            smooth_time: smooth_time.max(1e-4),
        }
    }

    pub fn current(&self) -> Transform {
        self.current
    }

    pub fn target(&self) -> Transform {
        self.target
    }

    pub fn set_target(&mut self, target: Transform) {
        self.target = target;
    }

    /// Jumps straight to `transform` and forgets any motion.
    pub fn snap(&mut self, transform: Transform) {
        self.current = transform;
        self.target = transform;
        self.velocity = Vec3::ZERO;
        self.yaw_velocity = 0.0;
    }

    pub fn advance(&mut self, dt: f32) -> Transform {
        let dt = dt.max(0.0);
        let (x, vx) = smooth_damp(
            self.current.position.x,
            self.target.position.x,
            self.velocity.x,
            self.smooth_time,
            dt,
        );
        let (y, vy) = smooth_damp(
            self.current.position.y,
            self.target.position.y,
            self.velocity.y,
            self.smooth_time,
            dt,
        );
        let (z, vz) = smooth_damp(
            self.current.position.z,
            self.target.position.z,
            self.velocity.z,
            self.smooth_time,
            dt,
        );
        self.current.position = Vec3::new(x, y, z);
        self.velocity = Vec3::new(vx, vy, vz);

        // Unwrap the target so the spring takes the short way round.
        let yaw_target = self.current.yaw + angle_delta(self.current.yaw, self.target.yaw);
        let (yaw, yaw_velocity) = smooth_damp(
            self.current.yaw,
            yaw_target,
            self.yaw_velocity,
            self.smooth_time,
            dt,
        );
        self.current.yaw = wrap_angle(yaw);
        self.yaw_velocity = yaw_velocity;
        self.current
    }
}

/// One step of a critically damped spring. Returns the new value and velocity.
fn smooth_damp(current: f32, target: f32, velocity: f32, smooth_time: f32, dt: f32) -> (f32, f32) {
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);
    let change = current - target;
    let temp = (velocity + omega * change) * dt;
    let velocity = (velocity - omega * temp) * decay;
    let mut value = target + (change + temp) * decay;

    // Never overshoot the target.
    if (target - current > 0.0) == (value > target) {
        value = target;
        return (value, 0.0);
    }
    (value, velocity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_changed_samples_go_out_between_keyframes() {
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        let still = Transform::default();
        let mut publisher = TransformPublisher::new(3);
        assert!(publisher.is_due(0));
        assert!(!publisher.is_due(1));

        let first = publisher.publish(vec![
            TransformSample::Entity { entity: a, transform: still },
            TransformSample::Entity { entity: b, transform: still },
        ]);
        assert_eq!(first.len(), 2);

        let moved_b = Transform::at(Vec3::new(1.0, 0.0, 0.0));
        let second = publisher.publish(vec![
            TransformSample::Entity { entity: a, transform: still },
            TransformSample::Entity { entity: b, transform: moved_b },
        ]);
        assert_eq!(
            second,
            vec![TransformSample::Entity {
                entity: b,
                transform: moved_b
            }]
        );
    }

    #[test]
    fn keyframes_resend_everything() {
        let a = EntityId::new(0, 0);
        let sample = TransformSample::Entity {
            entity: a,
            transform: Transform::default(),
        };
        let mut publisher = TransformPublisher::new(1);
        let sizes: Vec<usize> = (0..=TransformPublisher::DEFAULT_KEYFRAME_EVERY)
            .map(|_| publisher.publish(vec![sample]).len())
            .collect();
        assert_eq!(sizes[0], 1);
        assert!(sizes[1..sizes.len() - 1].iter().all(|&n| n == 0));
        assert_eq!(sizes[sizes.len() - 1], 1);
    }

    #[test]
    fn smoothing_converges_without_overshoot() {
        let mut smoothed = SmoothedTransform::new(Transform::default(), 0.1);
        let target = Transform::new(Vec3::new(4.0, 0.0, -2.0), 1.0);
        smoothed.set_target(target);

        let mut last_x = 0.0;
        for _ in 0..120 {
            let now = smoothed.advance(1.0 / 60.0);
            assert!(now.position.x <= 4.0 + 1e-4);
            assert!(now.position.x >= last_x - 1e-6);
            last_x = now.position.x;
        }
        let done = smoothed.current();
        assert!((done.position.x - 4.0).abs() < 1e-2);
        assert!((done.position.z + 2.0).abs() < 1e-2);
        assert!((done.yaw - 1.0).abs() < 1e-2);
    }

    #[test]
    fn yaw_takes_the_short_way_round() {
        let start = Transform::new(Vec3::ZERO, 3.0);
        let mut smoothed = SmoothedTransform::new(start, 0.1);
        smoothed.set_target(Transform::new(Vec3::ZERO, -3.0));
        let step = smoothed.advance(1.0 / 60.0);
        // Heading increases through PI instead of sweeping back across zero.
        assert!(step.yaw > 3.0 || step.yaw < -3.0);
    }
}
