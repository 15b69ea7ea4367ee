//! Simulation tuning

use kickcan_protocol::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tick::seconds_to_ticks;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("transform_publish_hz ({publish}) must not exceed tick_rate_hz ({tick})")]
    PublishFasterThanTick { publish: u32, tick: u32 },
    #[error("agent.stopping_distance ({stop}) must be below pickup_range ({reach})")]
    StopOutsidePickupRange { stop: f32, reach: f32 },
}

/// Authority-side simulation settings. Durations are in seconds, distances in
/// metres, speeds in metres per second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed simulation rate
    pub tick_rate_hz: u32,
    /// Rate at which transform samples go out on the unreliable channel
    pub transform_publish_hz: u32,
    pub walk_speed: f32,
    pub run_speed: f32,
    /// Turn rate for observer-driven avatars (radians per second)
    pub rotation_speed: f32,
    /// Maximum horizontal distance between an entity and the item for a pickup
    pub pickup_range: f32,
    /// Time after a release before the same entity may pick up again
    pub pickup_cooldown: f32,
    pub pick_duration: f32,
    pub throw_duration: f32,
    pub put_duration: f32,
    pub jump_duration: f32,
    /// Delay between a release and the replacement instance appearing
    pub respawn_delay: f32,
    /// Delay before a released instance is destroyed
    pub retire_delay: f32,
    /// How far ahead of the thrower the replacement lands
    pub throw_distance: f32,
    /// Hand anchor in the holder's local frame
    pub hand_offset: Vec3,
    /// Spawn slot: where the item starts and where it is delivered back to
    pub item_spawn: Vec3,
    /// Where the first avatar appears
    pub avatar_spawn: Vec3,
    /// Later avatars are placed on a ring of this radius around `avatar_spawn`
    pub spawn_ring_radius: f32,
    pub avatars_start_safe: bool,
    /// Send the game-over cue to every observer instead of only the caught one
    pub global_game_over: bool,
    pub agent_count: u32,
    pub agent: AgentConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            transform_publish_hz: 20,
            walk_speed: 2.0,
            run_speed: 5.0,
            rotation_speed: 10.0,
            pickup_range: 3.0,
            pickup_cooldown: 0.5,
            pick_duration: 1.0,
            throw_duration: 0.6,
            put_duration: 1.0,
            jump_duration: 0.8,
            respawn_delay: 0.1,
            retire_delay: 0.5,
            throw_distance: 6.0,
            hand_offset: Vec3::new(0.4, 1.2, 0.3),
            item_spawn: Vec3::ZERO,
            avatar_spawn: Vec3::new(0.0, 0.0, -8.0),
            spawn_ring_radius: 2.0,
            avatars_start_safe: true,
            global_game_over: false,
            agent_count: 1,
            agent: AgentConfig::default(),
        }
    }
}

/// Tuning for authority-simulated agents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub follow_speed: f32,
    /// Agents stop steering once this close to their target
    pub stopping_distance: f32,
    pub rotation_speed: f32,
    /// How often the tracked-avatar list is rebuilt
    pub target_refresh_interval: f32,
    /// Home position for the return-to-base goal
    pub base_position: Vec3,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            follow_speed: 3.0,
            stopping_distance: 2.0,
            rotation_speed: 5.0,
            target_refresh_interval: 5.0,
            base_position: Vec3::new(0.0, 0.0, 6.0),
        }
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "a positive number",
            value: f64::from(value),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "zero or more",
            value: f64::from(value),
        })
    }
}

fn finite_point(field: &'static str, value: Vec3) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "a finite point",
            value: f64::NAN,
        })
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::OutOfRange {
                field: "tick_rate_hz",
                expected: "at least 1",
                value: 0.0,
            });
        }
        if self.transform_publish_hz == 0 {
            return Err(ConfigError::OutOfRange {
                field: "transform_publish_hz",
                expected: "at least 1",
                value: 0.0,
            });
        }
        if self.transform_publish_hz > self.tick_rate_hz {
            return Err(ConfigError::PublishFasterThanTick {
                publish: self.transform_publish_hz,
                tick: self.tick_rate_hz,
            });
        }

        positive("walk_speed", self.walk_speed)?;
        positive("run_speed", self.run_speed)?;
        positive("rotation_speed", self.rotation_speed)?;
        positive("pickup_range", self.pickup_range)?;
        non_negative("pickup_cooldown", self.pickup_cooldown)?;
        positive("pick_duration", self.pick_duration)?;
        positive("throw_duration", self.throw_duration)?;
        positive("put_duration", self.put_duration)?;
        positive("jump_duration", self.jump_duration)?;
        non_negative("respawn_delay", self.respawn_delay)?;
        non_negative("retire_delay", self.retire_delay)?;
        non_negative("throw_distance", self.throw_distance)?;
        non_negative("spawn_ring_radius", self.spawn_ring_radius)?;
        finite_point("hand_offset", self.hand_offset)?;
        finite_point("item_spawn", self.item_spawn)?;
        finite_point("avatar_spawn", self.avatar_spawn)?;

        positive("agent.follow_speed", self.agent.follow_speed)?;
        positive("agent.stopping_distance", self.agent.stopping_distance)?;
        positive("agent.rotation_speed", self.agent.rotation_speed)?;
        positive(
            "agent.target_refresh_interval",
            self.agent.target_refresh_interval,
        )?;
        finite_point("agent.base_position", self.agent.base_position)?;

        // Agents halt at their stopping distance and pick up from there.
        if self.agent.stopping_distance >= self.pickup_range {
            return Err(ConfigError::StopOutsidePickupRange {
                stop: self.agent.stopping_distance,
                reach: self.pickup_range,
            });
        }
        Ok(())
    }

    pub fn ticks(&self, seconds: f32) -> u64 {
        seconds_to_ticks(seconds, self.tick_rate_hz)
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }

    /// Ticks between two transform publications.
    pub fn publish_interval_ticks(&self) -> u64 {
        u64::from((self.tick_rate_hz / self.transform_publish_hz.max(1)).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.publish_interval_ticks(), 3);
        assert_eq!(config.ticks(config.pick_duration), 60);
        assert_eq!(config.ticks(config.respawn_delay), 6);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: SimConfig = serde_yaml::from_str(
            "pickup_range: 1.5\nagent:\n  follow_speed: 4.0\n",
        )
        .expect("parse");
        assert_eq!(config.pickup_range, 1.5);
        assert_eq!(config.agent.follow_speed, 4.0);
        assert_eq!(config.agent.stopping_distance, 2.0);
        assert_eq!(config.tick_rate_hz, 60);
    }

    #[test]
    fn agents_must_stop_within_pickup_reach() {
        let mut config = SimConfig::default();
        config.agent.stopping_distance = 3.5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::StopOutsidePickupRange {
                stop: 3.5,
                reach: 3.0
            })
        );

        config.pickup_range = 4.0;
        config.validate().expect("stopping inside reach is fine");
    }

    #[test]
    fn rejects_nonsense() {
        let mut config = SimConfig::default();
        config.transform_publish_hz = 120;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PublishFasterThanTick {
                publish: 120,
                tick: 60
            })
        );

        let mut config = SimConfig::default();
        config.pickup_range = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "pickup_range",
                ..
            })
        ));
    }
}
