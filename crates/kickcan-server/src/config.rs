//! Server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kickcan_core::{ConfigError, SimConfig};
use kickcan_protocol::Vec3;
use serde::{Deserialize, Serialize};

use crate::triggers::Aabb;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server
    pub bind_address: SocketAddr,
    /// Observers that get an avatar
    pub max_players: u8,
    /// Observers that only watch
    pub max_spectators: u8,
    /// Messages accepted per client within `rate_limit_window_ms`
    pub rate_limit_messages: u32,
    pub rate_limit_window_ms: u64,
    /// 64 hex characters; unsecure netcode authentication when absent
    pub private_key: Option<String>,
    /// Static safe-zone volume
    pub safe_zone: Aabb,
    /// Reach of an agent's catch sphere
    pub catch_radius: f32,
    pub sim: SimConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 7777)),
            max_players: 8,
            max_spectators: 4,
            rate_limit_messages: 120,
            rate_limit_window_ms: 1000,
            private_key: None,
            safe_zone: Aabb::new(Vec3::new(-4.0, -1.0, -12.0), Vec3::new(4.0, 4.0, -4.0)),
            catch_radius: 2.5,
            sim: SimConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("Failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Invalid YAML in {0}: {1}")]
    Yaml(PathBuf, serde_yaml::Error),

    #[error("Invalid simulation settings: {0}")]
    Sim(#[from] ConfigError),

    #[error("Private key must be 64 hex characters")]
    PrivateKey,

    #[error("Catch radius must be positive, got {0}")]
    CatchRadius(f32),

    #[error("Catch radius {catch_radius} must exceed the agent stopping distance {stopping_distance}")]
    CatchShorterThanStop {
        catch_radius: f32,
        stopping_distance: f32,
    },
}

impl ServerConfig {
    /// Reads and validates a YAML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| ServerConfigError::Yaml(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServerConfigError> {
        self.sim.validate()?;
        if !(self.catch_radius.is_finite() && self.catch_radius > 0.0) {
            return Err(ServerConfigError::CatchRadius(self.catch_radius));
        }
        // A pursuing agent halts at its stopping distance and must still reach.
        if self.catch_radius <= self.sim.agent.stopping_distance {
            return Err(ServerConfigError::CatchShorterThanStop {
                catch_radius: self.catch_radius,
                stopping_distance: self.sim.agent.stopping_distance,
            });
        }
        self.private_key_bytes()?;
        Ok(())
    }

    pub fn max_clients(&self) -> usize {
        usize::from(self.max_players) + usize::from(self.max_spectators)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sim.tick_rate_hz))
    }

    pub fn private_key_bytes(&self) -> Result<Option<[u8; 32]>, ServerConfigError> {
        self.private_key.as_deref().map(parse_key).transpose()
    }
}

fn parse_key(hex: &str) -> Result<[u8; 32], ServerConfigError> {
    let hex = hex.trim();
    if hex.len() != 64 || !hex.is_ascii() {
        return Err(ServerConfigError::PrivateKey);
    }
    let mut key = [0u8; 32];
    for (byte, pair) in key.iter_mut().zip(hex.as_bytes().chunks(2)) {
        let pair = std::str::from_utf8(pair).map_err(|_| ServerConfigError::PrivateKey)?;
        *byte = u8::from_str_radix(pair, 16).map_err(|_| ServerConfigError::PrivateKey)?;
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ServerConfig::default();
        config.validate().expect("defaults are valid");
        assert_eq!(config.max_clients(), 12);
        assert_eq!(config.rate_limit_messages, 120);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(1));
        assert_eq!(config.private_key_bytes().expect("no key"), None);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: ServerConfig = serde_yaml::from_str(
            "max_players: 2\nsim:\n  tick_rate_hz: 30\n  agent_count: 2\n",
        )
        .expect("parse");
        assert_eq!(config.max_players, 2);
        assert_eq!(config.max_spectators, 4);
        assert_eq!(config.sim.tick_rate_hz, 30);
        assert_eq!(config.sim.agent_count, 2);
        assert_eq!(config.catch_radius, 2.5);
        config.validate().expect("valid");
    }

    #[test]
    fn private_key_is_hex_decoded() {
        let config = ServerConfig {
            private_key: Some("0f".repeat(32)),
            ..Default::default()
        };
        assert_eq!(config.private_key_bytes().expect("valid"), Some([0x0f; 32]));

        let short = ServerConfig {
            private_key: Some("abcd".into()),
            ..Default::default()
        };
        assert!(matches!(short.validate(), Err(ServerConfigError::PrivateKey)));

        let garbage = ServerConfig {
            private_key: Some("zz".repeat(32)),
            ..Default::default()
        };
        assert!(matches!(garbage.private_key_bytes(), Err(ServerConfigError::PrivateKey)));
    }

    #[test]
    fn bad_sim_settings_surface() {
        let config: ServerConfig =
            serde_yaml::from_str("sim:\n  tick_rate_hz: 0\n").expect("parse");
        assert!(matches!(config.validate(), Err(ServerConfigError::Sim(_))));
    }

    #[test]
    fn catch_must_outreach_the_stopping_distance() {
        let mut config = ServerConfig {
            catch_radius: 1.2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ServerConfigError::CatchShorterThanStop { .. })
        ));

        config.sim.agent.stopping_distance = 1.0;
        config.validate().expect("agent stops inside its reach");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ServerConfig::load("/definitely/not/here.yaml").expect_err("missing");
        assert!(matches!(err, ServerConfigError::Io(..)));
    }
}
