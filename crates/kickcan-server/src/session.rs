//! Transport-independent server logic.
//!
//! A [`Session`] turns decoded client traffic and the fixed tick into
//! addressed [`ServerMessage`]s. The renet wrapper only moves bytes.

use std::time::Instant;

use kickcan_core::{Audience, Authority, Envelope, Payload};
use kickcan_protocol::wire::snapshot_json;
use kickcan_protocol::{ClientId, Cue, Event};
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, ServerConfigError};
use crate::player_manager::{AddPlayerError, PlayerManager};
use crate::protocol::{deserialize_client_message, ClientMessage, JoinRejectReason, ServerMessage};
use crate::triggers::TriggerVolumes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipient {
    /// Every joined client, spectators included.
    All,
    Client(ClientId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

impl Outbound {
    fn all(message: ServerMessage) -> Self {
        Self {
            to: Recipient::All,
            message,
        }
    }

    fn client(client_id: ClientId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::Client(client_id),
            message,
        }
    }
}

pub struct Session {
    authority: Authority,
    players: PlayerManager,
    triggers: TriggerVolumes,
}

impl Session {
    pub fn new(config: &ServerConfig) -> Result<Self, ServerConfigError> {
        config.validate()?;
        Ok(Self {
            authority: Authority::new(config.sim.clone())?,
            players: PlayerManager::new(
                config.max_players,
                config.max_spectators,
                config.rate_limit_messages,
                config.rate_limit_window(),
            ),
            triggers: TriggerVolumes::new(config.safe_zone, config.catch_radius),
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn players(&self) -> &PlayerManager {
        &self.players
    }

    /// Drops the client and despawns its avatar; the despawn goes out with the next tick.
    pub fn disconnect(&mut self, client_id: ClientId) {
        let Some(player) = self.players.disconnect(client_id) else {
            return;
        };
        info!("Player {} (client {}) left", player.name, client_id);
        if let Some(entity) = player.entity {
            if let Err(denial) = self.authority.despawn(entity) {
                warn!("Despawn of {} failed: {}", entity, denial);
            }
        }
    }

    /// Decodes and handles one raw message. Rate-limited or malformed input is dropped.
    pub fn handle_message(&mut self, client_id: ClientId, data: &[u8], now: Instant) -> Vec<Outbound> {
        if !self.players.check_rate_limit(client_id, now) {
            debug!("Client {} rate limited", client_id);
            return Vec::new();
        }

        match deserialize_client_message(data) {
            Ok(message) => self.handle_client_message(client_id, message, now),
            Err(e) => {
                warn!("Malformed message from client {}: {}", client_id, e);
                Vec::new()
            }
        }
    }

    pub fn handle_client_message(
        &mut self,
        client_id: ClientId,
        message: ClientMessage,
        now: Instant,
    ) -> Vec<Outbound> {
        match message {
            ClientMessage::JoinRequest { name, spectator } => {
                self.handle_join(client_id, name, spectator, now)
            }
            ClientMessage::Command { command } => {
                let Some(entity) = self.players.entity_of(client_id) else {
                    debug!("Client {} sent {:?} without an avatar", client_id, command);
                    return Vec::new();
                };
                if let Err(denial) = self.authority.submit(entity, command) {
                    debug!("Command from {} refused: {}", entity, denial);
                }
                Vec::new()
            }
            ClientMessage::Ping { timestamp } => {
                vec![Outbound::client(client_id, ServerMessage::Pong { timestamp })]
            }
            ClientMessage::RequestSnapshot => {
                if self.players.get_player(client_id).is_none() {
                    return Vec::new();
                }
                let snapshot = self.authority.snapshot();
                if tracing::enabled!(tracing::Level::DEBUG) {
                    match snapshot_json(&snapshot) {
                        Ok(json) => debug!("Resync for client {}:\n{}", client_id, json),
                        Err(e) => warn!("Snapshot dump failed: {}", e),
                    }
                }
                vec![Outbound::client(client_id, ServerMessage::Snapshot { snapshot })]
            }
        }
    }

    fn handle_join(
        &mut self,
        client_id: ClientId,
        name: String,
        spectator: bool,
        now: Instant,
    ) -> Vec<Outbound> {
        let authority = &mut self.authority;
        let admitted = self
            .players
            .add_player(client_id, name.clone(), spectator, now, |name| {
                authority.spawn_avatar(name)
            });

        let entity = match admitted {
            Ok(entity) => entity,
            Err(e) => {
                info!("Join from client {} rejected: {}", client_id, e);
                let reason = match e {
                    AddPlayerError::GameFull => JoinRejectReason::GameFull,
                    AddPlayerError::SpectatorsFull => JoinRejectReason::SpectatorsFull,
                    AddPlayerError::AlreadyJoined => JoinRejectReason::AlreadyJoined,
                };
                return vec![Outbound::client(client_id, ServerMessage::JoinRejected { reason })];
            }
        };

        match entity {
            Some(entity) => info!("Player {} joined as {} (client {})", name, entity, client_id),
            None => info!("Spectator {} joined (client {})", name, client_id),
        }

        let mut out = vec![
            Outbound::client(
                client_id,
                ServerMessage::JoinAccepted {
                    entity,
                    tick_rate_hz: self.authority.config().tick_rate_hz,
                },
            ),
            Outbound::client(
                client_id,
                ServerMessage::Snapshot {
                    snapshot: self.authority.snapshot(),
                },
            ),
        ];
        if entity.is_some_and(|e| self.authority.is_safe(e)) {
            out.push(Outbound::client(
                client_id,
                ServerMessage::Cue {
                    cue: Cue::EnteredSafeZone,
                },
            ));
        }
        out
    }

    /// One fixed step: trigger scan, simulation, then fan-out of what it produced.
    pub fn tick(&mut self) -> Vec<Outbound> {
        for edge in self.triggers.scan(&self.authority) {
            self.authority.report_trigger(edge);
        }

        let output = self.authority.tick();
        let mut out = self.route(output.tick, output.envelopes);
        if !output.transforms.is_empty() {
            out.push(Outbound::all(ServerMessage::Transforms {
                tick: output.tick,
                samples: output.transforms,
            }));
        }
        out
    }

    /// Broadcast events travel as one ordered batch; targeted payloads go to
    /// the client owning the addressed entity.
    fn route(&self, tick: u64, envelopes: Vec<Envelope>) -> Vec<Outbound> {
        let mut shared: Vec<Event> = Vec::new();
        let mut out = Vec::new();

        for Envelope { audience, payload } in envelopes {
            let to = match audience {
                Audience::All => Recipient::All,
                Audience::Only(entity) => match self.players.client_of(entity) {
                    Some(client_id) => Recipient::Client(client_id),
                    None => {
                        debug!("No observer owns {}; dropping {:?}", entity, payload);
                        continue;
                    }
                },
            };

            match (to, payload) {
                (Recipient::All, Payload::Event(event)) => shared.push(event),
                (to, Payload::Event(event)) => out.push(Outbound {
                    to,
                    message: ServerMessage::Events {
                        tick,
                        events: vec![event],
                    },
                }),
                (to, Payload::Cue(cue)) => out.push(Outbound {
                    to,
                    message: ServerMessage::Cue { cue },
                }),
            }
        }

        if !shared.is_empty() {
            out.insert(0, Outbound::all(ServerMessage::Events { tick, events: shared }));
        }
        out
    }
}
