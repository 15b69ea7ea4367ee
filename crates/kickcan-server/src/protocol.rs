//! Client/server envelope messages.
//!
//! Wraps the kickcan-protocol payloads with the join handshake and
//! connection housekeeping.

use kickcan_protocol::wire::{from_bytes, to_bytes, WireError};
use kickcan_protocol::{Command, Cue, EntityId, Event, TransformSample, WorldSnapshot};
use serde::{Deserialize, Serialize};

use crate::channels::channel_id;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Request to join. Spectators watch without an avatar.
    JoinRequest {
        name: String,
        #[serde(default)]
        spectator: bool,
    },
    /// Intent for the client's own avatar
    Command { command: Command },
    /// Ping for latency measurement
    Ping { timestamp: u64 },
    /// Ask for a full snapshot after a suspected desync
    RequestSnapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    JoinAccepted {
        /// The avatar this client controls; `None` for spectators
        entity: Option<EntityId>,
        tick_rate_hz: u32,
    },
    JoinRejected { reason: JoinRejectReason },
    Snapshot { snapshot: WorldSnapshot },
    Events { tick: u64, events: Vec<Event> },
    Transforms { tick: u64, samples: Vec<TransformSample> },
    Cue { cue: Cue },
    Pong { timestamp: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinRejectReason {
    GameFull,
    SpectatorsFull,
    AlreadyJoined,
}

impl ClientMessage {
    /// Channel a well-behaved client sends this on.
    pub fn channel(&self) -> u8 {
        match self {
            ClientMessage::Command {
                command: Command::Move { .. },
            }
            | ClientMessage::Ping { .. } => channel_id::TRANSFORMS,
            _ => channel_id::COMMANDS,
        }
    }
}

impl ServerMessage {
    pub fn channel(&self) -> u8 {
        match self {
            ServerMessage::Transforms { .. } | ServerMessage::Pong { .. } => {
                channel_id::TRANSFORMS
            }
            ServerMessage::Cue { .. } => channel_id::NOTICES,
            _ => channel_id::COMMANDS,
        }
    }
}

pub fn serialize_client_message(msg: &ClientMessage) -> Result<Vec<u8>, WireError> {
    to_bytes(msg)
}

pub fn deserialize_client_message(data: &[u8]) -> Result<ClientMessage, WireError> {
    from_bytes(data)
}

pub fn serialize_server_message(msg: &ServerMessage) -> Result<Vec<u8>, WireError> {
    to_bytes(msg)
}

pub fn deserialize_server_message(data: &[u8]) -> Result<ServerMessage, WireError> {
    from_bytes(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kickcan_protocol::MoveIntent;

    #[test]
    fn moves_and_pings_ride_the_unreliable_channel() {
        let mv = ClientMessage::Command {
            command: Command::Move {
                intent: MoveIntent::new(1.0, 0.0, false),
            },
        };
        assert_eq!(mv.channel(), channel_id::TRANSFORMS);
        assert_eq!(ClientMessage::Ping { timestamp: 1 }.channel(), channel_id::TRANSFORMS);
        assert_eq!(
            ClientMessage::Command {
                command: Command::pickup()
            }
            .channel(),
            channel_id::COMMANDS
        );
    }

    #[test]
    fn cues_use_the_notice_channel() {
        let msg = ServerMessage::Cue {
            cue: Cue::EnteredSafeZone,
        };
        assert_eq!(msg.channel(), channel_id::NOTICES);
        assert_eq!(
            ServerMessage::Events {
                tick: 1,
                events: Vec::new()
            }
            .channel(),
            channel_id::COMMANDS
        );
    }

    #[test]
    fn join_request_defaults_to_player() {
        let msg = ClientMessage::JoinRequest {
            name: "ada".into(),
            spectator: false,
        };
        let back = deserialize_client_message(&serialize_client_message(&msg).expect("encode"))
            .expect("decode");
        assert_eq!(back, msg);
    }

    #[test]
    fn truncated_message_is_rejected() {
        let bytes = serialize_server_message(&ServerMessage::Pong { timestamp: 9 }).expect("encode");
        assert!(deserialize_server_message(&bytes[..bytes.len() / 2]).is_err());
    }
}
