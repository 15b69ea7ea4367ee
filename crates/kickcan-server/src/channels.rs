//! Renet channel layout.
//!
//! Channel 0: ReliableOrdered - join handshake, action intents, events, snapshots
//! Channel 1: ReliableUnordered - cues addressed to a single observer
//! Channel 2: Unreliable - move intents, transform batches, ping/pong

use std::time::Duration;

use renet::ChannelConfig;

pub mod channel_id {
    /// Confirmed world history; order matters.
    pub const COMMANDS: u8 = 0;
    /// Safe-zone and game-over cues.
    pub const NOTICES: u8 = 1;
    /// Newest-wins traffic.
    pub const TRANSFORMS: u8 = 2;
}

const MAX_CHANNEL_MEMORY: usize = 5 * 1024 * 1024; // 5 MB

pub fn create_channel_configs() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig {
            channel_id: channel_id::COMMANDS,
            max_memory_usage_bytes: MAX_CHANNEL_MEMORY,
            send_type: renet::SendType::ReliableOrdered {
                resend_time: Duration::from_millis(200),
            },
        },
        ChannelConfig {
            channel_id: channel_id::NOTICES,
            max_memory_usage_bytes: 256 * 1024,
            send_type: renet::SendType::ReliableUnordered {
                resend_time: Duration::from_millis(200),
            },
        },
        ChannelConfig {
            channel_id: channel_id::TRANSFORMS,
            max_memory_usage_bytes: MAX_CHANNEL_MEMORY / 5,
            send_type: renet::SendType::Unreliable,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_match_their_slots() {
        let configs = create_channel_configs();
        assert_eq!(configs.len(), 3);
        assert_eq!(configs[0].channel_id, channel_id::COMMANDS);
        assert_eq!(configs[1].channel_id, channel_id::NOTICES);
        assert_eq!(configs[2].channel_id, channel_id::TRANSFORMS);
    }

    #[test]
    fn transform_channel_is_unreliable() {
        let configs = create_channel_configs();
        assert!(matches!(configs[2].send_type, renet::SendType::Unreliable));
    }
}
