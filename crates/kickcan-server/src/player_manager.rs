//! Connected observers: admission, avatar binding and rate limiting.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use kickcan_protocol::{ClientId, EntityId};

#[derive(Clone, Debug)]
pub struct Player {
    pub client_id: ClientId,
    pub name: String,
    /// Avatar owned by this observer; spectators have none.
    pub entity: Option<EntityId>,
    pub joined_at: Instant,
    /// Rate limiting: message count in current window
    pub message_count: u32,
    /// Rate limiting: window start time
    pub rate_window_start: Instant,
}

impl Player {
    pub fn is_spectator(&self) -> bool {
        self.entity.is_none()
    }
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum AddPlayerError {
    #[error("Game is full")]
    GameFull,
    #[error("Spectators full")]
    SpectatorsFull,
    #[error("Client already joined")]
    AlreadyJoined,
}

pub struct PlayerManager {
    players: HashMap<ClientId, Player>,
    entity_to_client: HashMap<EntityId, ClientId>,
    max_players: u8,
    max_spectators: u8,
    rate_limit_messages: u32,
    rate_limit_window: Duration,
}

impl PlayerManager {
    pub fn new(
        max_players: u8,
        max_spectators: u8,
        rate_limit_messages: u32,
        rate_limit_window: Duration,
    ) -> Self {
        Self {
            players: HashMap::new(),
            entity_to_client: HashMap::new(),
            max_players,
            max_spectators,
            rate_limit_messages,
            rate_limit_window,
        }
    }

    /// Admits a client. `spawn` runs only once the limits are known to allow
    /// a player, so a rejected join never leaves an orphan avatar behind.
    pub fn add_player(
        &mut self,
        client_id: ClientId,
        name: String,
        spectator: bool,
        now: Instant,
        spawn: impl FnOnce(&str) -> EntityId,
    ) -> Result<Option<EntityId>, AddPlayerError> {
        if self.players.contains_key(&client_id) {
            return Err(AddPlayerError::AlreadyJoined);
        }

        if spectator {
            if self.spectator_count() >= usize::from(self.max_spectators) {
                return Err(AddPlayerError::SpectatorsFull);
            }
        } else if self.player_count() >= usize::from(self.max_players) {
            return Err(AddPlayerError::GameFull);
        }

        let entity = (!spectator).then(|| spawn(&name));
        if let Some(entity) = entity {
            self.entity_to_client.insert(entity, client_id);
        }

        self.players.insert(
            client_id,
            Player {
                client_id,
                name,
                entity,
                joined_at: now,
                message_count: 0,
                rate_window_start: now,
            },
        );
        Ok(entity)
    }

    /// Forgets a client and returns its record so the caller can despawn the avatar.
    pub fn disconnect(&mut self, client_id: ClientId) -> Option<Player> {
        let player = self.players.remove(&client_id)?;
        if let Some(entity) = player.entity {
            self.entity_to_client.remove(&entity);
        }
        Some(player)
    }

    /// Check and update rate limit for a client.
    /// Returns true if message is allowed, false if rate limited.
    pub fn check_rate_limit(&mut self, client_id: ClientId, now: Instant) -> bool {
        let Some(player) = self.players.get_mut(&client_id) else {
            return true; // Not joined yet; the join handshake decides
        };

        if now.duration_since(player.rate_window_start) >= self.rate_limit_window {
            player.rate_window_start = now;
            player.message_count = 0;
        }

        player.message_count += 1;
        player.message_count <= self.rate_limit_messages
    }

    pub fn get_player(&self, client_id: ClientId) -> Option<&Player> {
        self.players.get(&client_id)
    }

    pub fn entity_of(&self, client_id: ClientId) -> Option<EntityId> {
        self.players.get(&client_id).and_then(|p| p.entity)
    }

    pub fn client_of(&self, entity: EntityId) -> Option<ClientId> {
        self.entity_to_client.get(&entity).copied()
    }

    pub fn client_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.players.keys().copied()
    }

    pub fn player_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_spectator()).count()
    }

    pub fn spectator_count(&self) -> usize {
        self.players.values().filter(|p| p.is_spectator()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PlayerManager {
        PlayerManager::new(2, 1, 3, Duration::from_secs(1))
    }

    #[test]
    fn spawn_runs_only_for_admitted_players() {
        let mut players = manager();
        let now = Instant::now();
        let mut spawned = 0;

        let a = players
            .add_player(1, "a".into(), false, now, |_| {
                spawned += 1;
                EntityId::new(0, 0)
            })
            .expect("admit");
        assert_eq!(a, Some(EntityId::new(0, 0)));

        let watcher = players
            .add_player(2, "w".into(), true, now, |_| unreachable!("spectators get no avatar"))
            .expect("admit spectator");
        assert_eq!(watcher, None);

        players
            .add_player(3, "b".into(), false, now, |_| EntityId::new(1, 0))
            .expect("admit");
        let full = players.add_player(4, "c".into(), false, now, |_| unreachable!("full"));
        assert!(matches!(full, Err(AddPlayerError::GameFull)));
        let full = players.add_player(5, "v".into(), true, now, |_| unreachable!("full"));
        assert!(matches!(full, Err(AddPlayerError::SpectatorsFull)));

        assert_eq!(spawned, 1);
        assert_eq!(players.client_of(EntityId::new(1, 0)), Some(3));
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut players = manager();
        let now = Instant::now();
        players
            .add_player(1, "a".into(), true, now, |_| EntityId::new(0, 0))
            .expect("admit");
        let again = players.add_player(1, "a".into(), false, now, |_| EntityId::new(0, 0));
        assert!(matches!(again, Err(AddPlayerError::AlreadyJoined)));
    }

    #[test]
    fn disconnect_frees_the_slot() {
        let mut players = manager();
        let now = Instant::now();
        let entity = EntityId::new(4, 1);
        players
            .add_player(7, "a".into(), false, now, |_| entity)
            .expect("admit");

        let gone = players.disconnect(7).expect("known");
        assert_eq!(gone.entity, Some(entity));
        assert_eq!(players.client_of(entity), None);
        assert_eq!(players.player_count(), 0);
        assert!(players.disconnect(7).is_none());
    }

    #[test]
    fn rate_limit_resets_with_the_window() {
        let mut players = manager();
        let start = Instant::now();
        players
            .add_player(1, "a".into(), true, start, |_| EntityId::new(0, 0))
            .expect("admit");

        assert!(players.check_rate_limit(1, start));
        assert!(players.check_rate_limit(1, start));
        assert!(players.check_rate_limit(1, start));
        assert!(!players.check_rate_limit(1, start));

        let later = start + Duration::from_secs(1);
        assert!(players.check_rate_limit(1, later));
        assert!(players.check_rate_limit(99, start), "unknown clients pass through");
    }
}
