//! Player Directory
//!
//! Connected participants in join order, where each one currently stands, and
//! the outbound channel used to reach them. Sends never block: a full or
//! closed outbox drops the message with a log line.

use serde::{Serialize, Deserialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::placement::Placement;
use crate::network::protocol::ServerMessage;
use crate::world::instance::WorldKey;

/// Full health of a freshly restored player.
pub const MAX_HEALTH: f32 = 20.0;

/// Full food level.
pub const MAX_FOOD: u32 = 20;

/// Saturation granted on restore.
pub const FULL_SATURATION: f32 = 20.0;

// =============================================================================
// PLAYER IDENTIFIER
// =============================================================================

/// Unique player identifier (UUID bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random identifier.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// First four bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

/// Interaction mode of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Normal play.
    Survival,
    /// Can interact with whitelisted things only.
    Adventure,
    /// Non-interactive observer.
    Spectator,
}

// =============================================================================
// PLAYER HANDLE
// =============================================================================

/// One connected participant.
#[derive(Debug)]
pub struct PlayerHandle {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// World the player currently stands in.
    pub world: WorldKey,
    /// Last placement the server moved the player to.
    pub placement: Placement,
    /// Current health.
    pub health: f32,
    /// Current food level.
    pub food: u32,
    /// Current saturation.
    pub saturation: f32,
    /// Carried item identifiers.
    pub inventory: Vec<String>,
    /// Current game mode.
    pub game_mode: GameMode,
    outbox: mpsc::Sender<ServerMessage>,
}

impl PlayerHandle {
    /// Create a handle standing at `placement` in `world`.
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        world: WorldKey,
        placement: Placement,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            world,
            placement,
            health: MAX_HEALTH,
            food: MAX_FOOD,
            saturation: FULL_SATURATION,
            inventory: Vec::new(),
            game_mode: GameMode::Adventure,
            outbox,
        }
    }

    /// Queue a message without blocking.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.outbox.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbox full for player {}, dropping message", self.id.short());
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Outbox closed for player {}", self.id.short());
                false
            }
        }
    }

    /// Move the player and tell them where they are.
    pub fn teleport(&mut self, world: &WorldKey, placement: Placement) {
        self.world = world.clone();
        self.placement = placement;
        self.send(ServerMessage::Teleported {
            world: world.to_string(),
            placement,
        });
    }

    /// Change game mode and notify.
    pub fn set_game_mode(&mut self, mode: GameMode) {
        if self.game_mode != mode {
            self.game_mode = mode;
            self.send(ServerMessage::GameModeChanged { mode });
        }
    }

    /// Full health, food and saturation.
    pub fn restore_vitals(&mut self) {
        self.health = MAX_HEALTH;
        self.food = MAX_FOOD;
        self.saturation = FULL_SATURATION;
    }

    /// Drop everything carried.
    pub fn clear_inventory(&mut self) {
        self.inventory.clear();
    }

    /// Teleport plus the reset every session hand-off performs: adventure
    /// mode, empty inventory, full vitals.
    pub fn hand_off(&mut self, world: &WorldKey, placement: Placement) {
        self.teleport(world, placement);
        self.set_game_mode(GameMode::Adventure);
        self.clear_inventory();
        self.restore_vitals();
    }
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// Connected players in join order.
#[derive(Debug, Default)]
pub struct PlayerDirectory {
    players: Vec<PlayerHandle>,
}

impl PlayerDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player; returns false if the id is already present.
    pub fn insert(&mut self, handle: PlayerHandle) -> bool {
        if self.contains(&handle.id) {
            return false;
        }
        self.players.push(handle);
        true
    }

    /// Remove a player.
    pub fn remove(&mut self, id: &PlayerId) -> Option<PlayerHandle> {
        let index = self.players.iter().position(|p| p.id == *id)?;
        Some(self.players.remove(index))
    }

    /// Whether the player is connected.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.iter().any(|p| p.id == *id)
    }

    /// Look up a player.
    pub fn get(&self, id: &PlayerId) -> Option<&PlayerHandle> {
        self.players.iter().find(|p| p.id == *id)
    }

    /// Look up a player mutably.
    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerHandle> {
        self.players.iter_mut().find(|p| p.id == *id)
    }

    /// Display name, or the short id if unknown.
    pub fn name_of(&self, id: &PlayerId) -> String {
        self.get(id).map(|p| p.name.clone()).unwrap_or_else(|| id.short())
    }

    /// Total connected players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players standing in `world`, in join order.
    pub fn in_world(&self, world: &WorldKey) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.world == *world)
            .map(|p| p.id)
            .collect()
    }

    /// Number of players standing in `world`.
    pub fn count_in(&self, world: &WorldKey) -> usize {
        self.players.iter().filter(|p| p.world == *world).count()
    }

    /// Send to one player; unknown ids are ignored.
    pub fn send(&self, id: &PlayerId, message: ServerMessage) -> bool {
        match self.get(id) {
            Some(player) => player.send(message),
            None => false,
        }
    }

    /// Send to everyone standing in `world`.
    pub fn broadcast(&self, world: &WorldKey, message: &ServerMessage) {
        for player in self.players.iter().filter(|p| p.world == *world) {
            player.send(message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> WorldKey {
        WorldKey::minigame(name)
    }

    #[test]
    fn test_join_order_is_roster_order() {
        let mut dir = PlayerDirectory::new();
        let (tx, _rx) = mpsc::channel(8);
        for i in [3u8, 1, 2] {
            dir.insert(PlayerHandle::new(PlayerId::new([i; 16]), "p", key("lobby"), Placement::DEFAULT, tx.clone()));
        }

        let roster = dir.in_world(&key("lobby"));
        assert_eq!(roster, vec![PlayerId::new([3; 16]), PlayerId::new([1; 16]), PlayerId::new([2; 16])]);
        assert!(!dir.insert(PlayerHandle::new(PlayerId::new([1; 16]), "dup", key("lobby"), Placement::DEFAULT, tx)));
    }

    #[test]
    fn test_hand_off_resets_player() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut player = PlayerHandle::new(PlayerId::new([1; 16]), "alice", key("lobby"), Placement::DEFAULT, tx);
        player.health = 3.0;
        player.food = 4;
        player.inventory.push("bow".into());
        player.game_mode = GameMode::Spectator;

        player.hand_off(&key("battle"), Placement::facing(0.5, 64.0, 0.5, 0.0));

        assert_eq!(player.world, key("battle"));
        assert_eq!(player.health, MAX_HEALTH);
        assert_eq!(player.food, MAX_FOOD);
        assert!(player.inventory.is_empty());
        assert_eq!(player.game_mode, GameMode::Adventure);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Teleported { .. })));
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::GameModeChanged { mode: GameMode::Adventure })));
    }

    #[test]
    fn test_full_outbox_drops_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let player = PlayerHandle::new(PlayerId::new([9; 16]), "bob", key("lobby"), Placement::DEFAULT, tx);
        assert!(player.send(ServerMessage::display("one")));
        assert!(!player.send(ServerMessage::display("two")));
    }

    #[test]
    fn test_player_id_uuid_round_trip() {
        let id = PlayerId::random();
        assert_eq!(PlayerId::from_uuid_str(&id.to_uuid_string()), Some(id));
        assert_eq!(id.short().len(), 8);
    }
}
