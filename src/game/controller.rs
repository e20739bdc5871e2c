//! Controller Contract
//!
//! Every variant implements [`MinigameController`], overriding only what
//! differs from the defaults. [`Controller`] is the closed tagged union a
//! Binding owns; all dispatch goes through a match on the variant tag.
//!
//! Controllers never perform I/O. Anything that needs other world instances
//! (launching an arena, returning to the lobby) is reported back to the
//! registry as a [`TickOutcome`].

use crate::config::SessionConfig;
use crate::core::placement::Placement;
use crate::core::region::{self, ChunkArea};
use crate::core::rng::DeterministicRng;
use crate::game::battle::BattleController;
use crate::game::glide::GlideController;
use crate::game::lobby::LobbyController;
use crate::game::tumble::TumbleController;
use crate::game::variant::Variant;
use crate::game::spawn::SpawnAssignment;
use crate::network::protocol::ServerMessage;
use crate::rules::permissions::{PermissionSet, ALLOW_ALL, DENY_ALL};
use crate::rules::ruleset::RuleSet;
use crate::world::instance::WorldKey;
use crate::world::players::{PlayerDirectory, PlayerId};

// =============================================================================
// CONTEXT AND OUTCOMES
// =============================================================================

/// What a controller may touch while handling a tick or event.
pub struct ControllerContext<'a> {
    /// World instance the controller is bound to.
    pub world: &'a WorldKey,
    /// Connected players.
    pub players: &'a mut PlayerDirectory,
    /// Hosted session, once configured.
    pub config: Option<&'a SessionConfig>,
}

impl<'a> ControllerContext<'a> {
    /// Bundle the pieces a controller call needs.
    pub fn new(
        world: &'a WorldKey,
        players: &'a mut PlayerDirectory,
        config: Option<&'a SessionConfig>,
    ) -> Self {
        Self { world, players, config }
    }

    /// Players in this world, in join order.
    pub fn roster(&self) -> Vec<PlayerId> {
        self.players.in_world(self.world)
    }

    /// Send to everyone in this world.
    pub fn broadcast(&self, message: ServerMessage) {
        self.players.broadcast(self.world, &message);
    }

    /// Send to one player.
    pub fn send(&self, player: &PlayerId, message: ServerMessage) {
        self.players.send(player, message);
    }

    /// Display name of a player.
    pub fn name_of(&self, player: &PlayerId) -> String {
        self.players.name_of(player)
    }
}

/// Work a tick hands back to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do outside this controller.
    Idle,
    /// The lobby countdown finished; launch the configured match.
    Launch,
    /// The match return countdown finished; send everyone back.
    ReturnToLobby {
        /// Sole survivor, if any.
        winner: Option<PlayerId>,
    },
}

/// Controller state could not be encoded or decoded.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// bincode rejected the bytes.
    #[error("Controller state encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
}

// =============================================================================
// CAPABILITY CONTRACT
// =============================================================================

/// Capability surface shared by every variant.
pub trait MinigameController {
    /// Variant tag.
    fn variant(&self) -> Variant;

    /// Once per server tick for the owning world. Must not block.
    fn tick(&mut self, _ctx: &mut ControllerContext<'_>) -> TickOutcome {
        TickOutcome::Idle
    }

    /// A player was placed into this world.
    fn on_player_assigned(&mut self, _player: PlayerId, _late_join: bool, _ctx: &mut ControllerContext<'_>) {}

    /// A player finished loading into this world.
    fn on_player_loaded(&mut self, _player: PlayerId, _ctx: &mut ControllerContext<'_>) {}

    /// A player left this world (disconnect or move).
    fn on_player_left(&mut self, _player: PlayerId, _ctx: &mut ControllerContext<'_>) {}

    /// Begin a round with everyone currently present.
    fn start(&mut self, _ctx: &mut ControllerContext<'_>) {}

    /// Readiness signal. Returns whether anything changed.
    fn set_ready(&mut self, _player: PlayerId, _ready: bool, _ctx: &mut ControllerContext<'_>) -> bool {
        false
    }

    /// A player died without a credited killer.
    fn on_player_died(&mut self, _victim: PlayerId, _ctx: &mut ControllerContext<'_>) {}

    /// `killer` killed `victim`.
    fn on_player_kill(&mut self, _killer: PlayerId, victim: PlayerId, ctx: &mut ControllerContext<'_>) {
        self.on_player_died(victim, ctx);
    }

    /// Clear round state after the return sequence.
    fn reset_round(&mut self) {}

    /// Whether new participants may join.
    fn can_accept_new_players(&self) -> bool {
        true
    }

    /// Whether players can damage each other.
    fn pvp_enabled(&self) -> bool {
        false
    }

    /// Whether the client shows the reduced inventory.
    fn reduced_inventory(&self) -> bool {
        true
    }

    /// Whether nearby players are hidden.
    fn hides_nearby_players(&self) -> bool {
        false
    }

    /// Whether blocks may be broken at all.
    fn allows_block_break(&self) -> bool {
        false
    }

    /// Whether blocks may be placed at all.
    fn allows_block_place(&self) -> bool {
        false
    }

    /// Whether players take damage.
    fn allows_damage(&self) -> bool {
        true
    }

    /// Whether hunger drains.
    fn allows_hunger_loss(&self) -> bool {
        true
    }

    /// Items that may be used.
    fn item_use(&self) -> &PermissionSet {
        &DENY_ALL
    }

    /// Blocks that may be interacted with.
    fn block_interact(&self) -> &PermissionSet {
        &DENY_ALL
    }

    /// Blocks that may be broken.
    fn block_break(&self) -> &PermissionSet {
        &DENY_ALL
    }

    /// Blocks that may be placed.
    fn block_place(&self) -> &PermissionSet {
        &DENY_ALL
    }

    /// World-rule overrides applied on activation.
    fn ruleset(&self) -> Option<RuleSet> {
        None
    }

    /// Spawn table.
    fn spawn_assignment(&self) -> &SpawnAssignment;

    /// Placement for the `index`-th player of a roster.
    fn spawn_for(&self, index: usize, _rng: &mut DeterministicRng) -> Placement {
        self.spawn_assignment().get(index)
    }

    /// Zones the host keeps simulated; empty means unrestricted.
    fn active_regions(&self) -> &[ChunkArea] {
        &[]
    }

    /// Whether chunk `(x, z)` is inside an active region.
    fn is_region_active(&self, chunk_x: i32, chunk_z: i32) -> bool {
        region::is_active(self.active_regions(), chunk_x, chunk_z)
    }

    /// Opaque state for persistence and sync. Stateless variants write nothing.
    fn serialize_state(&self) -> Result<Vec<u8>, StateError> {
        Ok(Vec::new())
    }

    /// Restore state written by [`serialize_state`](Self::serialize_state).
    fn deserialize_state(&mut self, _bytes: &[u8]) -> Result<(), StateError> {
        Ok(())
    }
}

// =============================================================================
// NONE (normal play)
// =============================================================================

static NORMAL_PLAY_SPAWNS: SpawnAssignment = SpawnAssignment::fallback_only(Placement::DEFAULT);

/// Controller of a world with no minigame: everything is allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoneController;

impl MinigameController for NoneController {
    fn variant(&self) -> Variant {
        Variant::None
    }

    fn pvp_enabled(&self) -> bool {
        true
    }

    fn reduced_inventory(&self) -> bool {
        false
    }

    fn allows_block_break(&self) -> bool {
        true
    }

    fn allows_block_place(&self) -> bool {
        true
    }

    fn item_use(&self) -> &PermissionSet {
        &ALLOW_ALL
    }

    fn block_interact(&self) -> &PermissionSet {
        &ALLOW_ALL
    }

    fn block_break(&self) -> &PermissionSet {
        &ALLOW_ALL
    }

    fn block_place(&self) -> &PermissionSet {
        &ALLOW_ALL
    }

    fn spawn_assignment(&self) -> &SpawnAssignment {
        &NORMAL_PLAY_SPAWNS
    }
}

// =============================================================================
// TAGGED UNION
// =============================================================================

/// The active controller of a Binding.
#[derive(Debug, Clone)]
pub enum Controller {
    /// Normal play.
    None(NoneController),
    /// Waiting room.
    Lobby(LobbyController),
    /// Last player standing.
    Battle(BattleController),
    /// Tumble round.
    Tumble(TumbleController),
    /// Glide round.
    Glide(GlideController),
}

impl Default for Controller {
    fn default() -> Self {
        Controller::None(NoneController)
    }
}

impl Controller {
    /// Fresh controller for `variant`.
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::None => Controller::None(NoneController),
            Variant::Lobby => Controller::Lobby(LobbyController::new()),
            Variant::Battle => Controller::Battle(BattleController::new()),
            Variant::Tumble => Controller::Tumble(TumbleController::new()),
            Variant::Glide => Controller::Glide(GlideController::new()),
        }
    }

    /// Variant tag.
    pub fn variant(&self) -> Variant {
        self.as_dyn().variant()
    }

    /// Capability surface of the active variant.
    pub fn as_dyn(&self) -> &dyn MinigameController {
        match self {
            Controller::None(c) => c,
            Controller::Lobby(c) => c,
            Controller::Battle(c) => c,
            Controller::Tumble(c) => c,
            Controller::Glide(c) => c,
        }
    }

    /// Mutable capability surface of the active variant.
    pub fn as_dyn_mut(&mut self) -> &mut dyn MinigameController {
        match self {
            Controller::None(c) => c,
            Controller::Lobby(c) => c,
            Controller::Battle(c) => c,
            Controller::Tumble(c) => c,
            Controller::Glide(c) => c,
        }
    }

    /// Lobby state, if this is a lobby.
    pub fn as_lobby(&self) -> Option<&LobbyController> {
        match self {
            Controller::Lobby(c) => Some(c),
            _ => None,
        }
    }

    /// Mutable lobby state, if this is a lobby.
    pub fn as_lobby_mut(&mut self) -> Option<&mut LobbyController> {
        match self {
            Controller::Lobby(c) => Some(c),
            _ => None,
        }
    }

    /// Battle state, if this is a battle.
    pub fn as_battle(&self) -> Option<&BattleController> {
        match self {
            Controller::Battle(c) => Some(c),
            _ => None,
        }
    }
}
