//! Session Registry
//!
//! The one explicitly-owned orchestration object of a server process. It
//! owns the connected players, every Binding, the world lifecycle manager
//! and the hosted session config, and it is the only place where work that
//! spans world instances happens: launching a match out of the lobby and
//! returning everyone afterwards.
//!
//! Everything here runs on the tick driver's task; nothing blocks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::{ServerConfig, SessionConfig, PLAYER_LIMIT};
use crate::core::placement::Placement;
use crate::core::rng::DeterministicRng;
use crate::game::controller::{ControllerContext, MinigameController, TickOutcome};
use crate::game::lobby::{LobbyController, LobbyPhase};
use crate::game::variant::Variant;
use crate::network::protocol::ServerMessage;
use crate::session::binding::BindingTable;
use crate::session::store::{BindingStore, StoreError};
use crate::world::bootstrap::{WorldBootstrap, WorldError};
use crate::world::instance::WorldKey;
use crate::world::lifecycle::WorldLifecycleManager;
use crate::world::players::{PlayerDirectory, PlayerHandle, PlayerId};

/// Logical name of the waiting room.
pub const LOBBY_WORLD: &str = "lobby";

/// Notice shown to the lobby when a launch fails.
pub const LAUNCH_FAILED_NOTICE: &str = "Minigame failed to start, check logs";

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The lobby already holds the configured maximum.
    #[error("Lobby is full")]
    LobbyFull,

    /// The lobby controller refuses new participants.
    #[error("Lobby is not accepting players")]
    NotAccepting,

    /// Player id already connected.
    #[error("Player already connected")]
    AlreadyConnected,

    /// Player id not connected.
    #[error("Player not found")]
    PlayerNotFound,

    /// Readiness only exists in the lobby.
    #[error("Ready is only available in the lobby")]
    NotInLobby,

    /// No session has been configured yet.
    #[error("No session configured")]
    NotConfigured,

    /// The configured variant cannot be launched.
    #[error("{0} is not a playable minigame")]
    NotPlayable(&'static str),

    /// Nobody is in the lobby.
    #[error("No players to launch with")]
    EmptyRoster,

    /// A world could not be made resident.
    #[error("World {0} could not be loaded")]
    WorldUnavailable(String),

    /// Another return sequence holds the lock.
    #[error("A return to the lobby is already in progress")]
    ReturnInProgress,

    /// World lifecycle failure.
    #[error(transparent)]
    World(#[from] WorldError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Host-engine action checked against a player's current world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction<'a> {
    /// Use an item.
    UseItem(&'a str),
    /// Right-click a block.
    InteractBlock(&'a str),
    /// Break a block.
    BreakBlock(&'a str),
    /// Place a block.
    PlaceBlock(&'a str),
    /// Take damage.
    TakeDamage {
        /// Whether another player dealt it.
        from_player: bool,
    },
    /// Lose food.
    LoseHunger,
}

/// Snapshot of the registry for the admin surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryStatus {
    /// Hosted session, if configured.
    pub session: Option<SessionConfig>,
    /// Lobby phase, if the lobby runs its controller.
    pub lobby_phase: Option<LobbyPhase>,
    /// Seconds left on the lobby countdown.
    pub countdown_seconds: u32,
    /// Participants in the lobby.
    pub lobby_players: usize,
    /// Ready participants.
    pub ready_players: usize,
    /// Every resident world and its active variant.
    pub worlds: Vec<(WorldKey, Variant)>,
    /// Ticks driven so far.
    pub ticks: u64,
}

impl RegistryStatus {
    /// User-facing lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.session {
            Some(config) => lines.push(format!(
                "Session: {} ({}-{} players)",
                config.variant().display_name(),
                config.min_players_to_start(),
                config.max_players()
            )),
            None => lines.push("Session: not configured".to_string()),
        }
        if let Some(phase) = self.lobby_phase {
            lines.push(format!(
                "Lobby: {:?}, {} player(s), {} ready, {}s to start",
                phase, self.lobby_players, self.ready_players, self.countdown_seconds
            ));
        }
        for (key, variant) in &self.worlds {
            lines.push(format!("World {}: {}", key, variant.display_name()));
        }
        lines
    }
}

/// Owner of players, Bindings, worlds and the session config.
pub struct SessionRegistry {
    server: ServerConfig,
    session: Option<SessionConfig>,
    players: PlayerDirectory,
    bindings: BindingTable,
    lifecycle: WorldLifecycleManager,
    rng: DeterministicRng,
    return_lock: Arc<Mutex<()>>,
    lobby: WorldKey,
    ticks: u64,
    tick_failures: u64,
    #[cfg(test)]
    panic_on_tick: Option<WorldKey>,
}

impl SessionRegistry {
    /// Register the lobby and arenas and load the lobby.
    pub fn new(
        server: ServerConfig,
        store: Box<dyn BindingStore>,
        bootstrap: Box<dyn WorldBootstrap>,
    ) -> Result<Self, RegistryError> {
        let mut lifecycle = WorldLifecycleManager::new(bootstrap, server.cleanup_delay);
        let lobby = WorldKey::minigame(LOBBY_WORLD);
        lifecycle.register(LOBBY_WORLD, lobby.clone(), Variant::Lobby);
        for variant in Variant::MATCHES {
            lifecycle.register(variant.token(), WorldKey::minigame(variant.token()), variant);
        }

        let rng = server.rng_seed.map(DeterministicRng::new).unwrap_or_else(DeterministicRng::from_clock);
        let mut registry = Self {
            server,
            session: None,
            players: PlayerDirectory::new(),
            bindings: BindingTable::new(store),
            lifecycle,
            rng,
            return_lock: Arc::new(Mutex::new(())),
            lobby,
            ticks: 0,
            tick_failures: 0,
            #[cfg(test)]
            panic_on_tick: None,
        };

        registry
            .lifecycle
            .load(LOBBY_WORLD, &mut registry.bindings, &registry.players)
            .ok_or_else(|| RegistryError::WorldUnavailable(LOBBY_WORLD.to_string()))?;
        info!("Session registry ready, lobby at {}", registry.lobby);
        Ok(registry)
    }

    // =========================================================================
    // SESSION CONFIG
    // =========================================================================

    /// Set the hosted session. The config is immutable once set.
    ///
    /// # Panics
    ///
    /// Panics if a session is already configured.
    pub fn configure(&mut self, config: SessionConfig) {
        if let Some(existing) = &self.session {
            panic!("session already configured as {:?}", existing);
        }
        info!(
            "Session configured: {} with {}-{} players",
            config.variant().display_name(),
            config.min_players_to_start(),
            config.max_players()
        );
        self.session = Some(config);
    }

    /// Whether a session is configured.
    pub fn is_configured(&self) -> bool {
        self.session.is_some()
    }

    /// Hosted session.
    pub fn session_config(&self) -> Option<&SessionConfig> {
        self.session.as_ref()
    }

    /// Process configuration.
    pub fn server_config(&self) -> &ServerConfig {
        &self.server
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Lobby world key.
    pub fn lobby_key(&self) -> &WorldKey {
        &self.lobby
    }

    /// Connected players.
    pub fn players(&self) -> &PlayerDirectory {
        &self.players
    }

    /// Bindings.
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// World lifecycle manager.
    pub fn lifecycle(&self) -> &WorldLifecycleManager {
        &self.lifecycle
    }

    /// Mutable world lifecycle manager (drained by the driver on shutdown).
    pub fn lifecycle_mut(&mut self) -> &mut WorldLifecycleManager {
        &mut self.lifecycle
    }

    /// Lobby controller state.
    pub fn lobby(&self) -> Option<&LobbyController> {
        self.bindings.get(&self.lobby).and_then(|b| b.controller().as_lobby())
    }

    /// Lock serializing return sequences.
    pub fn return_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.return_lock)
    }

    /// Ticks driven so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Controller ticks that panicked and were skipped.
    pub fn tick_failures(&self) -> u64 {
        self.tick_failures
    }

    // =========================================================================
    // PLAYER EVENTS
    // =========================================================================

    /// Admit a player into the lobby at the placement for their join index.
    pub fn player_joined(
        &mut self,
        id: PlayerId,
        name: &str,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> Result<Placement, RegistryError> {
        if self.players.contains(&id) {
            return Err(RegistryError::AlreadyConnected);
        }

        let lobby = self.lobby.clone();
        let max = self.session.map(|c| c.max_players()).unwrap_or(PLAYER_LIMIT) as usize;
        let present = self.players.count_in(&lobby);
        if present >= max {
            warn!("Refusing player {}: lobby holds {}/{}", id.short(), present, max);
            return Err(refuse(&outbox, RegistryError::LobbyFull));
        }

        let binding = self.bindings.ensure(&lobby);
        if !binding.can_accept_new_players() {
            warn!("Refusing player {}: lobby not accepting", id.short());
            return Err(refuse(&outbox, RegistryError::NotAccepting));
        }
        let placement = binding.capabilities().spawn_for(present, &mut self.rng);

        let mut handle = PlayerHandle::new(id, name, lobby.clone(), placement, outbox);
        handle.teleport(&lobby, placement);
        self.players.insert(handle);

        self.dispatch(&lobby, |controller, ctx| {
            controller.on_player_assigned(id, false, ctx);
            controller.on_player_loaded(id, ctx);
        });
        self.bindings.sync_to(&lobby, &id, &self.players);

        info!("Player {} ({}) joined the lobby", id.short(), name);
        Ok(placement)
    }

    /// A player disconnected.
    pub fn player_left(&mut self, id: &PlayerId) -> bool {
        let Some(world) = self.players.get(id).map(|p| p.world.clone()) else {
            return false;
        };
        let player = *id;
        self.dispatch(&world, |controller, ctx| controller.on_player_left(player, ctx));
        self.players.remove(id);
        self.persist(&world);

        info!("Player {} left {}", id.short(), world);
        true
    }

    /// Readiness signal. Returns whether anything changed.
    pub fn set_ready(&mut self, id: &PlayerId, ready: bool) -> Result<bool, RegistryError> {
        let world = self.world_of(id)?;
        let player = *id;
        let changed = self
            .dispatch(&world, |controller, ctx| controller.set_ready(player, ready, ctx))
            .unwrap_or(false);
        if changed {
            self.persist(&world);
        }
        Ok(changed)
    }

    /// Flip readiness. Returns the new value. Refused outside the lobby.
    pub fn toggle_ready(&mut self, id: &PlayerId) -> Result<bool, RegistryError> {
        let world = self.world_of(id)?;
        let currently = self
            .bindings
            .get(&world)
            .and_then(|b| b.controller().as_lobby())
            .map(|lobby| lobby.is_ready(id))
            .ok_or(RegistryError::NotInLobby)?;
        self.set_ready(id, !currently)?;
        Ok(!currently)
    }

    /// A player died. A killer other than the victim is credited with a kill.
    pub fn player_died(&mut self, victim: &PlayerId, killer: Option<PlayerId>) -> Result<(), RegistryError> {
        let world = self.world_of(victim)?;
        let victim = *victim;
        match killer.filter(|k| *k != victim) {
            Some(killer) => {
                self.dispatch(&world, |controller, ctx| controller.on_player_kill(killer, victim, ctx));
            }
            None => {
                self.dispatch(&world, |controller, ctx| controller.on_player_died(victim, ctx));
            }
        }
        self.persist(&world);
        Ok(())
    }

    /// Whether the player's current world allows `action`.
    pub fn check_action(&self, id: &PlayerId, action: PlayerAction<'_>) -> bool {
        let Some(player) = self.players.get(id) else {
            return true;
        };
        let caps = self.bindings.capabilities(&player.world);
        match action {
            PlayerAction::UseItem(item) => caps.item_use().is_allowed(item),
            PlayerAction::InteractBlock(block) => caps.block_interact().is_allowed(block),
            PlayerAction::BreakBlock(block) => caps.allows_block_break() && caps.block_break().is_allowed(block),
            PlayerAction::PlaceBlock(block) => caps.allows_block_place() && caps.block_place().is_allowed(block),
            PlayerAction::TakeDamage { from_player } => {
                caps.allows_damage() && (!from_player || caps.pvp_enabled())
            }
            PlayerAction::LoseHunger => caps.allows_hunger_loss(),
        }
    }

    /// Whether chunk `(x, z)` of `world` is simulated.
    pub fn is_region_active(&self, world: &WorldKey, chunk_x: i32, chunk_z: i32) -> bool {
        self.bindings.capabilities(world).is_region_active(chunk_x, chunk_z)
    }

    /// Current state for the admin surface.
    pub fn status(&self) -> RegistryStatus {
        let lobby = self.lobby();
        RegistryStatus {
            session: self.session,
            lobby_phase: lobby.map(LobbyController::phase),
            countdown_seconds: lobby.map(|l| l.countdown() / 20).unwrap_or(0),
            lobby_players: self.players.count_in(&self.lobby),
            ready_players: lobby.map(LobbyController::ready_count).unwrap_or(0),
            worlds: self
                .lifecycle
                .resident_keys()
                .into_iter()
                .map(|key| {
                    let variant = self.bindings.active_variant(&key);
                    (key, variant)
                })
                .collect(),
            ticks: self.ticks,
        }
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Tick every resident world once, then act on what the controllers
    /// reported.
    pub fn tick(&mut self) {
        self.ticks += 1;

        for key in self.lifecycle.resident_keys() {
            if !self.lifecycle.is_resident(&key) {
                continue;
            }
            match self.tick_binding(&key) {
                TickOutcome::Idle => {}
                TickOutcome::Launch => {
                    if let Err(e) = self.launch() {
                        self.abort_launch(&e);
                    }
                }
                TickOutcome::ReturnToLobby { winner } => {
                    if let Err(e) = self.return_to_lobby(&key, winner) {
                        warn!("Return from {} deferred: {}", key, e);
                    }
                }
            }
        }
    }

    /// One controller tick, guarded so a panic only skips this binding.
    fn tick_binding(&mut self, key: &WorldKey) -> TickOutcome {
        let Some(binding) = self.bindings.get_mut(key) else {
            return TickOutcome::Idle;
        };
        let players = &mut self.players;
        let config = self.session.as_ref();
        #[cfg(test)]
        let sabotaged = self.panic_on_tick.as_ref() == Some(key);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            #[cfg(test)]
            if sabotaged {
                panic!("controller tick failure in {}", key);
            }
            let mut ctx = ControllerContext::new(key, players, config);
            binding.controller_mut().as_dyn_mut().tick(&mut ctx)
        }));
        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                self.tick_failures += 1;
                error!("Controller tick for {} panicked, skipping", key);
                TickOutcome::Idle
            }
        }
    }

    // =========================================================================
    // LAUNCH AND RETURN
    // =========================================================================

    /// Move the lobby roster into a fresh arena of the configured variant.
    fn launch(&mut self) -> Result<WorldKey, RegistryError> {
        let config = self.session.ok_or(RegistryError::NotConfigured)?;
        let variant = config.variant();
        if !variant.is_actual_minigame() {
            return Err(RegistryError::NotPlayable(variant.display_name()));
        }

        let lobby = self.lobby.clone();
        let roster = self.players.in_world(&lobby);
        if roster.is_empty() {
            return Err(RegistryError::EmptyRoster);
        }

        let name = variant.token();
        let arena = self
            .lifecycle
            .load(name, &mut self.bindings, &self.players)
            .ok_or_else(|| RegistryError::WorldUnavailable(name.to_string()))?;

        // every round starts from a fresh controller
        self.lifecycle.activate(&arena, variant, &mut self.bindings, &self.players);

        for (index, id) in roster.iter().enumerate() {
            let placement = self.bindings.capabilities(&arena).spawn_for(index, &mut self.rng);
            if let Some(player) = self.players.get_mut(id) {
                player.hand_off(&arena, placement);
            }
            let player = *id;
            self.dispatch(&arena, |controller, ctx| controller.on_player_assigned(player, false, ctx));
            self.bindings.sync_to(&arena, id, &self.players);
        }

        self.dispatch(&arena, |controller, ctx| controller.start(ctx));
        self.persist(&arena);
        self.persist(&lobby);

        info!("Launched {} in {} with {} players", variant.display_name(), arena, roster.len());
        Ok(arena)
    }

    /// Leave the lobby in `Waiting` after a failed launch.
    fn abort_launch(&mut self, err: &RegistryError) {
        error!("Launch failed: {}", err);
        if let Some(lobby) = self.bindings.get_mut(&self.lobby).and_then(|b| b.controller_mut().as_lobby_mut()) {
            lobby.on_launch_failed();
        }
        self.players.broadcast(&self.lobby, &ServerMessage::system(LAUNCH_FAILED_NOTICE));
        let lobby = self.lobby.clone();
        self.persist(&lobby);
    }

    /// Bring everyone in `arena` back to the lobby and tear the arena down.
    fn return_to_lobby(&mut self, arena: &WorldKey, winner: Option<PlayerId>) -> Result<(), RegistryError> {
        let _guard = Arc::clone(&self.return_lock)
            .try_lock_owned()
            .map_err(|_| RegistryError::ReturnInProgress)?;

        // the lobby Binding must hand out lobby state before anyone arrives
        let lobby = self
            .lifecycle
            .load(LOBBY_WORLD, &mut self.bindings, &self.players)
            .ok_or_else(|| RegistryError::WorldUnavailable(LOBBY_WORLD.to_string()))?;
        if let Some(world) = self.lifecycle.instance_mut(&lobby) {
            world.discard_regions();
        }

        let returning = self.players.in_world(arena);
        for id in &returning {
            let placement = LobbyController::return_placement(winner == Some(*id), &mut self.rng);
            if let Some(player) = self.players.get_mut(id) {
                player.hand_off(&lobby, placement);
            }
            self.bindings.sync_to(&lobby, id, &self.players);
        }

        if let Some(controller) = self.bindings.get_mut(&lobby).and_then(|b| b.controller_mut().as_lobby_mut()) {
            controller.reset_lobby_state();
        }
        self.persist(&lobby);

        if let Some(binding) = self.bindings.get_mut(arena) {
            binding.controller_mut().as_dyn_mut().reset_round();
        }
        self.persist(arena);

        let arena_name = self.lifecycle.instance(arena).map(|w| w.name().to_string());
        if let Some(name) = arena_name {
            if let Err(e) = self.lifecycle.unload(&name, &self.players) {
                warn!("Arena {} stays resident: {}", arena, e);
            }
        }

        info!(
            "Returned {} players from {} (winner: {})",
            returning.len(),
            arena,
            winner.map(|w| w.short()).unwrap_or_else(|| "none".to_string())
        );
        Ok(())
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn world_of(&self, id: &PlayerId) -> Result<WorldKey, RegistryError> {
        self.players
            .get(id)
            .map(|p| p.world.clone())
            .ok_or(RegistryError::PlayerNotFound)
    }

    /// Run `f` against the controller bound to `key`.
    fn dispatch<R>(
        &mut self,
        key: &WorldKey,
        f: impl FnOnce(&mut dyn MinigameController, &mut ControllerContext<'_>) -> R,
    ) -> Option<R> {
        let binding = self.bindings.get_mut(key)?;
        let mut ctx = ControllerContext::new(key, &mut self.players, self.session.as_ref());
        Some(f(binding.controller_mut().as_dyn_mut(), &mut ctx))
    }

    /// Persist and broadcast; failures are logged by the table and retried
    /// on the next change.
    fn persist(&mut self, key: &WorldKey) {
        if self.bindings.mark_dirty(key, &self.players).is_err() {
            debug!("Binding {} left dirty", key);
        }
    }
}

/// Tell a connecting player why they were turned away.
fn refuse(outbox: &mpsc::Sender<ServerMessage>, err: RegistryError) -> RegistryError {
    let _ = outbox.try_send(ServerMessage::Refused { reason: err.to_string() });
    err
}
