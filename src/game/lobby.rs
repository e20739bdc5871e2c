//! Lobby Controller
//!
//! Waiting room state machine: `Waiting -> Countdown -> Launching`. The
//! countdown only runs with enough participants, jumps to zero once everyone
//! is ready, and fires the launch exactly once until `reset_lobby_state()`.

use std::collections::BTreeSet;

use tracing::info;

use crate::core::placement::Placement;
use crate::core::region::ChunkArea;
use crate::core::rng::DeterministicRng;
use crate::game::controller::{ControllerContext, MinigameController, TickOutcome};
use crate::game::spawn::{SpawnAssignment, SpawnPool};
use crate::game::variant::Variant;
use crate::network::protocol::ServerMessage;
use crate::rules::permissions::PermissionSet;
use crate::rules::ruleset::{self, RuleSet};
use crate::world::players::PlayerId;

/// Countdown length (60 s at 20 Hz).
pub const LOBBY_COUNTDOWN_TICKS: u32 = 1200;

/// Where a fresh participant lands.
pub const DEFAULT_SPAWN: Placement = Placement::facing(-315.5, 66.0, -341.5, 90.0);

/// Where the winner of a round lands on return.
pub const WINNER_SPAWN: Placement = Placement::facing(-356.5, 71.0, -340.5, -90.0);

/// Return placements for everyone else.
pub const RANDOM_SPAWNS: [Placement; 16] = [
    Placement::facing(-342.5, 59.0, -340.5, -90.0),
    Placement::facing(-346.5, 52.0, -356.5, -90.0),
    Placement::facing(-353.5, 54.0, -330.5, 0.0),
    Placement::facing(-316.5, 64.0, -332.5, 90.0),
    Placement::facing(-316.5, 64.0, -348.5, 90.0),
    Placement::facing(-343.5, 65.0, -364.5, -90.0),
    Placement::facing(-340.5, 64.0, -315.5, -90.0),
    Placement::facing(-302.5, 64.0, -321.5, 90.0),
    Placement::facing(-303.5, 64.0, -365.5, 45.0),
    Placement::facing(-311.5, 72.0, -351.5, 0.0),
    Placement::facing(-311.5, 72.0, -329.5, 180.0),
    Placement::facing(-315.5, 76.0, -340.5, 90.0),
    Placement::facing(-358.5, 57.0, -309.5, 180.0),
    Placement::facing(-358.5, 57.0, -371.5, 0.0),
    Placement::facing(-326.5, 59.0, -356.5, 0.0),
    Placement::facing(-357.5, 52.0, -358.5, -45.0),
];

/// Pool over [`RANDOM_SPAWNS`].
pub const RETURN_POOL: SpawnPool = SpawnPool::new(&RANDOM_SPAWNS);

/// Chunk area the lobby keeps simulated.
pub const LOBBY_AREA: ChunkArea = ChunkArea::new(-27, -27, -15, -18);

const LOBBY_ITEMS: &[&str] = &[
    "bow", "arrow", "fishing_rod", "snowball", "elytra",
    "music_disc_13", "music_disc_cat", "music_disc_blocks", "music_disc_chirp",
    "music_disc_far", "music_disc_mall", "music_disc_mellohi", "music_disc_stal",
    "music_disc_strad", "music_disc_ward", "music_disc_11", "music_disc_wait",
];

const LOBBY_BLOCKS: &[&str] = &[
    // doors
    "oak_door", "iron_door", "spruce_door", "birch_door", "jungle_door", "acacia_door",
    "dark_oak_door", "mangrove_door", "cherry_door", "bamboo_door", "crimson_door", "warped_door",
    // trapdoors
    "oak_trapdoor", "iron_trapdoor", "spruce_trapdoor", "birch_trapdoor", "jungle_trapdoor",
    "acacia_trapdoor", "dark_oak_trapdoor",
    // buttons and lever
    "stone_button", "oak_button", "spruce_button", "birch_button", "jungle_button",
    "acacia_button", "dark_oak_button", "lever",
    // containers
    "chest", "ender_chest", "trapped_chest",
    // music
    "note_block", "jukebox",
    // fence gates
    "oak_fence_gate", "spruce_fence_gate", "birch_fence_gate", "jungle_fence_gate",
    "acacia_fence_gate", "dark_oak_fence_gate",
];

/// Lobby phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LobbyPhase {
    /// Not enough participants; countdown held at max.
    Waiting,
    /// Countdown running.
    Countdown,
    /// Launch fired; ticking is suspended until reset.
    Launching,
}

/// Waiting room controller.
#[derive(Debug, Clone)]
pub struct LobbyController {
    phase: LobbyPhase,
    countdown: u32,
    ready: BTreeSet<PlayerId>,
    started: bool,
    hold_ticks: u32,
    spawns: SpawnAssignment,
    item_use: PermissionSet,
    block_interact: PermissionSet,
    regions: [ChunkArea; 1],
}

impl Default for LobbyController {
    fn default() -> Self {
        Self::new()
    }
}

impl LobbyController {
    /// Fresh waiting room.
    pub fn new() -> Self {
        Self {
            phase: LobbyPhase::Waiting,
            countdown: LOBBY_COUNTDOWN_TICKS,
            ready: BTreeSet::new(),
            started: false,
            hold_ticks: 0,
            spawns: SpawnAssignment::fallback_only(DEFAULT_SPAWN).with_index(0, DEFAULT_SPAWN),
            item_use: PermissionSet::whitelist(LOBBY_ITEMS.iter().copied()),
            block_interact: PermissionSet::whitelist(LOBBY_BLOCKS.iter().copied()),
            regions: [LOBBY_AREA],
        }
    }

    /// Current phase.
    pub fn phase(&self) -> LobbyPhase {
        self.phase
    }

    /// Ticks left on the countdown.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Whether a launch has fired for the current waiting room.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether `player` signalled ready.
    pub fn is_ready(&self, player: &PlayerId) -> bool {
        self.ready.contains(player)
    }

    /// Number of ready players.
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Placement for a player coming back from a round.
    pub fn return_placement(is_winner: bool, rng: &mut DeterministicRng) -> Placement {
        if is_winner {
            WINNER_SPAWN
        } else {
            RETURN_POOL.pick(rng).unwrap_or(DEFAULT_SPAWN)
        }
    }

    /// The launch could not complete: back to `Waiting` with a full countdown
    /// and nobody ready, so the next attempt needs fresh ready signals.
    pub fn on_launch_failed(&mut self) {
        self.phase = LobbyPhase::Waiting;
        self.started = false;
        self.countdown = LOBBY_COUNTDOWN_TICKS;
        self.ready.clear();
    }

    /// Prepare for the next round: clear ready set, reset countdown, clear
    /// the started flag.
    pub fn reset_lobby_state(&mut self) {
        self.ready.clear();
        self.countdown = LOBBY_COUNTDOWN_TICKS;
        self.started = false;
        self.phase = LobbyPhase::Waiting;
        self.hold_ticks = 0;
        info!("Lobby ready for a new round");
    }

    fn all_ready(&self, roster: &[PlayerId]) -> bool {
        !roster.is_empty() && roster.iter().all(|p| self.ready.contains(p))
    }
}

impl MinigameController for LobbyController {
    fn variant(&self) -> Variant {
        Variant::Lobby
    }

    fn tick(&mut self, ctx: &mut ControllerContext<'_>) -> TickOutcome {
        if self.started {
            return TickOutcome::Idle;
        }
        let Some(config) = ctx.config else {
            return TickOutcome::Idle;
        };

        let roster = ctx.roster();
        let count = roster.len();
        let solo = config.is_solo();
        let enough = count > 0 && (solo || count >= config.min_players_to_start() as usize);

        if enough {
            self.phase = LobbyPhase::Countdown;
            self.hold_ticks = 0;

            if self.countdown % 20 == 0 {
                let seconds = self.countdown / 20;
                ctx.broadcast(ServerMessage::display(format!("Time to start: {} seconds", seconds)));
                if (1..=5).contains(&seconds) {
                    ctx.broadcast(ServerMessage::countdown_cue());
                }
            }

            if !solo && self.countdown > 0 && self.all_ready(&roster) {
                info!("All {} players ready, skipping countdown", count);
                self.countdown = 0;
            }

            if self.countdown == 0 {
                info!("Launching {} with {} players", config.variant().display_name(), count);
                self.phase = LobbyPhase::Launching;
                self.started = true;
                self.countdown = LOBBY_COUNTDOWN_TICKS;
                return TickOutcome::Launch;
            }

            self.countdown -= 1;
        } else if !solo && count == 1 {
            self.phase = LobbyPhase::Waiting;
            self.countdown = LOBBY_COUNTDOWN_TICKS;
            if self.hold_ticks % 20 == 0 {
                ctx.broadcast(ServerMessage::display(
                    "1 or more additional players are required to start the round...",
                ));
            }
            self.hold_ticks = self.hold_ticks.wrapping_add(1);
        } else {
            self.phase = LobbyPhase::Waiting;
            self.hold_ticks = 0;
            if self.countdown < LOBBY_COUNTDOWN_TICKS {
                self.countdown = LOBBY_COUNTDOWN_TICKS;
                info!("Lobby countdown reset, not enough players");
            }
        }

        TickOutcome::Idle
    }

    fn on_player_left(&mut self, player: PlayerId, _ctx: &mut ControllerContext<'_>) {
        self.ready.remove(&player);
    }

    fn set_ready(&mut self, player: PlayerId, ready: bool, ctx: &mut ControllerContext<'_>) -> bool {
        let name = ctx.name_of(&player);
        if ready {
            if !self.ready.insert(player) {
                return false;
            }
            ctx.broadcast(ServerMessage::system(format!("{} is ready!", name)));
            info!("Player {} is ready", player.short());
        } else {
            if !self.ready.remove(&player) {
                return false;
            }
            ctx.broadcast(ServerMessage::system(format!("{} is no longer ready", name)));
            info!("Player {} is not ready", player.short());
        }
        true
    }

    fn allows_damage(&self) -> bool {
        false
    }

    fn allows_hunger_loss(&self) -> bool {
        false
    }

    fn item_use(&self) -> &PermissionSet {
        &self.item_use
    }

    fn block_interact(&self) -> &PermissionSet {
        &self.block_interact
    }

    fn ruleset(&self) -> Option<RuleSet> {
        Some(ruleset::lobby())
    }

    fn spawn_assignment(&self) -> &SpawnAssignment {
        &self.spawns
    }

    fn spawn_for(&self, index: usize, rng: &mut DeterministicRng) -> Placement {
        if index == 0 {
            self.spawns.get(0)
        } else {
            RETURN_POOL.pick(rng).unwrap_or(DEFAULT_SPAWN)
        }
    }

    fn active_regions(&self) -> &[ChunkArea] {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::world::instance::WorldKey;
    use crate::world::players::{PlayerDirectory, PlayerHandle};
    use tokio::sync::mpsc;

    struct Harness {
        world: WorldKey,
        players: PlayerDirectory,
        config: SessionConfig,
        receivers: Vec<mpsc::Receiver<ServerMessage>>,
    }

    impl Harness {
        fn new(min: i64) -> Self {
            Self {
                world: WorldKey::minigame("lobby"),
                players: PlayerDirectory::new(),
                config: SessionConfig::new(Variant::Battle, 8, min),
                receivers: Vec::new(),
            }
        }

        fn join(&mut self, n: u8) -> PlayerId {
            let id = PlayerId::new([n; 16]);
            let (tx, rx) = mpsc::channel(4096);
            self.players.insert(PlayerHandle::new(id, format!("p{}", n), self.world.clone(), DEFAULT_SPAWN, tx));
            self.receivers.push(rx);
            id
        }

        fn tick(&mut self, lobby: &mut LobbyController) -> TickOutcome {
            let mut ctx = ControllerContext::new(&self.world, &mut self.players, Some(&self.config));
            lobby.tick(&mut ctx)
        }

        fn ready(&mut self, lobby: &mut LobbyController, id: PlayerId, ready: bool) -> bool {
            let mut ctx = ControllerContext::new(&self.world, &mut self.players, Some(&self.config));
            lobby.set_ready(id, ready, &mut ctx)
        }
    }

    #[test]
    fn test_single_player_pins_countdown() {
        let mut h = Harness::new(2);
        let mut lobby = LobbyController::new();
        h.join(1);

        for _ in 0..5000 {
            assert_eq!(h.tick(&mut lobby), TickOutcome::Idle);
            assert_eq!(lobby.countdown(), LOBBY_COUNTDOWN_TICKS);
        }
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
        assert_eq!(
            h.receivers[0].try_recv().unwrap(),
            ServerMessage::display("1 or more additional players are required to start the round...")
        );
    }

    #[test]
    fn test_countdown_decreases_then_launches_once() {
        let mut h = Harness::new(2);
        let mut lobby = LobbyController::new();
        h.join(1);
        h.join(2);

        let mut previous = lobby.countdown();
        let mut launches = 0;
        for _ in 0..(LOBBY_COUNTDOWN_TICKS + 1) {
            match h.tick(&mut lobby) {
                TickOutcome::Launch => launches += 1,
                _ => {
                    assert_eq!(lobby.countdown(), previous - 1);
                    previous = lobby.countdown();
                }
            }
        }
        assert_eq!(launches, 1);
        assert!(lobby.is_started());
        assert_eq!(lobby.phase(), LobbyPhase::Launching);

        for _ in 0..100 {
            assert_eq!(h.tick(&mut lobby), TickOutcome::Idle);
        }
    }

    #[test]
    fn test_all_ready_launches_immediately_once() {
        let mut h = Harness::new(2);
        let mut lobby = LobbyController::new();
        let p1 = h.join(1);
        let p2 = h.join(2);

        assert_eq!(h.tick(&mut lobby), TickOutcome::Idle);
        assert!(h.ready(&mut lobby, p1, true));
        assert!(!h.ready(&mut lobby, p1, true));
        assert!(h.ready(&mut lobby, p2, true));

        assert_eq!(h.tick(&mut lobby), TickOutcome::Launch);
        assert!(!h.ready(&mut lobby, p2, true));
        for _ in 0..50 {
            assert_eq!(h.tick(&mut lobby), TickOutcome::Idle);
        }
    }

    #[test]
    fn test_unready_is_idempotent() {
        let mut h = Harness::new(2);
        let mut lobby = LobbyController::new();
        let p1 = h.join(1);
        assert!(!h.ready(&mut lobby, p1, false));
        assert!(h.ready(&mut lobby, p1, true));
        assert!(h.ready(&mut lobby, p1, false));
        assert!(!lobby.is_ready(&p1));
    }

    #[test]
    fn test_solo_counts_down_without_ready_skip() {
        let mut h = Harness::new(1);
        let mut lobby = LobbyController::new();
        let p1 = h.join(1);
        h.ready(&mut lobby, p1, true);

        assert_eq!(h.tick(&mut lobby), TickOutcome::Idle);
        assert_eq!(lobby.phase(), LobbyPhase::Countdown);
        assert_eq!(lobby.countdown(), LOBBY_COUNTDOWN_TICKS - 1);
    }

    #[test]
    fn test_empty_lobby_holds_silently() {
        let mut h = Harness::new(2);
        let mut lobby = LobbyController::new();
        for _ in 0..100 {
            assert_eq!(h.tick(&mut lobby), TickOutcome::Idle);
        }
        assert_eq!(lobby.countdown(), LOBBY_COUNTDOWN_TICKS);
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
    }

    #[test]
    fn test_departure_resets_countdown() {
        let mut h = Harness::new(3);
        let mut lobby = LobbyController::new();
        h.join(1);
        h.join(2);
        let p3 = h.join(3);
        for _ in 0..30 {
            h.tick(&mut lobby);
        }
        assert!(lobby.countdown() < LOBBY_COUNTDOWN_TICKS);

        h.players.remove(&p3);
        h.tick(&mut lobby);
        assert_eq!(lobby.countdown(), LOBBY_COUNTDOWN_TICKS);
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
    }

    #[test]
    fn test_countdown_notice_and_cue() {
        let mut h = Harness::new(2);
        let mut lobby = LobbyController::new();
        h.join(1);
        h.join(2);

        h.tick(&mut lobby);
        assert_eq!(h.receivers[0].try_recv().unwrap(), ServerMessage::display("Time to start: 60 seconds"));
        assert!(h.receivers[0].try_recv().is_err());

        // run to the 5 second mark
        while lobby.countdown() > 100 {
            h.tick(&mut lobby);
        }
        while h.receivers[0].try_recv().is_ok() {}
        h.tick(&mut lobby);
        assert_eq!(h.receivers[0].try_recv().unwrap(), ServerMessage::display("Time to start: 5 seconds"));
        assert_eq!(h.receivers[0].try_recv().unwrap(), ServerMessage::countdown_cue());
    }

    #[test]
    fn test_reset_and_failed_launch() {
        let mut h = Harness::new(2);
        let mut lobby = LobbyController::new();
        let p1 = h.join(1);
        let p2 = h.join(2);
        h.ready(&mut lobby, p1, true);
        h.ready(&mut lobby, p2, true);
        assert_eq!(h.tick(&mut lobby), TickOutcome::Launch);

        lobby.on_launch_failed();
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
        assert!(!lobby.is_started());
        assert_eq!(lobby.ready_count(), 0);

        h.ready(&mut lobby, p1, true);
        lobby.reset_lobby_state();
        assert_eq!(lobby.ready_count(), 0);
        assert_eq!(lobby.countdown(), LOBBY_COUNTDOWN_TICKS);
    }

    #[test]
    fn test_lobby_capabilities() {
        let lobby = LobbyController::new();
        assert!(!lobby.pvp_enabled());
        assert!(lobby.reduced_inventory());
        assert!(!lobby.allows_damage());
        assert!(!lobby.allows_hunger_loss());
        assert!(lobby.item_use().is_allowed("elytra"));
        assert!(!lobby.item_use().is_allowed("diamond_sword"));
        assert!(lobby.block_interact().is_allowed("jukebox"));
        assert!(!lobby.block_break().is_allowed("oak_door"));
        assert!(lobby.is_region_active(-20, -20));
        assert!(!lobby.is_region_active(0, 0));
        assert!(lobby.serialize_state().unwrap().is_empty());
    }

    #[test]
    fn test_spawn_index_zero_is_default() {
        let lobby = LobbyController::new();
        let mut rng = DeterministicRng::new(1);
        assert_eq!(lobby.spawn_for(0, &mut rng), DEFAULT_SPAWN);
        for i in 1..20 {
            assert!(RETURN_POOL.contains(&lobby.spawn_for(i, &mut rng)));
        }
        assert_eq!(LobbyController::return_placement(true, &mut rng), WINNER_SPAWN);
    }
}
