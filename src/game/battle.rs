//! Battle Controller
//!
//! Last player standing. Runs the shared round skeleton with kill tallies on
//! and persists its full state with bincode.

use serde::{Serialize, Deserialize};
use tracing::info;

use crate::core::placement::Placement;
use crate::game::controller::{ControllerContext, MinigameController, StateError, TickOutcome};
use crate::game::round::{MatchRound, RoundPhase};
use crate::game::spawn::SpawnAssignment;
use crate::game::variant::Variant;
use crate::network::protocol::ServerMessage;
use crate::rules::ruleset::{self, RuleSet};
use crate::world::players::PlayerId;

/// Where every player enters a match arena.
pub const ARENA_SPAWN: Placement = Placement::facing(0.5, 64.0, 0.5, 0.0);

pub(crate) static ARENA_SPAWNS: SpawnAssignment = SpawnAssignment::universal(ARENA_SPAWN);

/// Battle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleController {
    round: MatchRound,
}

impl Default for BattleController {
    fn default() -> Self {
        Self { round: MatchRound::with_kill_tally() }
    }
}

impl BattleController {
    /// Idle battle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Round state.
    pub fn round(&self) -> &MatchRound {
        &self.round
    }

    /// Current round phase.
    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    /// Whether `player` is still in the round.
    pub fn is_player_alive(&self, player: &PlayerId) -> bool {
        self.round.is_alive(player)
    }

    /// Players still in the round.
    pub fn remaining_players(&self) -> usize {
        self.round.remaining()
    }

    /// Kills credited to `player` this round.
    pub fn kills_of(&self, player: &PlayerId) -> u32 {
        self.round.kills_of(player)
    }

    /// Winner of the finished round.
    pub fn winner(&self) -> Option<PlayerId> {
        self.round.winner()
    }
}

impl MinigameController for BattleController {
    fn variant(&self) -> Variant {
        Variant::Battle
    }

    fn tick(&mut self, ctx: &mut ControllerContext<'_>) -> TickOutcome {
        self.round.tick(ctx)
    }

    fn start(&mut self, ctx: &mut ControllerContext<'_>) {
        self.round.start(Variant::Battle.display_name(), ctx);
    }

    fn on_player_left(&mut self, player: PlayerId, ctx: &mut ControllerContext<'_>) {
        self.round.eliminate(player, ctx);
    }

    fn on_player_died(&mut self, victim: PlayerId, ctx: &mut ControllerContext<'_>) {
        self.round.eliminate(victim, ctx);
    }

    fn on_player_kill(&mut self, killer: PlayerId, victim: PlayerId, ctx: &mut ControllerContext<'_>) {
        let kills = self.round.credit_kill(killer);
        ctx.send(&killer, ServerMessage::display(format!("+{} Kill!", kills)));
        info!("Player {} killed {} ({} kills)", killer.short(), victim.short(), kills);
        self.on_player_died(victim, ctx);
    }

    fn reset_round(&mut self) {
        self.round.reset();
    }

    fn can_accept_new_players(&self) -> bool {
        self.round.phase() == RoundPhase::Idle
    }

    fn pvp_enabled(&self) -> bool {
        true
    }

    fn reduced_inventory(&self) -> bool {
        false
    }

    fn allows_damage(&self) -> bool {
        self.round.phase() == RoundPhase::Active
    }

    fn ruleset(&self) -> Option<RuleSet> {
        Some(ruleset::battle())
    }

    fn spawn_assignment(&self) -> &SpawnAssignment {
        &ARENA_SPAWNS
    }

    fn serialize_state(&self) -> Result<Vec<u8>, StateError> {
        Ok(bincode::serialize(self)?)
    }

    fn deserialize_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        *self = bincode::deserialize(bytes)?;
        Ok(())
    }
}
