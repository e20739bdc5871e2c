//! Tumble Controller
//!
//! Round skeleton without kill tracking. Nothing is persisted.

use crate::game::battle::ARENA_SPAWNS;
use crate::game::controller::{ControllerContext, MinigameController, TickOutcome};
use crate::game::round::{MatchRound, RoundPhase};
use crate::game::spawn::SpawnAssignment;
use crate::game::variant::Variant;
use crate::rules::ruleset::{self, RuleSet};
use crate::world::players::PlayerId;

/// Tumble state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TumbleController {
    round: MatchRound,
}

impl TumbleController {
    /// Idle round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Round state.
    pub fn round(&self) -> &MatchRound {
        &self.round
    }
}

impl MinigameController for TumbleController {
    fn variant(&self) -> Variant {
        Variant::Tumble
    }

    fn tick(&mut self, ctx: &mut ControllerContext<'_>) -> TickOutcome {
        self.round.tick(ctx)
    }

    fn start(&mut self, ctx: &mut ControllerContext<'_>) {
        self.round.start(Variant::Tumble.display_name(), ctx);
    }

    fn on_player_left(&mut self, player: PlayerId, ctx: &mut ControllerContext<'_>) {
        self.round.eliminate(player, ctx);
    }

    fn on_player_died(&mut self, victim: PlayerId, ctx: &mut ControllerContext<'_>) {
        self.round.eliminate(victim, ctx);
    }

    fn reset_round(&mut self) {
        self.round.reset();
    }

    fn can_accept_new_players(&self) -> bool {
        self.round.phase() == RoundPhase::Idle
    }

    fn ruleset(&self) -> Option<RuleSet> {
        Some(ruleset::tumble())
    }

    fn spawn_assignment(&self) -> &SpawnAssignment {
        &ARENA_SPAWNS
    }
}
