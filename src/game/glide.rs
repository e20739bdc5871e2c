//! Glide Controller
//!
//! Round skeleton without kill tracking. PvP is always off and the reduced
//! inventory always on, whatever the round phase.

use crate::game::battle::ARENA_SPAWNS;
use crate::game::controller::{ControllerContext, MinigameController, TickOutcome};
use crate::game::round::{MatchRound, RoundPhase};
use crate::game::spawn::SpawnAssignment;
use crate::game::variant::Variant;
use crate::rules::ruleset::{self, RuleSet};
use crate::world::players::PlayerId;

/// Glide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlideController {
    round: MatchRound,
}

impl GlideController {
    /// Idle round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Round state.
    pub fn round(&self) -> &MatchRound {
        &self.round
    }
}

impl MinigameController for GlideController {
    fn variant(&self) -> Variant {
        Variant::Glide
    }

    fn tick(&mut self, ctx: &mut ControllerContext<'_>) -> TickOutcome {
        self.round.tick(ctx)
    }

    fn start(&mut self, ctx: &mut ControllerContext<'_>) {
        self.round.start(Variant::Glide.display_name(), ctx);
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

    fn pvp_enabled(&self) -> bool {
        false
    }

    fn reduced_inventory(&self) -> bool {
        true
    }

    fn ruleset(&self) -> Option<RuleSet> {
        Some(ruleset::glide())
    }

    fn spawn_assignment(&self) -> &SpawnAssignment {
        &ARENA_SPAWNS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ruleset::BoolRule;

    #[test]
    fn test_glide_flags() {
        let glide = GlideController::new();
        assert!(!glide.pvp_enabled());
        assert!(glide.reduced_inventory());
        assert_eq!(glide.ruleset().unwrap().bool_override(BoolRule::FallDamage), Some(false));
        assert!(glide.serialize_state().unwrap().is_empty());
    }
}
