//! Match Round Skeleton
//!
//! The `Idle -> Active -> Ended -> Idle` machine shared by every match
//! variant: alive set, optional kill tallies, elapsed-time announcements, win
//! detection and the return countdown.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Deserialize};
use tracing::info;

use crate::game::controller::{ControllerContext, TickOutcome};
use crate::network::protocol::ServerMessage;
use crate::world::players::{GameMode, PlayerId};

/// Ticks between elapsed-time announcements (one minute at 20 Hz).
pub const ELAPSED_ANNOUNCE_TICKS: u32 = 1200;

/// Ticks from the end of a round until everyone is sent back (10 s).
pub const RETURN_COUNTDOWN_TICKS: u32 = 200;

/// Round lifecycle phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Waiting for `start()`.
    #[default]
    Idle,
    /// Round in progress.
    Active,
    /// Round over, counting down to the return sequence.
    Ended,
}

/// Shared round state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRound {
    phase: RoundPhase,
    elapsed_ticks: u32,
    return_countdown: u32,
    winner: Option<PlayerId>,
    alive: BTreeSet<PlayerId>,
    participants: u32,
    /// `None` for variants that do not count kills.
    kills: Option<BTreeMap<PlayerId, u32>>,
}

impl MatchRound {
    /// Round that credits kills and reports the winner's tally.
    pub fn with_kill_tally() -> Self {
        Self {
            kills: Some(BTreeMap::new()),
            ..Self::default()
        }
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Ticks since `start()`.
    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    /// Ticks left before the return sequence.
    pub fn return_countdown(&self) -> u32 {
        self.return_countdown
    }

    /// Sole survivor of a finished round.
    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    /// Whether `player` is still in the round.
    pub fn is_alive(&self, player: &PlayerId) -> bool {
        self.alive.contains(player)
    }

    /// Players still in the round.
    pub fn remaining(&self) -> usize {
        self.alive.len()
    }

    /// Kills credited to `player` this round.
    pub fn kills_of(&self, player: &PlayerId) -> u32 {
        self.kills
            .as_ref()
            .and_then(|kills| kills.get(player).copied())
            .unwrap_or(0)
    }

    /// Credit one kill to `killer` and return their new tally. Always 0 when
    /// the round does not count kills.
    pub fn credit_kill(&mut self, killer: PlayerId) -> u32 {
        match self.kills.as_mut() {
            Some(kills) => {
                let tally = kills.entry(killer).or_insert(0);
                *tally += 1;
                *tally
            }
            None => 0,
        }
    }

    /// Alive set, ordered.
    pub fn alive(&self) -> impl Iterator<Item = &PlayerId> {
        self.alive.iter()
    }

    /// `Idle -> Active` with everyone in the world alive. Ignored in any
    /// other phase.
    pub fn start(&mut self, title: &str, ctx: &mut ControllerContext<'_>) -> bool {
        if self.phase != RoundPhase::Idle {
            return false;
        }

        self.alive = ctx.roster().into_iter().collect();
        self.participants = self.alive.len() as u32;
        self.elapsed_ticks = 0;
        self.winner = None;
        if let Some(kills) = self.kills.as_mut() {
            kills.clear();
        }
        self.phase = RoundPhase::Active;

        ctx.broadcast(ServerMessage::system(format!("=== {} BEGINS! ===", title.to_uppercase())));
        info!("{} started in {} with {} players", title, ctx.world, self.participants);
        true
    }

    /// Advance one tick.
    pub fn tick(&mut self, ctx: &mut ControllerContext<'_>) -> TickOutcome {
        match self.phase {
            RoundPhase::Idle => TickOutcome::Idle,
            RoundPhase::Active => {
                self.elapsed_ticks += 1;
                if self.elapsed_ticks % ELAPSED_ANNOUNCE_TICKS == 0 {
                    let minutes = self.elapsed_ticks / ELAPSED_ANNOUNCE_TICKS;
                    ctx.broadcast(ServerMessage::system(format!("Time played: {} minutes", minutes)));
                }
                self.check_end(ctx);
                TickOutcome::Idle
            }
            RoundPhase::Ended => {
                if self.return_countdown % 20 == 0 && self.return_countdown > 0 {
                    let seconds = self.return_countdown / 20;
                    ctx.broadcast(ServerMessage::display(format!(
                        "Returning to lobby in {} seconds...",
                        seconds
                    )));
                    if seconds <= 5 {
                        ctx.broadcast(ServerMessage::countdown_cue());
                    }
                }

                if self.return_countdown == 0 {
                    return TickOutcome::ReturnToLobby { winner: self.winner };
                }
                self.return_countdown -= 1;
                TickOutcome::Idle
            }
        }
    }

    /// Remove `victim` from the alive set. Returns false if they were already
    /// out.
    pub fn eliminate(&mut self, victim: PlayerId, ctx: &mut ControllerContext<'_>) -> bool {
        if !self.alive.remove(&victim) {
            return false;
        }

        let remaining = self.alive.len();
        ctx.send(&victim, ServerMessage::system("You have been eliminated!"));
        ctx.broadcast(ServerMessage::system(format!(
            "{} was eliminated! ({} remaining)",
            ctx.name_of(&victim),
            remaining
        )));
        if let Some(player) = ctx.players.get_mut(&victim) {
            player.set_game_mode(GameMode::Spectator);
        }
        info!("Player {} eliminated, {} remaining", victim.short(), remaining);

        self.check_end(ctx);
        true
    }

    /// End the round once at most one player remains.
    fn check_end(&mut self, ctx: &mut ControllerContext<'_>) {
        if self.phase == RoundPhase::Active && self.alive.len() <= 1 {
            self.end(ctx);
        }
    }

    fn end(&mut self, ctx: &mut ControllerContext<'_>) {
        self.phase = RoundPhase::Ended;
        self.return_countdown = RETURN_COUNTDOWN_TICKS;
        self.winner = if self.alive.len() == 1 {
            self.alive.iter().next().copied()
        } else {
            None
        };

        match self.winner {
            Some(winner) => {
                let name = ctx.name_of(&winner);
                info!("Round in {} won by {}", ctx.world, winner.short());
                ctx.broadcast(ServerMessage::system(format!("{} won the round!", name)));
                if self.kills.is_some() {
                    ctx.broadcast(ServerMessage::system(format!("Kills: {}", self.kills_of(&winner))));
                }
                ctx.send(&winner, ServerMessage::system("You won!"));
            }
            None => {
                info!("Round in {} ended in a draw", ctx.world);
                ctx.broadcast(ServerMessage::system("Draw! No survivors."));
            }
        }
        ctx.broadcast(ServerMessage::system(format!(
            "Back to the lobby in {} seconds...",
            RETURN_COUNTDOWN_TICKS / 20
        )));
    }

    /// Back to a pristine `Idle` round. Kill counting stays enabled.
    pub fn reset(&mut self) {
        *self = Self {
            kills: self.kills.as_ref().map(|_| BTreeMap::new()),
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::placement::Placement;
    use crate::world::instance::WorldKey;
    use crate::world::players::{PlayerDirectory, PlayerHandle};
    use tokio::sync::mpsc;

    fn setup(count: u8) -> (WorldKey, PlayerDirectory, Vec<mpsc::Receiver<ServerMessage>>) {
        let world = WorldKey::minigame("battle");
        let mut players = PlayerDirectory::new();
        let mut receivers = Vec::new();
        for i in 1..=count {
            let (tx, rx) = mpsc::channel(512);
            players.insert(PlayerHandle::new(PlayerId::new([i; 16]), format!("p{}", i), world.clone(), Placement::DEFAULT, tx));
            receivers.push(rx);
        }
        (world, players, receivers)
    }

    #[test]
    fn test_two_to_one_ends_once_with_winner() {
        let (world, mut players, _rx) = setup(2);
        let mut ctx = ControllerContext::new(&world, &mut players, None);
        let mut round = MatchRound::default();

        assert!(round.start("Battle", &mut ctx));
        assert!(!round.start("Battle", &mut ctx));
        assert_eq!(round.remaining(), 2);

        assert!(round.eliminate(PlayerId::new([2; 16]), &mut ctx));
        assert_eq!(round.phase(), RoundPhase::Ended);
        assert_eq!(round.winner(), Some(PlayerId::new([1; 16])));
        assert_eq!(round.return_countdown(), RETURN_COUNTDOWN_TICKS);

        // repeated death is a no-op and does not re-end
        assert!(!round.eliminate(PlayerId::new([2; 16]), &mut ctx));
        assert_eq!(round.return_countdown(), RETURN_COUNTDOWN_TICKS);
        assert_eq!(ctx.players.get(&PlayerId::new([2; 16])).unwrap().game_mode, GameMode::Spectator);
    }

    #[test]
    fn test_simultaneous_elimination_is_draw() {
        let (world, mut players, _rx) = setup(2);
        let mut ctx = ControllerContext::new(&world, &mut players, None);
        let mut round = MatchRound::default();
        round.start("Battle", &mut ctx);

        // both leave before the next evaluation
        round.alive.clear();
        round.tick(&mut ctx);

        assert_eq!(round.phase(), RoundPhase::Ended);
        assert_eq!(round.winner(), None);
    }

    #[test]
    fn test_return_countdown_fires_after_fixed_ticks() {
        let (world, mut players, _rx) = setup(2);
        let mut ctx = ControllerContext::new(&world, &mut players, None);
        let mut round = MatchRound::default();
        round.start("Battle", &mut ctx);
        round.eliminate(PlayerId::new([1; 16]), &mut ctx);

        for _ in 0..RETURN_COUNTDOWN_TICKS {
            assert_eq!(round.tick(&mut ctx), TickOutcome::Idle);
        }
        assert_eq!(
            round.tick(&mut ctx),
            TickOutcome::ReturnToLobby { winner: Some(PlayerId::new([2; 16])) }
        );

        round.reset();
        assert_eq!(round, MatchRound::default());
    }

    #[test]
    fn test_solo_round_ends_with_winner() {
        let (world, mut players, _rx) = setup(1);
        let mut ctx = ControllerContext::new(&world, &mut players, None);
        let mut round = MatchRound::default();
        round.start("Battle", &mut ctx);
        assert_eq!(round.phase(), RoundPhase::Active);

        round.tick(&mut ctx);
        assert_eq!(round.phase(), RoundPhase::Ended);
        assert_eq!(round.winner(), Some(PlayerId::new([1; 16])));
        assert_eq!(round.return_countdown(), RETURN_COUNTDOWN_TICKS);
    }

    #[test]
    fn test_empty_round_is_draw() {
        let world = WorldKey::minigame("battle");
        let mut players = PlayerDirectory::new();
        let mut ctx = ControllerContext::new(&world, &mut players, None);
        let mut round = MatchRound::default();
        round.start("Battle", &mut ctx);

        round.tick(&mut ctx);
        assert_eq!(round.phase(), RoundPhase::Ended);
        assert_eq!(round.winner(), None);
    }

    #[test]
    fn test_winner_announcement_reports_kills() {
        let (world, mut players, mut rx) = setup(3);
        let mut ctx = ControllerContext::new(&world, &mut players, None);
        let mut round = MatchRound::with_kill_tally();
        let (p1, p2, p3) = (PlayerId::new([1; 16]), PlayerId::new([2; 16]), PlayerId::new([3; 16]));
        round.start("Battle", &mut ctx);

        assert_eq!(round.credit_kill(p1), 1);
        round.eliminate(p2, &mut ctx);
        assert_eq!(round.credit_kill(p1), 2);
        round.eliminate(p3, &mut ctx);
        assert_eq!(round.winner(), Some(p1));

        let lines: Vec<ServerMessage> = std::iter::from_fn(|| rx[1].try_recv().ok()).collect();
        let won = lines
            .iter()
            .position(|m| *m == ServerMessage::system("p1 won the round!"))
            .unwrap();
        assert_eq!(lines[won + 1], ServerMessage::system("Kills: 2"));

        round.reset();
        assert_eq!(round, MatchRound::with_kill_tally());
        assert_eq!(round.kills_of(&p1), 0);
    }

    #[test]
    fn test_untallied_round_ignores_kills() {
        let mut round = MatchRound::default();
        assert_eq!(round.credit_kill(PlayerId::new([1; 16])), 0);
        assert_eq!(round.kills_of(&PlayerId::new([1; 16])), 0);
    }

    #[test]
    fn test_elapsed_announcement() {
        let (world, mut players, mut rx) = setup(2);
        let mut ctx = ControllerContext::new(&world, &mut players, None);
        let mut round = MatchRound::default();
        round.start("Battle", &mut ctx);
        while rx[0].try_recv().is_ok() {}

        for _ in 0..ELAPSED_ANNOUNCE_TICKS {
            round.tick(&mut ctx);
        }
        assert_eq!(round.elapsed_ticks(), ELAPSED_ANNOUNCE_TICKS);
        assert_eq!(rx[0].try_recv().unwrap(), ServerMessage::system("Time played: 1 minutes"));
    }
}
