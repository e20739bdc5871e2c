//! Game Logic Module
//!
//! Variants and their controllers. Everything here is tick-driven and free of
//! I/O; cross-world work is handed back to the registry as a tick outcome.
//!
//! ## Module Structure
//!
//! - `variant`: closed variant enumeration and total id/token resolution
//! - `controller`: capability contract and the tagged controller union
//! - `spawn`: spawn tables and random placement pools
//! - `lobby`: waiting room countdown and readiness
//! - `round`: shared Idle/Active/Ended match skeleton
//! - `battle`, `tumble`, `glide`: match variants

pub mod variant;
pub mod controller;
pub mod spawn;
pub mod lobby;
pub mod round;
pub mod battle;
pub mod tumble;
pub mod glide;

// Re-export key types
pub use variant::{Variant, VariantKey};
pub use controller::{Controller, ControllerContext, MinigameController, StateError, TickOutcome};
pub use spawn::{SpawnAssignment, SpawnPool};
pub use lobby::{LobbyController, LobbyPhase};
pub use round::{MatchRound, RoundPhase};
pub use battle::BattleController;
pub use tumble::TumbleController;
pub use glide::GlideController;
