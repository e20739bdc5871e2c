//! # Minigame Host
//!
//! Session orchestration for short multiplayer minigames: a lobby with a
//! start countdown and readiness, match variants that run in throwaway arena
//! worlds, and the plumbing that moves players between them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MINIGAME HOST                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── placement.rs- Position plus orientation                 │
//! │  ├── region.rs   - Inclusive chunk areas                     │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - Snapshot digests                          │
//! │                                                              │
//! │  game/           - Variants and controllers (no I/O)         │
//! │  ├── variant.rs  - Closed variant set, total resolution      │
//! │  ├── controller.rs- Capability contract, tagged union        │
//! │  ├── spawn.rs    - Spawn tables and random pools             │
//! │  ├── lobby.rs    - Countdown and readiness                   │
//! │  ├── round.rs    - Idle/Active/Ended match skeleton          │
//! │  └── battle.rs, tumble.rs, glide.rs                          │
//! │                                                              │
//! │  rules/          - Permission sets and rulesets              │
//! │  world/          - Instances, players, bootstrap, lifecycle  │
//! │                                                              │
//! │  session/        - Orchestration                             │
//! │  ├── binding.rs  - World-instance bindings                   │
//! │  ├── store.rs    - Durable binding store                     │
//! │  ├── registry.rs - Launch and return sequences               │
//! │  ├── driver.rs   - Fixed-rate tick task                      │
//! │  └── commands.rs - Admin surface                             │
//! │                                                              │
//! │  network/        - Outbound messages, session requests       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! Every controller tick, world load and Binding change happens on the tick
//! driver's task. The only other work is deferred deletion of scratch world
//! data, spawned onto the runtime after a settle delay.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod rules;
pub mod session;
pub mod world;

// Re-export commonly used types
pub use config::{ServerConfig, SessionConfig};
pub use crate::core::placement::Placement;
pub use crate::core::rng::DeterministicRng;
pub use game::controller::{Controller, MinigameController, TickOutcome};
pub use game::variant::Variant;
pub use session::driver::TickDriver;
pub use session::registry::{PlayerAction, SessionRegistry};
pub use world::instance::WorldKey;
pub use world::players::PlayerId;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
