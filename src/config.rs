//! Configuration
//!
//! `ServerConfig` holds process-wide knobs with environment overrides.
//! `SessionConfig` is the immutable description of the session being hosted,
//! built from the presentation layer's request with every field clamped into
//! range.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::game::variant::Variant;
use crate::network::protocol::CreateSessionRequest;

/// Default seats in the waiting room.
pub const DEFAULT_MAX_PLAYERS: u32 = 8;

/// Default participants required to start.
pub const DEFAULT_MIN_PLAYERS: u32 = 2;

/// Upper bound for both player counts.
pub const PLAYER_LIMIT: u32 = 100;

// =============================================================================
// SERVER CONFIG
// =============================================================================

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Tick rate (Hz).
    pub tick_rate: u32,
    /// Capacity of each player's outbound queue.
    pub outbox_capacity: usize,
    /// Binding store document.
    pub store_path: PathBuf,
    /// Where materialized world templates are written (None = in memory only).
    pub scratch_root: Option<PathBuf>,
    /// Settle delay before scratch data of an unloaded world is deleted.
    pub cleanup_delay: Duration,
    /// Seed for spawn-pool draws (None = seeded from the clock).
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            outbox_capacity: 64,
            store_path: PathBuf::from("minigame_bindings.json"),
            scratch_root: Some(PathBuf::from("minigame_scratch")),
            cleanup_delay: Duration::from_millis(2000),
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with `MINIGAME_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns. Malformed numbers keep
    /// the default and log a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("MINIGAME_TICK_RATE") {
            match raw.parse::<u32>() {
                Ok(rate) if rate > 0 => config.tick_rate = rate,
                _ => warn!("Ignoring MINIGAME_TICK_RATE={:?}, keeping {}", raw, config.tick_rate),
            }
        }
        if let Some(path) = lookup("MINIGAME_STORE") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("MINIGAME_SCRATCH") {
            config.scratch_root = if path.is_empty() { None } else { Some(PathBuf::from(path)) };
        }
        if let Some(raw) = lookup("MINIGAME_SEED") {
            match raw.parse::<u64>() {
                Ok(seed) => config.rng_seed = Some(seed),
                Err(_) => warn!("Ignoring MINIGAME_SEED={:?}", raw),
            }
        }

        config
    }

    /// Duration of one tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }
}

// =============================================================================
// SESSION CONFIG
// =============================================================================

/// Immutable description of the hosted session.
///
/// `min_players_to_start <= max_players` always holds; a minimum of one marks
/// a solo-eligible session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SessionConfigFields")]
pub struct SessionConfig {
    variant: Variant,
    max_players: u32,
    min_players_to_start: u32,
}

/// Wire shape of [`SessionConfig`], clamped on the way in.
#[derive(Deserialize)]
struct SessionConfigFields {
    variant: Variant,
    max_players: i64,
    min_players_to_start: i64,
}

impl From<SessionConfigFields> for SessionConfig {
    fn from(fields: SessionConfigFields) -> Self {
        Self::new(fields.variant, fields.max_players, fields.min_players_to_start)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Variant::Tumble, DEFAULT_MAX_PLAYERS as i64, DEFAULT_MIN_PLAYERS as i64)
    }
}

impl SessionConfig {
    /// Build a config, clamping both counts into range.
    pub fn new(variant: Variant, max_players: i64, min_players_to_start: i64) -> Self {
        let max = max_players.clamp(1, PLAYER_LIMIT as i64) as u32;
        let min = min_players_to_start.clamp(1, max as i64) as u32;
        Self { variant, max_players: max, min_players_to_start: min }
    }

    /// Convert a presentation-layer request. Never fails.
    pub fn from_request(request: &CreateSessionRequest) -> Self {
        let variant = Variant::resolve(request.variant_id.as_str());
        Self::new(
            variant,
            request.max_players.unwrap_or(DEFAULT_MAX_PLAYERS as i64),
            request.min_players_to_start.unwrap_or(DEFAULT_MIN_PLAYERS as i64),
        )
    }

    /// Parse a JSON request; malformed input yields the defaults.
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<CreateSessionRequest>(json) {
            Ok(request) => Self::from_request(&request),
            Err(e) => {
                warn!("Malformed session request ({}), using defaults", e);
                Self::default()
            }
        }
    }

    /// Match variant to launch.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Seats in the waiting room.
    pub fn max_players(&self) -> u32 {
        self.max_players
    }

    /// Participants required before the countdown runs.
    pub fn min_players_to_start(&self) -> u32 {
        self.min_players_to_start
    }

    /// Whether a single participant may start a round.
    pub fn is_solo(&self) -> bool {
        self.min_players_to_start == 1
    }
}
