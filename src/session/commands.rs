//! Admin Commands
//!
//! Thin text surface over the registry: `setup <variant> <max> <min>`,
//! `ready` and `status`. Each command validates its arguments and makes one
//! registry call; there is no logic of its own beyond that.

use tracing::info;

use crate::config::{SessionConfig, PLAYER_LIMIT};
use crate::game::variant::Variant;
use crate::session::registry::{RegistryError, SessionRegistry};
use crate::world::players::PlayerId;

/// Command errors, shown to the issuer.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Empty or unrecognized command.
    #[error("Usage: setup <variant> <max> <min> | ready | status")]
    Usage,

    /// A numeric argument did not parse.
    #[error("{name} must be a whole number, got {value:?}")]
    InvalidNumber {
        /// Argument name.
        name: &'static str,
        /// Raw text.
        value: String,
    },

    /// A numeric argument is outside `1..=100`.
    #[error("{name} must be between 1 and {limit}, got {value}")]
    OutOfRange {
        /// Argument name.
        name: &'static str,
        /// Parsed value.
        value: i64,
        /// Upper bound.
        limit: u32,
    },

    /// The variant cannot be hosted as a session.
    #[error("{0} is not a minigame")]
    NotPlayable(String),

    /// The session config is immutable once set.
    #[error("The session is already set up")]
    AlreadyConfigured,

    /// Only a connected player can issue this command.
    #[error("Only players can use this command")]
    PlayerOnly,

    /// The registry refused.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A parsed admin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Configure the hosted session.
    Setup {
        /// Match variant.
        variant: Variant,
        /// Lobby capacity.
        max_players: i64,
        /// Players needed to start the countdown.
        min_players: i64,
    },
    /// Toggle the issuer's readiness.
    Ready,
    /// Report the registry state.
    Status,
}

impl AdminCommand {
    /// Parse one command line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut args = line.split_whitespace();
        let command = args.next().ok_or(CommandError::Usage)?;

        let parsed = match command.to_ascii_lowercase().as_str() {
            "setup" => {
                let token = args.next().ok_or(CommandError::Usage)?;
                let variant = Variant::resolve(token);
                if !variant.is_actual_minigame() {
                    return Err(CommandError::NotPlayable(token.to_string()));
                }
                let max_players = bounded("max", args.next())?;
                let min_players = bounded("min", args.next())?;
                AdminCommand::Setup { variant, max_players, min_players }
            }
            "ready" => AdminCommand::Ready,
            "status" => AdminCommand::Status,
            _ => return Err(CommandError::Usage),
        };

        if args.next().is_some() {
            return Err(CommandError::Usage);
        }
        Ok(parsed)
    }
}

fn bounded(name: &'static str, raw: Option<&str>) -> Result<i64, CommandError> {
    let raw = raw.ok_or(CommandError::Usage)?;
    let value = raw
        .parse::<i64>()
        .map_err(|_| CommandError::InvalidNumber { name, value: raw.to_string() })?;
    if !(1..=PLAYER_LIMIT as i64).contains(&value) {
        return Err(CommandError::OutOfRange { name, value, limit: PLAYER_LIMIT });
    }
    Ok(value)
}

/// Run `command` for `issuer` (None for the console). Returns reply lines.
pub fn execute(
    registry: &mut SessionRegistry,
    issuer: Option<PlayerId>,
    command: AdminCommand,
) -> Result<Vec<String>, CommandError> {
    match command {
        AdminCommand::Setup { variant, max_players, min_players } => {
            if registry.is_configured() {
                return Err(CommandError::AlreadyConfigured);
            }
            let config = SessionConfig::new(variant, max_players, min_players);
            registry.configure(config);
            info!("Session set up by {}", issuer.map(|p| p.short()).unwrap_or_else(|| "console".to_string()));
            Ok(vec![format!(
                "Session set up: {}, {}-{} players",
                variant.display_name(),
                config.min_players_to_start(),
                config.max_players()
            )])
        }
        AdminCommand::Ready => {
            let player = issuer.ok_or(CommandError::PlayerOnly)?;
            let ready = registry.toggle_ready(&player)?;
            Ok(vec![if ready { "You are now ready" } else { "You are no longer ready" }.to_string()])
        }
        AdminCommand::Status => Ok(registry.status().lines()),
    }
}

/// Parse and run one line.
pub fn run_line(
    registry: &mut SessionRegistry,
    issuer: Option<PlayerId>,
    line: &str,
) -> Result<Vec<String>, CommandError> {
    execute(registry, issuer, AdminCommand::parse(line)?)
}
