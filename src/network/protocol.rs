//! Protocol Messages
//!
//! Messages the orchestration layer pushes to participants, plus the
//! session-creation request the presentation layer submits. Encoding on the
//! wire belongs to the host; everything here is plain serde.

use serde::{Serialize, Deserialize};

use crate::core::placement::Placement;
use crate::session::binding::BindingSnapshot;
use crate::world::players::GameMode;

// =============================================================================
// PRESENTATION -> SERVER
// =============================================================================

/// Session-creation request submitted by the configuration screens.
///
/// Missing or out-of-range numbers are clamped when converted into a
/// [`SessionConfig`](crate::config::SessionConfig); an unknown variant id
/// resolves to `NONE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Variant token (`"battle"`, `"tumble"`, ...) or numeric id as text.
    pub variant_id: String,
    /// Seats in the waiting room.
    #[serde(default)]
    pub max_players: Option<i64>,
    /// Participants required before the countdown runs.
    #[serde(default)]
    pub min_players_to_start: Option<i64>,
}

// =============================================================================
// SERVER -> PLAYER MESSAGES
// =============================================================================

/// Sound cues the client knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    /// Tick of the last five seconds of any countdown.
    LobbyCountdown,
}

/// Messages sent from the server to one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Short status line shown above the hotbar.
    DisplayText {
        /// Rendered text.
        text: String,
    },

    /// Chat-style system message.
    SystemMessage {
        /// Rendered text.
        text: String,
    },

    /// Play a sound cue.
    PlaySound {
        /// Which cue.
        cue: SoundCue,
        /// Volume multiplier.
        volume: f32,
    },

    /// The player was moved.
    Teleported {
        /// Destination world instance key.
        world: String,
        /// Destination placement.
        placement: Placement,
    },

    /// The player's game mode changed.
    GameModeChanged {
        /// New mode.
        mode: GameMode,
    },

    /// Full state of the Binding of the player's current world.
    SyncState {
        /// World instance key.
        world: String,
        /// Serialized binding.
        snapshot: BindingSnapshot,
        /// Hex SHA-256 of the snapshot, for stale-state detection.
        digest: String,
    },

    /// A join or action was refused.
    Refused {
        /// Human-readable reason.
        reason: String,
    },
}

impl ServerMessage {
    /// Build a [`ServerMessage::DisplayText`].
    pub fn display(text: impl Into<String>) -> Self {
        ServerMessage::DisplayText { text: text.into() }
    }

    /// Build a [`ServerMessage::SystemMessage`].
    pub fn system(text: impl Into<String>) -> Self {
        ServerMessage::SystemMessage { text: text.into() }
    }

    /// Countdown cue at full volume.
    pub fn countdown_cue() -> Self {
        ServerMessage::PlaySound { cue: SoundCue::LobbyCountdown, volume: 1.0 }
    }
}
