//! Placements
//!
//! A position plus orientation in a world instance. Teleports, spawn tables
//! and the random return pool all speak in placements.

use serde::{Serialize, Deserialize};

/// Position and orientation used when moving a player.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Block-space X (centre of a block is `.5`).
    pub x: f64,
    /// Feet height.
    pub y: f64,
    /// Block-space Z.
    pub z: f64,
    /// Horizontal facing in degrees.
    pub yaw: f32,
    /// Vertical facing in degrees.
    pub pitch: f32,
}

impl Placement {
    /// Placement used when nothing more specific is configured.
    pub const DEFAULT: Placement = Placement::facing(0.5, 64.0, 0.5, 0.0);

    /// Create a placement with an explicit pitch.
    pub const fn new(x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self { x, y, z, yaw, pitch }
    }

    /// Create a level-facing placement (pitch 0).
    pub const fn facing(x: f64, y: f64, z: f64, yaw: f32) -> Self {
        Self::new(x, y, z, yaw, 0.0)
    }

    /// Chunk column containing this placement.
    pub fn chunk(&self) -> (i32, i32) {
        ((self.x.floor() as i32) >> 4, (self.z.floor() as i32) >> 4)
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::DEFAULT
    }
}
