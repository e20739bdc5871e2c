//! Spawn Assignment
//!
//! Maps a player's ordinal within a roster to a placement. Resolution order:
//! universal, then per-index, then fallback. `get` is total.

use std::collections::BTreeMap;

use crate::core::placement::Placement;
use crate::core::rng::DeterministicRng;

/// Per-variant spawn table.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnAssignment {
    universal: Option<Placement>,
    by_index: BTreeMap<usize, Placement>,
    fallback: Placement,
}

impl Default for SpawnAssignment {
    fn default() -> Self {
        Self::fallback_only(Placement::DEFAULT)
    }
}

impl SpawnAssignment {
    /// Every index lands on the same placement.
    pub const fn universal(placement: Placement) -> Self {
        Self {
            universal: Some(placement),
            by_index: BTreeMap::new(),
            fallback: placement,
        }
    }

    /// Only a fallback; every index resolves to it.
    pub const fn fallback_only(placement: Placement) -> Self {
        Self {
            universal: None,
            by_index: BTreeMap::new(),
            fallback: placement,
        }
    }

    /// Pin `index` to a placement.
    pub fn with_index(mut self, index: usize, placement: Placement) -> Self {
        self.by_index.insert(index, placement);
        self
    }

    /// Set a universal placement.
    pub fn with_universal(mut self, placement: Placement) -> Self {
        self.universal = Some(placement);
        self
    }

    /// Placement for `index`.
    pub fn get(&self, index: usize) -> Placement {
        if let Some(universal) = self.universal {
            return universal;
        }
        self.by_index.get(&index).copied().unwrap_or(self.fallback)
    }
}

/// Fixed list of placements drawn from uniformly.
#[derive(Clone, Copy, Debug)]
pub struct SpawnPool {
    placements: &'static [Placement],
}

impl SpawnPool {
    /// Pool over a static list.
    pub const fn new(placements: &'static [Placement]) -> Self {
        Self { placements }
    }

    /// Draw one placement; repeated draws may return the same entry.
    pub fn pick(&self, rng: &mut DeterministicRng) -> Option<Placement> {
        rng.choose(self.placements).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Whether `placement` is one of the entries.
    pub fn contains(&self, placement: &Placement) -> bool {
        self.placements.contains(placement)
    }
}
