//! World Instances
//!
//! The orchestration layer's view of one hosted world: its stable key, rule
//! table, non-player entities and streamed regions. The physics and chunk
//! simulation live in the host; this type only tracks what the lifecycle
//! manager has to create, reset and tear down.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::rules::ruleset::WorldRules;

/// Namespace of every world key this crate creates.
pub const WORLD_NAMESPACE: &str = "minigame";

/// Stable world-instance identity (`namespace:path`).
///
/// Client and server representations of the same world map to the same key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldKey(String);

impl WorldKey {
    /// Key from namespace and path.
    pub fn new(namespace: &str, path: &str) -> Self {
        Self(format!("{}:{}", namespace, path.to_ascii_lowercase()))
    }

    /// Key in the crate's own namespace.
    pub fn minigame(path: &str) -> Self {
        Self::new(WORLD_NAMESPACE, path)
    }

    /// Key as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Region streaming state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionState {
    /// Regions stream in and out of memory.
    Open,
    /// Streaming shut down; `flushed` records whether anything hit disk.
    Closed {
        /// Whether region data was written before closing.
        flushed: bool,
    },
}

/// One live world instance.
#[derive(Debug)]
pub struct WorldInstance {
    key: WorldKey,
    name: String,
    /// Rule table.
    pub rules: WorldRules,
    /// Whether the day/night clock advances.
    pub ticks_time: bool,
    /// Whether ambient mob spawners run.
    pub ambient_spawning: bool,
    entities: Vec<String>,
    loaded_regions: BTreeSet<(i32, i32)>,
    region_state: RegionState,
    region_resets: u32,
    scratch_dir: Option<PathBuf>,
}

impl WorldInstance {
    /// Fresh instance with default rules and nothing loaded.
    pub fn new(key: WorldKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            rules: WorldRules::default(),
            ticks_time: true,
            ambient_spawning: true,
            entities: Vec::new(),
            loaded_regions: BTreeSet::new(),
            region_state: RegionState::Open,
            region_resets: 0,
            scratch_dir: None,
        }
    }

    /// Attach the on-disk scratch copy this instance was built from.
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = Some(dir);
        self
    }

    /// Seed non-player entities.
    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities.extend(entities.into_iter().map(Into::into));
        self
    }

    /// Stable key.
    pub fn key(&self) -> &WorldKey {
        &self.key
    }

    /// Logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scratch directory backing this instance, if any.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Non-player entity count.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Remove every non-player entity.
    pub fn discard_entities(&mut self) -> usize {
        let count = self.entities.len();
        self.entities.clear();
        count
    }

    /// Stream a region into memory.
    pub fn load_region(&mut self, chunk_x: i32, chunk_z: i32) {
        if self.region_state == RegionState::Open {
            self.loaded_regions.insert((chunk_x, chunk_z));
        }
    }

    /// Regions currently held in memory.
    pub fn loaded_region_count(&self) -> usize {
        self.loaded_regions.len()
    }

    /// Drop in-memory region state so the next access reloads it fresh.
    pub fn discard_regions(&mut self) {
        self.loaded_regions.clear();
        self.region_resets += 1;
    }

    /// How many times region state was discarded.
    pub fn region_resets(&self) -> u32 {
        self.region_resets
    }

    /// Shut region streaming down without writing anything to storage.
    pub fn close_regions_without_flush(&mut self) {
        self.loaded_regions.clear();
        self.region_state = RegionState::Closed { flushed: false };
    }

    /// Current region streaming state.
    pub fn region_state(&self) -> RegionState {
        self.region_state
    }
}
