//! World Rule Overrides
//!
//! `WorldRules` is the full rule table a world instance carries. A `RuleSet`
//! is the sparse override a variant applies on activation: only entries that
//! were explicitly set are written, booleans first, then integers.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

// =============================================================================
// RULE NAMES
// =============================================================================

/// Boolean world rules understood by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BoolRule {
    DoMobSpawning,
    DoDaylightCycle,
    DoWeatherCycle,
    DoFireTick,
    MobGriefing,
    KeepInventory,
    AnnounceAdvancements,
    DoInsomnia,
    DoPatrolSpawning,
    DoTraderSpawning,
    DoWardenSpawning,
    DisableRaids,
    ShowDeathMessages,
    NaturalRegeneration,
    FallDamage,
    FireDamage,
    FreezeDamage,
    DrowningDamage,
    DoImmediateRespawn,
    ForgiveDeadPlayers,
    UniversalAnger,
    BlockExplosionDropDecay,
    MobExplosionDropDecay,
    TntExplosionDropDecay,
    DoTileDrops,
    DoEntityDrops,
    DoLimitedCrafting,
    ReducedDebugInfo,
    SendCommandFeedback,
    LogAdminCommands,
    CommandBlockOutput,
    SpectatorsGenerateChunks,
}

impl BoolRule {
    /// Every boolean rule, in application order.
    pub const ALL: [BoolRule; 32] = [
        BoolRule::DoMobSpawning,
        BoolRule::DoDaylightCycle,
        BoolRule::DoWeatherCycle,
        BoolRule::DoFireTick,
        BoolRule::MobGriefing,
        BoolRule::KeepInventory,
        BoolRule::AnnounceAdvancements,
        BoolRule::DoInsomnia,
        BoolRule::DoPatrolSpawning,
        BoolRule::DoTraderSpawning,
        BoolRule::DoWardenSpawning,
        BoolRule::DisableRaids,
        BoolRule::ShowDeathMessages,
        BoolRule::NaturalRegeneration,
        BoolRule::FallDamage,
        BoolRule::FireDamage,
        BoolRule::FreezeDamage,
        BoolRule::DrowningDamage,
        BoolRule::DoImmediateRespawn,
        BoolRule::ForgiveDeadPlayers,
        BoolRule::UniversalAnger,
        BoolRule::BlockExplosionDropDecay,
        BoolRule::MobExplosionDropDecay,
        BoolRule::TntExplosionDropDecay,
        BoolRule::DoTileDrops,
        BoolRule::DoEntityDrops,
        BoolRule::DoLimitedCrafting,
        BoolRule::ReducedDebugInfo,
        BoolRule::SendCommandFeedback,
        BoolRule::LogAdminCommands,
        BoolRule::CommandBlockOutput,
        BoolRule::SpectatorsGenerateChunks,
    ];

    /// Host value before any override.
    pub const fn host_default(self) -> bool {
        !matches!(
            self,
            BoolRule::DisableRaids
                | BoolRule::ReducedDebugInfo
                | BoolRule::DoImmediateRespawn
                | BoolRule::UniversalAnger
                | BoolRule::DoLimitedCrafting
                | BoolRule::TntExplosionDropDecay
        )
    }
}

/// Integer world rules understood by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum IntRule {
    RandomTickSpeed,
    SpawnRadius,
    MaxEntityCramming,
    MaxCommandChainLength,
    PlayersSleepingPercentage,
}

impl IntRule {
    /// Every integer rule, in application order.
    pub const ALL: [IntRule; 5] = [
        IntRule::RandomTickSpeed,
        IntRule::SpawnRadius,
        IntRule::MaxEntityCramming,
        IntRule::MaxCommandChainLength,
        IntRule::PlayersSleepingPercentage,
    ];

    /// Host value before any override.
    pub const fn host_default(self) -> i32 {
        match self {
            IntRule::RandomTickSpeed => 3,
            IntRule::SpawnRadius => 10,
            IntRule::MaxEntityCramming => 24,
            IntRule::MaxCommandChainLength => 65536,
            IntRule::PlayersSleepingPercentage => 100,
        }
    }
}

// =============================================================================
// WORLD RULE TABLE
// =============================================================================

/// Complete rule table of one world instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldRules {
    bools: BTreeMap<BoolRule, bool>,
    ints: BTreeMap<IntRule, i32>,
    writes: u64,
}

impl Default for WorldRules {
    fn default() -> Self {
        Self {
            bools: BoolRule::ALL.iter().map(|r| (*r, r.host_default())).collect(),
            ints: IntRule::ALL.iter().map(|r| (*r, r.host_default())).collect(),
            writes: 0,
        }
    }
}

impl WorldRules {
    /// Current boolean value.
    pub fn get_bool(&self, rule: BoolRule) -> bool {
        self.bools.get(&rule).copied().unwrap_or(rule.host_default())
    }

    /// Current integer value.
    pub fn get_int(&self, rule: IntRule) -> i32 {
        self.ints.get(&rule).copied().unwrap_or(rule.host_default())
    }

    /// Set a boolean rule.
    pub fn set_bool(&mut self, rule: BoolRule, value: bool) {
        self.bools.insert(rule, value);
        self.writes += 1;
    }

    /// Set an integer rule.
    pub fn set_int(&mut self, rule: IntRule, value: i32) {
        self.ints.insert(rule, value);
        self.writes += 1;
    }

    /// Total number of rule writes since creation.
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

// =============================================================================
// SPARSE OVERRIDES
// =============================================================================

/// Sparse override table; absent entries leave the world untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    bools: BTreeMap<BoolRule, bool>,
    ints: BTreeMap<IntRule, i32>,
}

impl RuleSet {
    /// Empty override table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a boolean rule.
    pub fn with_bool(mut self, rule: BoolRule, value: bool) -> Self {
        self.bools.insert(rule, value);
        self
    }

    /// Override an integer rule.
    pub fn with_int(mut self, rule: IntRule, value: i32) -> Self {
        self.ints.insert(rule, value);
        self
    }

    /// Explicit boolean override, if any.
    pub fn bool_override(&self, rule: BoolRule) -> Option<bool> {
        self.bools.get(&rule).copied()
    }

    /// Explicit integer override, if any.
    pub fn int_override(&self, rule: IntRule) -> Option<i32> {
        self.ints.get(&rule).copied()
    }

    /// Number of explicit overrides.
    pub fn len(&self) -> usize {
        self.bools.len() + self.ints.len()
    }

    /// Whether nothing is overridden.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every explicit override into `rules`, booleans then integers.
    pub fn apply(&self, rules: &mut WorldRules) {
        for (rule, value) in &self.bools {
            rules.set_bool(*rule, *value);
        }
        for (rule, value) in &self.ints {
            rules.set_int(*rule, *value);
        }
    }
}

// =============================================================================
// PRESETS
// =============================================================================

/// Spawning, cycles and griefing off: the part every preset shares.
fn quiet_world() -> RuleSet {
    RuleSet::new()
        .with_bool(BoolRule::DoMobSpawning, false)
        .with_bool(BoolRule::DoDaylightCycle, false)
        .with_bool(BoolRule::DoWeatherCycle, false)
        .with_bool(BoolRule::DoFireTick, false)
        .with_bool(BoolRule::MobGriefing, false)
        .with_bool(BoolRule::AnnounceAdvancements, false)
        .with_bool(BoolRule::DoInsomnia, false)
        .with_bool(BoolRule::DoPatrolSpawning, false)
        .with_bool(BoolRule::DoTraderSpawning, false)
        .with_bool(BoolRule::DoWardenSpawning, false)
        .with_bool(BoolRule::DisableRaids, true)
}

fn with_environmental_damage(rules: RuleSet, enabled: bool) -> RuleSet {
    rules
        .with_bool(BoolRule::FallDamage, enabled)
        .with_bool(BoolRule::FireDamage, enabled)
        .with_bool(BoolRule::FreezeDamage, enabled)
        .with_bool(BoolRule::DrowningDamage, enabled)
}

/// Waiting room: nothing hurts, inventories are kept, no death spam.
pub fn lobby() -> RuleSet {
    let rules = quiet_world()
        .with_bool(BoolRule::KeepInventory, true)
        .with_bool(BoolRule::ShowDeathMessages, false)
        .with_bool(BoolRule::NaturalRegeneration, true);
    with_environmental_damage(rules, false)
}

/// Last-one-standing arena: full damage, no regeneration, drops on death.
pub fn battle() -> RuleSet {
    let rules = quiet_world()
        .with_bool(BoolRule::KeepInventory, false)
        .with_bool(BoolRule::ShowDeathMessages, true)
        .with_bool(BoolRule::NaturalRegeneration, false);
    with_environmental_damage(rules, true)
}

/// Tumble plays under the battle rules.
pub fn tumble() -> RuleSet {
    battle()
}

/// Gliding course: only the void can end a run.
pub fn glide() -> RuleSet {
    let rules = quiet_world()
        .with_bool(BoolRule::KeepInventory, true)
        .with_bool(BoolRule::ShowDeathMessages, true)
        .with_bool(BoolRule::NaturalRegeneration, true);
    with_environmental_damage(rules, false)
}
