//! World-Instance Bindings
//!
//! A Binding ties one world instance (by stable key) to its active variant
//! and controller. The table owns every Binding plus the durable store;
//! `mark_dirty` is the one explicit place where state is persisted and
//! broadcast.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::hash::{StateHash, StateHasher};
use crate::game::controller::{Controller, MinigameController, NoneController, StateError};
use crate::game::variant::Variant;
use crate::network::protocol::ServerMessage;
use crate::session::store::{BindingStore, StoreError};
use crate::world::instance::WorldKey;
use crate::world::players::{PlayerDirectory, PlayerId};

static NORMAL_PLAY: NoneController = NoneController;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Persisted and synchronized form of a Binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingSnapshot {
    /// Numeric id of the active variant.
    pub active_variant_id: i64,
    /// Opaque controller bytes.
    pub controller_state: Vec<u8>,
}

impl BindingSnapshot {
    /// SHA-256 over the variant id and controller bytes.
    pub fn digest(&self) -> StateHash {
        let mut hasher = StateHasher::for_binding_snapshot();
        hasher.update_u64(self.active_variant_id as u64);
        hasher.update_bytes(&self.controller_state);
        hasher.finalize()
    }
}

// =============================================================================
// BINDING
// =============================================================================

/// One world instance's active variant and controller.
#[derive(Debug, Clone)]
pub struct Binding {
    key: WorldKey,
    controller: Controller,
}

impl Binding {
    /// Binding with no minigame active.
    pub fn new(key: WorldKey) -> Self {
        Self { key, controller: Controller::default() }
    }

    /// Rebuild from a stored snapshot. An unknown variant id, or state the
    /// variant cannot decode, yields `NONE` with an empty controller.
    pub fn restore(key: WorldKey, snapshot: &BindingSnapshot) -> Self {
        let variant = Variant::resolve(snapshot.active_variant_id);
        let mut controller = variant.new_controller();
        if let Err(e) = controller.as_dyn_mut().deserialize_state(&snapshot.controller_state) {
            warn!("Discarding stored {} state for {}: {}", variant.display_name(), key, e);
            controller = Controller::default();
        }
        Self { key, controller }
    }

    /// World key.
    pub fn key(&self) -> &WorldKey {
        &self.key
    }

    /// Active variant.
    pub fn active_variant(&self) -> Variant {
        self.controller.variant()
    }

    /// Active controller.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Active controller, mutably.
    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// Capability surface of the active controller.
    pub fn capabilities(&self) -> &dyn MinigameController {
        self.controller.as_dyn()
    }

    /// Replace variant and controller in one step. Prior state is dropped.
    pub fn activate(&mut self, variant: Variant) -> &mut Controller {
        self.controller = variant.new_controller();
        &mut self.controller
    }

    /// Serialize into a snapshot.
    pub fn snapshot(&self) -> Result<BindingSnapshot, StateError> {
        Ok(BindingSnapshot {
            active_variant_id: self.active_variant().id(),
            controller_state: self.controller.as_dyn().serialize_state()?,
        })
    }

    /// Whether players can damage each other.
    pub fn pvp_enabled(&self) -> bool {
        self.capabilities().pvp_enabled()
    }

    /// Whether new participants may join.
    pub fn can_accept_new_players(&self) -> bool {
        self.capabilities().can_accept_new_players()
    }

    /// Whether the reduced inventory is shown.
    pub fn reduced_inventory(&self) -> bool {
        self.capabilities().reduced_inventory()
    }
}

// =============================================================================
// TABLE
// =============================================================================

/// All Bindings, keyed by world identity, plus their durable store.
pub struct BindingTable {
    bindings: BTreeMap<WorldKey, Binding>,
    store: Box<dyn BindingStore>,
}

impl BindingTable {
    /// Empty table over `store`.
    pub fn new(store: Box<dyn BindingStore>) -> Self {
        Self { bindings: BTreeMap::new(), store }
    }

    /// Binding for `key`, if one exists.
    pub fn get(&self, key: &WorldKey) -> Option<&Binding> {
        self.bindings.get(key)
    }

    /// Binding for `key`, mutably.
    pub fn get_mut(&mut self, key: &WorldKey) -> Option<&mut Binding> {
        self.bindings.get_mut(key)
    }

    /// Capabilities for `key`; worlds without a Binding behave as normal play.
    pub fn capabilities(&self, key: &WorldKey) -> &dyn MinigameController {
        match self.bindings.get(key) {
            Some(binding) => binding.capabilities(),
            None => &NORMAL_PLAY,
        }
    }

    /// Active variant for `key` (`NONE` when unbound).
    pub fn active_variant(&self, key: &WorldKey) -> Variant {
        self.bindings.get(key).map(Binding::active_variant).unwrap_or(Variant::None)
    }

    /// Binding for `key`, created on first use from the stored record.
    pub fn ensure(&mut self, key: &WorldKey) -> &mut Binding {
        let store = self.store.as_ref();
        self.bindings
            .entry(key.clone())
            .or_insert_with(|| restore_or_new(store, key))
    }

    /// Swap in `variant` for `key`, then persist and broadcast.
    pub fn activate(&mut self, key: &WorldKey, variant: Variant, players: &PlayerDirectory) -> &mut Controller {
        self.ensure(key).activate(variant);
        debug!("Activated {} on {}", variant.display_name(), key);
        // failure is logged inside; in-memory state stays authoritative
        let _ = self.mark_dirty(key, players);
        self.ensure(key).controller_mut()
    }

    /// Persist the Binding for `key` and push it to everyone in that world.
    ///
    /// A store failure is logged and returned; the broadcast still happens and
    /// the next call retries the write.
    pub fn mark_dirty(&mut self, key: &WorldKey, players: &PlayerDirectory) -> Result<(), StoreError> {
        let Some(binding) = self.bindings.get(key) else {
            return Ok(());
        };
        let snapshot = match binding.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Could not serialize binding {}: {}", key, e);
                return Err(e.into());
            }
        };

        let persisted = self.store.save(key, &snapshot);
        if let Err(e) = &persisted {
            warn!("Persisting binding {} failed, will retry on next change: {}", key, e);
        }

        players.broadcast(key, &sync_message(key, snapshot));
        persisted
    }

    /// Send the current state of `key` to one player (used on join).
    pub fn sync_to(&self, key: &WorldKey, player: &PlayerId, players: &PlayerDirectory) -> bool {
        let Some(binding) = self.bindings.get(key) else {
            return false;
        };
        match binding.snapshot() {
            Ok(snapshot) => players.send(player, sync_message(key, snapshot)),
            Err(e) => {
                warn!("Could not serialize binding {} for {}: {}", key, player.short(), e);
                false
            }
        }
    }

    /// Number of Bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn restore_or_new(store: &dyn BindingStore, key: &WorldKey) -> Binding {
    match store.load(key) {
        Ok(Some(snapshot)) => {
            debug!("Restored binding {} as variant {}", key, snapshot.active_variant_id);
            Binding::restore(key.clone(), &snapshot)
        }
        Ok(None) => Binding::new(key.clone()),
        Err(e) => {
            warn!("Could not read stored binding for {}: {}", key, e);
            Binding::new(key.clone())
        }
    }
}

fn sync_message(key: &WorldKey, snapshot: BindingSnapshot) -> ServerMessage {
    let digest = hex::encode(snapshot.digest());
    ServerMessage::SyncState {
        world: key.to_string(),
        snapshot,
        digest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::placement::Placement;
    use crate::game::controller::ControllerContext;
    use crate::session::store::MemoryStore;
    use crate::world::players::PlayerHandle;
    use tokio::sync::mpsc;

    fn lobby_key() -> WorldKey {
        WorldKey::minigame("lobby")
    }

    #[test]
    fn test_activate_swaps_and_broadcasts() {
        let store = MemoryStore::new();
        let mut table = BindingTable::new(Box::new(store.clone()));
        let mut players = PlayerDirectory::new();
        let (tx, mut rx) = mpsc::channel(8);
        players.insert(PlayerHandle::new(PlayerId::new([1; 16]), "p1", lobby_key(), Placement::DEFAULT, tx));

        assert_eq!(table.active_variant(&lobby_key()), Variant::None);
        let controller = table.activate(&lobby_key(), Variant::Lobby, &players);
        assert_eq!(controller.variant(), Variant::Lobby);

        let record = store.record(&lobby_key()).unwrap();
        assert_eq!(record.active_variant_id, 99);
        match rx.try_recv().unwrap() {
            ServerMessage::SyncState { world, snapshot, digest } => {
                assert_eq!(world, "minigame:lobby");
                assert_eq!(snapshot, record);
                assert_eq!(digest, hex::encode(record.digest()));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_persist_failure_keeps_memory_and_retries() {
        let store = MemoryStore::new();
        let mut table = BindingTable::new(Box::new(store.clone()));
        let players = PlayerDirectory::new();
        let key = WorldKey::minigame("battle");

        store.set_fail_writes(true);
        table.activate(&key, Variant::Battle, &players);
        assert_eq!(table.active_variant(&key), Variant::Battle);
        assert!(store.record(&key).is_none());
        assert!(table.mark_dirty(&key, &players).is_err());

        store.set_fail_writes(false);
        assert!(table.mark_dirty(&key, &players).is_ok());
        assert_eq!(store.record(&key).unwrap().active_variant_id, 1);
    }

    #[test]
    fn test_restore_on_first_use() {
        let store = MemoryStore::new();
        let key = WorldKey::minigame("battle");

        // a battle mid-round, persisted by an earlier process
        let mut players = PlayerDirectory::new();
        let (tx, _rx) = mpsc::channel(64);
        for i in 1..=3u8 {
            players.insert(PlayerHandle::new(PlayerId::new([i; 16]), "p", key.clone(), Placement::DEFAULT, tx.clone()));
        }
        let mut original = Binding::new(key.clone());
        original.activate(Variant::Battle);
        {
            let mut ctx = ControllerContext::new(&key, &mut players, None);
            let controller = original.controller_mut().as_dyn_mut();
            controller.start(&mut ctx);
            controller.on_player_kill(PlayerId::new([1; 16]), PlayerId::new([2; 16]), &mut ctx);
        }
        store.insert(key.clone(), original.snapshot().unwrap());

        let mut table = BindingTable::new(Box::new(store));
        let restored = table.ensure(&key);
        let battle = restored.controller().as_battle().unwrap();
        assert_eq!(battle.kills_of(&PlayerId::new([1; 16])), 1);
        assert_eq!(battle.remaining_players(), 2);
    }

    #[test]
    fn test_unknown_variant_restores_as_none() {
        let snapshot = BindingSnapshot { active_variant_id: 42, controller_state: vec![1, 2, 3] };
        let binding = Binding::restore(lobby_key(), &snapshot);
        assert_eq!(binding.active_variant(), Variant::None);

        let corrupt = BindingSnapshot { active_variant_id: 1, controller_state: vec![0xff] };
        assert_eq!(Binding::restore(lobby_key(), &corrupt).active_variant(), Variant::None);
    }

    #[test]
    fn test_unbound_world_is_normal_play() {
        let table = BindingTable::new(Box::new(MemoryStore::new()));
        let caps = table.capabilities(&WorldKey::minigame("elsewhere"));
        assert!(caps.pvp_enabled());
        assert!(caps.block_place().is_allowed("stone"));
    }

    #[test]
    fn test_snapshot_round_trip_for_stateless_variants() {
        for variant in [Variant::Lobby, Variant::Tumble, Variant::Glide] {
            let mut binding = Binding::new(lobby_key());
            binding.activate(variant);
            let snapshot = binding.snapshot().unwrap();
            assert!(snapshot.controller_state.is_empty());
            assert_eq!(Binding::restore(lobby_key(), &snapshot).active_variant(), variant);
        }
    }
}
