//! World-Instance Lifecycle Manager
//!
//! Owns the `logical name -> world key -> assigned variant` registry and the
//! live-instance table. Loading builds an instance from its template and
//! activates the assigned variant; unloading tears it down without ever
//! writing region data, then deletes its scratch copy after a settle delay
//! on a background task.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::game::controller::Controller;
use crate::game::variant::Variant;
use crate::session::binding::BindingTable;
use crate::world::bootstrap::{WorldBootstrap, WorldError};
use crate::world::instance::{WorldInstance, WorldKey};
use crate::world::players::PlayerDirectory;

/// A registered logical world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldRegistration {
    /// Stable key.
    pub key: WorldKey,
    /// Variant activated whenever the world is loaded.
    pub variant: Variant,
}

/// Registry and live-instance table for hosted worlds.
pub struct WorldLifecycleManager {
    registered: BTreeMap<String, WorldRegistration>,
    live: BTreeMap<WorldKey, WorldInstance>,
    bootstrap: Box<dyn WorldBootstrap>,
    settle_delay: Duration,
    pending_cleanups: Vec<JoinHandle<()>>,
    /// Cleanups scheduled with no runtime available.
    detached_cleanups: Vec<thread::JoinHandle<()>>,
}

impl WorldLifecycleManager {
    /// Manager producing worlds through `bootstrap`.
    pub fn new(bootstrap: Box<dyn WorldBootstrap>, settle_delay: Duration) -> Self {
        Self {
            registered: BTreeMap::new(),
            live: BTreeMap::new(),
            bootstrap,
            settle_delay,
            pending_cleanups: Vec::new(),
            detached_cleanups: Vec::new(),
        }
    }

    /// Register `name` under `key` with its assigned variant.
    pub fn register(&mut self, name: &str, key: WorldKey, variant: Variant) {
        self.registered
            .insert(name.to_ascii_lowercase(), WorldRegistration { key, variant });
    }

    /// Registration for `name`.
    pub fn registration(&self, name: &str) -> Option<&WorldRegistration> {
        self.registered.get(&name.to_ascii_lowercase())
    }

    /// Key registered for `name`.
    pub fn key_for(&self, name: &str) -> Option<&WorldKey> {
        self.registration(name).map(|r| &r.key)
    }

    /// Whether `key` is live.
    pub fn is_resident(&self, key: &WorldKey) -> bool {
        self.live.contains_key(key)
    }

    /// Live instance for `key`.
    pub fn instance(&self, key: &WorldKey) -> Option<&WorldInstance> {
        self.live.get(key)
    }

    /// Live instance for `key`, mutably.
    pub fn instance_mut(&mut self, key: &WorldKey) -> Option<&mut WorldInstance> {
        self.live.get_mut(key)
    }

    /// Keys of every live instance, in key order.
    pub fn resident_keys(&self) -> Vec<WorldKey> {
        self.live.keys().cloned().collect()
    }

    /// Activate `variant` on the Binding for `key` and apply its ruleset to
    /// the live instance.
    pub fn activate<'t>(
        &mut self,
        key: &WorldKey,
        variant: Variant,
        bindings: &'t mut BindingTable,
        players: &PlayerDirectory,
    ) -> &'t mut Controller {
        let controller = bindings.activate(key, variant, players);
        if let (Some(rules), Some(world)) = (controller.as_dyn().ruleset(), self.live.get_mut(key)) {
            rules.apply(&mut world.rules);
            debug!("Applied {} rule overrides to {}", rules.len(), key);
        }
        controller
    }

    /// Make `name` resident with its registered variant active.
    ///
    /// Construction failures are logged and yield `None`.
    pub fn load(&mut self, name: &str, bindings: &mut BindingTable, players: &PlayerDirectory) -> Option<WorldKey> {
        let Some(WorldRegistration { key, variant }) = self.registration(name).cloned() else {
            warn!("Cannot load {}: {}", name, WorldError::Unregistered(name.to_string()));
            return None;
        };

        if self.live.contains_key(&key) {
            if bindings.active_variant(&key) != variant {
                self.activate(&key, variant, bindings, players);
            }
            return Some(key);
        }

        let mut world = match self.bootstrap.produce(name, &key) {
            Ok(world) => world,
            Err(e) => {
                warn!("Failed to create world {}: {}", name, e);
                return None;
            }
        };
        world.ticks_time = false;
        world.ambient_spawning = false;
        self.live.insert(key.clone(), world);

        self.activate(&key, variant, bindings, players);
        info!("Loaded world {} as {}", key, variant.display_name());
        Some(key)
    }

    /// Tear `name` down. Refused while any participant is inside.
    pub fn unload(&mut self, name: &str, players: &PlayerDirectory) -> Result<(), WorldError> {
        let key = self
            .key_for(name)
            .cloned()
            .ok_or_else(|| WorldError::Unregistered(name.to_string()))?;

        let present = players.count_in(&key);
        if present > 0 {
            let err = WorldError::Occupied { name: name.to_string(), players: present };
            warn!("Refusing to unload: {}", err);
            return Err(err);
        }

        let Some(world) = self.live.get_mut(&key) else {
            return Err(WorldError::NotLoaded(name.to_string()));
        };
        let discarded = world.discard_entities();
        world.close_regions_without_flush();

        if let Some(world) = self.live.remove(&key) {
            if let Some(dir) = world.scratch_dir() {
                self.schedule_cleanup(dir.to_path_buf());
            }
        }
        info!("Unloaded world {} ({} entities discarded)", key, discarded);
        Ok(())
    }

    fn schedule_cleanup(&mut self, dir: PathBuf) {
        self.pending_cleanups.retain(|task| !task.is_finished());
        self.detached_cleanups.retain(|task| !task.is_finished());

        let settle = self.settle_delay;
        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(async move {
                    tokio::time::sleep(settle).await;
                    match tokio::fs::remove_dir_all(&dir).await {
                        Ok(()) => debug!("Removed scratch data {}", dir.display()),
                        Err(e) => warn!("Failed to remove scratch data {}: {}", dir.display(), e),
                    }
                });
                self.pending_cleanups.push(task);
            }
            Err(_) => {
                let task = thread::spawn(move || {
                    thread::sleep(settle);
                    match std::fs::remove_dir_all(&dir) {
                        Ok(()) => debug!("Removed scratch data {}", dir.display()),
                        Err(e) => warn!("Failed to remove scratch data {}: {}", dir.display(), e),
                    }
                });
                self.detached_cleanups.push(task);
            }
        }
    }

    /// Cleanups still queued or running.
    pub fn pending_cleanups(&self) -> usize {
        let tasks = self.pending_cleanups.iter().filter(|task| !task.is_finished()).count();
        let threads = self.detached_cleanups.iter().filter(|task| !task.is_finished()).count();
        tasks + threads
    }

    /// Wait for every queued cleanup to finish.
    pub async fn flush_cleanups(&mut self) {
        for task in std::mem::take(&mut self.pending_cleanups) {
            if let Err(e) = task.await {
                warn!("Scratch cleanup task failed: {}", e);
            }
        }

        let threads = std::mem::take(&mut self.detached_cleanups);
        if threads.is_empty() {
            return;
        }
        let joined = tokio::task::spawn_blocking(move || {
            threads.into_iter().map(|task| task.join()).filter(|r| r.is_err()).count()
        })
        .await;
        match joined {
            Ok(0) => {}
            Ok(failed) => warn!("{} scratch cleanup threads panicked", failed),
            Err(e) => warn!("Scratch cleanup join failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::placement::Placement;
    use crate::rules::ruleset::{BoolRule, IntRule};
    use crate::session::store::MemoryStore;
    use crate::world::bootstrap::TemplateBootstrap;
    use crate::world::instance::RegionState;
    use crate::world::players::{PlayerHandle, PlayerId};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn manager(bootstrap: TemplateBootstrap) -> WorldLifecycleManager {
        let mut lifecycle = WorldLifecycleManager::new(Box::new(bootstrap), Duration::ZERO);
        lifecycle.register("lobby", WorldKey::minigame("lobby"), Variant::Lobby);
        lifecycle.register("battle", WorldKey::minigame("battle"), Variant::Battle);
        lifecycle
    }

    #[test]
    fn test_load_builds_quiet_world_with_ruleset() {
        let mut lifecycle = manager(TemplateBootstrap::standard());
        let mut bindings = BindingTable::new(Box::new(MemoryStore::new()));
        let players = PlayerDirectory::new();

        let key = lifecycle.load("battle", &mut bindings, &players).unwrap();
        let world = lifecycle.instance(&key).unwrap();

        assert!(!world.ticks_time);
        assert!(!world.ambient_spawning);
        assert!(!world.rules.get_bool(BoolRule::DoMobSpawning));
        assert!(world.rules.get_bool(BoolRule::FallDamage));
        assert_eq!(world.rules.get_int(IntRule::SpawnRadius), 10);
        assert_eq!(bindings.active_variant(&key), Variant::Battle);
    }

    #[test]
    fn test_load_resident_reactivates_registered_variant() {
        let mut lifecycle = manager(TemplateBootstrap::standard());
        let mut bindings = BindingTable::new(Box::new(MemoryStore::new()));
        let players = PlayerDirectory::new();

        let key = lifecycle.load("lobby", &mut bindings, &players).unwrap();
        bindings.activate(&key, Variant::None, &players);

        assert_eq!(lifecycle.load("lobby", &mut bindings, &players), Some(key.clone()));
        assert_eq!(bindings.active_variant(&key), Variant::Lobby);
        assert_eq!(lifecycle.resident_keys(), vec![key]);
    }

    #[test]
    fn test_load_failure_is_absent() {
        let mut lifecycle = manager(TemplateBootstrap::empty());
        let mut bindings = BindingTable::new(Box::new(MemoryStore::new()));
        let players = PlayerDirectory::new();

        assert!(lifecycle.load("battle", &mut bindings, &players).is_none());
        assert!(lifecycle.load("nowhere", &mut bindings, &players).is_none());
        assert!(lifecycle.resident_keys().is_empty());
    }

    #[test]
    fn test_unload_refused_while_occupied() {
        let mut lifecycle = manager(TemplateBootstrap::standard());
        let mut bindings = BindingTable::new(Box::new(MemoryStore::new()));
        let mut players = PlayerDirectory::new();
        let key = lifecycle.load("battle", &mut bindings, &players).unwrap();

        let (tx, _rx) = mpsc::channel(8);
        players.insert(PlayerHandle::new(PlayerId::new([1; 16]), "p1", key.clone(), Placement::DEFAULT, tx));

        let err = lifecycle.unload("battle", &players).unwrap_err();
        assert!(matches!(err, WorldError::Occupied { players: 1, .. }));

        let world = lifecycle.instance(&key).unwrap();
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.region_state(), RegionState::Open);
    }

    #[test]
    fn test_unload_empty_world() {
        let mut lifecycle = manager(TemplateBootstrap::standard());
        let mut bindings = BindingTable::new(Box::new(MemoryStore::new()));
        let players = PlayerDirectory::new();
        let key = lifecycle.load("battle", &mut bindings, &players).unwrap();

        lifecycle.unload("battle", &players).unwrap();
        assert!(!lifecycle.is_resident(&key));
        assert!(matches!(lifecycle.unload("battle", &players), Err(WorldError::NotLoaded(_))));
    }

    #[tokio::test]
    async fn test_unload_deletes_scratch_copy_later() {
        let root = std::env::temp_dir().join(format!("minigame-lifecycle-{}", Uuid::new_v4()));
        let mut lifecycle = manager(TemplateBootstrap::standard().with_scratch_root(&root));
        let mut bindings = BindingTable::new(Box::new(MemoryStore::new()));
        let players = PlayerDirectory::new();

        let key = lifecycle.load("battle", &mut bindings, &players).unwrap();
        let dir = lifecycle.instance(&key).unwrap().scratch_dir().unwrap().to_path_buf();
        assert!(dir.exists());

        lifecycle.unload("battle", &players).unwrap();
        lifecycle.flush_cleanups().await;

        assert!(!dir.exists());
        assert_eq!(lifecycle.pending_cleanups(), 0);
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_cleanup_without_runtime_waits_for_settle_delay() {
        let root = std::env::temp_dir().join(format!("minigame-lifecycle-{}", Uuid::new_v4()));
        let bootstrap = TemplateBootstrap::standard().with_scratch_root(&root);
        let mut lifecycle = WorldLifecycleManager::new(Box::new(bootstrap), Duration::from_millis(300));
        lifecycle.register("battle", WorldKey::minigame("battle"), Variant::Battle);
        let mut bindings = BindingTable::new(Box::new(MemoryStore::new()));
        let players = PlayerDirectory::new();

        let key = lifecycle.load("battle", &mut bindings, &players).unwrap();
        let dir = lifecycle.instance(&key).unwrap().scratch_dir().unwrap().to_path_buf();

        lifecycle.unload("battle", &players).unwrap();
        assert!(dir.exists());
        assert_eq!(lifecycle.pending_cleanups(), 1);

        for task in std::mem::take(&mut lifecycle.detached_cleanups) {
            task.join().unwrap();
        }
        assert!(!dir.exists());
        std::fs::remove_dir_all(&root).unwrap();
    }
}
