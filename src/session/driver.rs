//! Tick Driver
//!
//! One tokio task ticks the registry at a fixed rate. Missed ticks are
//! skipped rather than bunched, and a broadcast shutdown signal stops the
//! loop between ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, instrument};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::session::registry::SessionRegistry;

/// Drives [`SessionRegistry::tick`] at the configured rate.
pub struct TickDriver {
    registry: Arc<Mutex<SessionRegistry>>,
    tick_duration: Duration,
    shutdown_tx: broadcast::Sender<()>,
    stopped: AtomicBool,
}

impl TickDriver {
    /// Driver taking ownership of `registry`.
    pub fn new(registry: SessionRegistry) -> Self {
        let tick_duration = registry.server_config().tick_duration();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registry: Arc::new(Mutex::new(registry)),
            tick_duration,
            shutdown_tx,
            stopped: AtomicBool::new(false),
        }
    }

    /// Shared handle to the registry, for player events and admin commands.
    pub fn registry(&self) -> Arc<Mutex<SessionRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Duration of one tick.
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Run until [`shutdown`](Self::shutdown). Returns the ticks driven.
    #[instrument(skip(self))]
    pub async fn run(&self) -> u64 {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Tick driver running, {:?} per tick", self.tick_duration);

        let mut ticks = 0u64;
        while !self.stopped.load(Ordering::Acquire) {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let mut registry = self.registry.lock().await;
                    registry.tick();
                    ticks += 1;
                    #[cfg(feature = "debug-tracing")]
                    trace!(tick = registry.ticks(), "registry tick");
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.registry.lock().await.lifecycle_mut().flush_cleanups().await;
        info!("Tick driver stopped after {} ticks", ticks);
        ticks
    }

    /// Stop the driver.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, SessionConfig};
    use crate::game::lobby::LOBBY_COUNTDOWN_TICKS;
    use crate::game::variant::Variant;
    use crate::session::store::MemoryStore;
    use crate::world::bootstrap::TemplateBootstrap;
    use crate::world::players::PlayerId;
    use tokio::sync::mpsc;

    fn driver(tick_rate: u32) -> TickDriver {
        let server = ServerConfig {
            tick_rate,
            scratch_root: None,
            rng_seed: Some(1),
            ..ServerConfig::default()
        };
        let registry = SessionRegistry::new(
            server,
            Box::new(MemoryStore::new()),
            Box::new(TemplateBootstrap::standard()),
        )
        .unwrap();
        TickDriver::new(registry)
    }

    #[test]
    fn test_tick_duration_from_rate() {
        assert_eq!(driver(20).tick_duration(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_runs_until_shutdown() {
        let driver = Arc::new(driver(200));
        let task = {
            let driver = Arc::clone(&driver);
            tokio::spawn(async move { driver.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        driver.shutdown();
        let ticks = task.await.unwrap();

        assert!(ticks > 0);
        assert_eq!(driver.registry().lock().await.ticks(), ticks);
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let driver = driver(20);
        driver.shutdown();
        assert_eq!(driver.run().await, 0);
    }

    #[tokio::test]
    async fn test_driver_advances_lobby_countdown() {
        let driver = Arc::new(driver(500));
        let (tx, _rx) = mpsc::channel(256);
        {
            let registry = driver.registry();
            let mut registry = registry.lock().await;
            registry.configure(SessionConfig::new(Variant::Tumble, 4, 1));
            registry.player_joined(PlayerId::new([1; 16]), "solo", tx).unwrap();
        }

        let task = {
            let driver = Arc::clone(&driver);
            tokio::spawn(async move { driver.run().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.shutdown();
        task.await.unwrap();

        let registry = driver.registry();
        let registry = registry.lock().await;
        assert!(registry.lobby().unwrap().countdown() < LOBBY_COUNTDOWN_TICKS);
    }
}
