//! Minigame Host
//!
//! Demo server: hosts a lobby, lets three bots ready up, plays one Battle
//! round to its end and waits for everyone to be sent back.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use minigame_host::{
    session::{commands, JsonFileStore, SessionRegistry, TickDriver},
    world::TemplateBootstrap,
    PlayerId, ServerConfig, SessionConfig, VERSION,
};

const DEMO_REQUEST: &str = r#"{"variantId":"battle","maxPlayers":4,"minPlayersToStart":2}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Minigame Host v{}", VERSION);
    let server = ServerConfig::from_env();
    info!("Tick Rate: {} Hz, store at {}", server.tick_rate, server.store_path.display());

    let store = JsonFileStore::open(&server.store_path).context("opening binding store")?;
    let mut bootstrap = TemplateBootstrap::standard();
    if let Some(root) = &server.scratch_root {
        bootstrap = bootstrap.with_scratch_root(root);
    }

    let mut registry = SessionRegistry::new(server.clone(), Box::new(store), Box::new(bootstrap))?;
    registry.configure(SessionConfig::from_json(DEMO_REQUEST));

    let driver = Arc::new(TickDriver::new(registry));
    let registry = driver.registry();
    let driver_task = {
        let driver = Arc::clone(&driver);
        tokio::spawn(async move { driver.run().await })
    };

    demo_round(&registry, server.outbox_capacity).await?;

    driver.shutdown();
    let ticks = driver_task.await?;
    info!("=== Demo complete after {} ticks ===", ticks);
    Ok(())
}

/// Three bots join, ready up, fight, and come back.
async fn demo_round(registry: &Arc<Mutex<SessionRegistry>>, outbox_capacity: usize) -> anyhow::Result<()> {
    let bots: Vec<PlayerId> = (1..=3u8).map(|i| PlayerId::new([i; 16])).collect();

    {
        let mut registry = registry.lock().await;
        for (i, id) in bots.iter().enumerate() {
            let (tx, rx) = mpsc::channel(outbox_capacity);
            let placement = registry.player_joined(*id, &format!("bot{}", i + 1), tx)?;
            info!("Bot {} spawned at ({:.1}, {:.1}, {:.1})", id.short(), placement.x, placement.y, placement.z);
            tokio::spawn(drain_outbox(*id, rx));
        }
        for id in &bots {
            commands::run_line(&mut registry, Some(*id), "ready")?;
        }
        for line in commands::run_line(&mut registry, None, "status")? {
            info!("{}", line);
        }
    }

    let arena = wait_for(registry, |r| {
        let lobby = r.lobby_key().clone();
        r.players().get(&bots[0]).map(|p| p.world.clone()).filter(|w| *w != lobby)
    })
    .await
    .context("round never launched")?;
    info!("Round running in {}", arena);

    {
        let mut registry = registry.lock().await;
        registry.player_died(&bots[1], Some(bots[0]))?;
        registry.player_died(&bots[2], Some(bots[0]))?;
    }

    wait_for(registry, |r| {
        let lobby = r.lobby_key();
        bots.iter()
            .all(|id| r.players().get(id).is_some_and(|p| p.world == *lobby))
            .then_some(())
    })
    .await
    .context("players never returned to the lobby")?;

    let registry = registry.lock().await;
    for line in registry.status().lines() {
        info!("{}", line);
    }
    Ok(())
}

/// Poll the registry until `check` yields a value (30 s limit).
async fn wait_for<T>(
    registry: &Arc<Mutex<SessionRegistry>>,
    check: impl Fn(&SessionRegistry) -> Option<T>,
) -> anyhow::Result<T> {
    for _ in 0..300 {
        if let Some(value) = check(&*registry.lock().await) {
            return Ok(value);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    bail!("timed out")
}

async fn drain_outbox(id: PlayerId, mut rx: mpsc::Receiver<minigame_host::network::ServerMessage>) {
    while let Some(message) = rx.recv().await {
        debug!("-> {}: {:?}", id.short(), message);
    }
}
