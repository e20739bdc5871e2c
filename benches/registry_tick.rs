//! Benchmark: one registry tick
//!
//! Measures `SessionRegistry::tick` with a populated lobby that is holding
//! for more players, and with the same roster playing an active Battle
//! round. Everything runs in memory; no tracing subscriber is installed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use minigame_host::network::ServerMessage;
use minigame_host::session::{MemoryStore, SessionRegistry};
use minigame_host::world::TemplateBootstrap;
use minigame_host::{PlayerId, ServerConfig, SessionConfig, Variant};
use tokio::sync::mpsc;

fn populated(players: usize, min_players: i64) -> (SessionRegistry, Vec<PlayerId>, Vec<mpsc::Receiver<ServerMessage>>) {
    let server = ServerConfig {
        scratch_root: None,
        rng_seed: Some(42),
        ..ServerConfig::default()
    };
    let mut registry = SessionRegistry::new(
        server,
        Box::new(MemoryStore::new()),
        Box::new(TemplateBootstrap::standard()),
    )
    .unwrap();
    registry.configure(SessionConfig::new(Variant::Battle, 100, min_players));

    let mut ids = Vec::with_capacity(players);
    let mut outboxes = Vec::with_capacity(players);
    for i in 0..players {
        let id = PlayerId::new(rand::random::<[u8; 16]>());
        let (tx, rx) = mpsc::channel(64);
        registry.player_joined(id, &format!("bench{}", i), tx).unwrap();
        ids.push(id);
        outboxes.push(rx);
    }
    (registry, ids, outboxes)
}

fn bench_registry_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_tick");

    for players in [8usize, 32, 99] {
        // lobby below its start threshold: countdown pinned every tick
        let (mut registry, _ids, _outboxes) = populated(players, players as i64 + 1);
        group.bench_with_input(BenchmarkId::new("lobby_hold", players), &players, |b, _| {
            b.iter(|| {
                registry.tick();
                black_box(registry.ticks())
            });
        });

        let (mut registry, ids, _outboxes) = populated(players, 2);
        for id in &ids {
            registry.set_ready(id, true).unwrap();
        }
        registry.tick();
        group.bench_with_input(BenchmarkId::new("active_round", players), &players, |b, _| {
            b.iter(|| {
                registry.tick();
                black_box(registry.ticks())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_registry_tick);
criterion_main!(benches);
