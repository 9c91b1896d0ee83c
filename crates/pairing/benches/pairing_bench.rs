//! Benchmarks for pair selection and outcome recording.
//! Run with: cargo bench -p duel-pairing

use std::sync::Arc;

use duel_core::config::AppConfig;
use duel_core::ComparisonOutcome;
use duel_pairing::PairingEngine;
use duel_store::{MemoryComparisonLog, MemoryEntityStore, NewEntity};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    let config = AppConfig::default();
    let store = Arc::new(MemoryEntityStore::new(config.elo.initial_rating));
    let log = Arc::new(MemoryComparisonLog::new());

    let entity_count = 1_000;
    for i in 0..entity_count {
        store
            .create(NewEntity::named(format!("bench-{:04}", i)))
            .expect("Failed to create entity");
    }

    let engine = PairingEngine::with_rng(&config, store.clone(), log.clone(), StdRng::seed_from_u64(42))
        .expect("Failed to build engine");

    // Warmup
    for _ in 0..100 {
        let (a, b) = engine.next_pair().expect("Failed to select pair");
        let outcome = ComparisonOutcome::new(a.id, b.id, Some(a.id));
        engine.record_outcome(&outcome).expect("Failed to record outcome");
        log.append(outcome).expect("Failed to store comparison");
    }

    // Benchmark
    let iterations = 10_000;
    let start = std::time::Instant::now();

    for _ in 0..iterations {
        let (a, b) = engine.next_pair().expect("Failed to select pair");
        let outcome = ComparisonOutcome::new(a.id, b.id, Some(b.id));
        engine.record_outcome(&outcome).expect("Failed to record outcome");
        log.append(outcome).expect("Failed to store comparison");
    }

    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations;

    println!("=== Pairing Benchmark ===");
    println!("Entities:    {}", entity_count);
    println!("Iterations:  {}", iterations);
    println!("Total time:  {:?}", elapsed);
    println!("Per round:   {:?}", per_iter);
    println!("Throughput:  {:.0} rounds/sec", iterations as f64 / elapsed.as_secs_f64());
    println!("Trials:      {}", engine.bandit().total_trials());
}
