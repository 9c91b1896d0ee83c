//! Simulated comparison session: entities with hidden strengths, several
//! concurrent workers asking for pairs and reporting Elo-distributed results.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use duel_core::config::AppConfig;
use duel_core::{ComparisonOutcome, DuelResult, EntityId};
use duel_pairing::{rating, PairingEngine};
use duel_store::{ComparisonRecord, MemoryComparisonLog, MemoryEntityStore, NewEntity};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub entities: usize,
    pub comparisons: usize,
    pub workers: usize,
    pub spread: f64,
    pub tie_rate: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub id: EntityId,
    pub name: String,
    pub hidden_strength: f64,
    pub rating: f64,
    pub trials: u64,
    pub mean_reward: f64,
    pub ucb_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub comparisons: usize,
    pub ties: usize,
    pub elapsed_ms: u64,
    /// Spearman correlation between learned ratings and hidden strengths.
    pub rank_correlation: f64,
    /// Arm greedy UCB1 would pull next.
    pub best_arm: Option<EntityId>,
    /// Leaderboard order, highest rating first.
    pub entities: Vec<EntityReport>,
}

pub async fn run(config: &AppConfig, params: &SimulationParams) -> anyhow::Result<SimulationReport> {
    if params.entities < 2 {
        bail!("a simulation needs at least 2 entities");
    }
    if params.workers == 0 {
        bail!("at least one worker is required");
    }
    if !(0.0..1.0).contains(&params.tie_rate) {
        bail!("tie rate must be in [0, 1)");
    }

    let store = Arc::new(MemoryEntityStore::new(config.elo.initial_rating));
    let log = Arc::new(MemoryComparisonLog::new());

    let strengths = seed_entities(&store, config.elo.initial_rating, params)?;
    let strengths = Arc::new(strengths);

    let engine = Arc::new(PairingEngine::with_rng(
        config,
        store.clone(),
        log.clone(),
        StdRng::seed_from_u64(params.seed),
    )?);

    info!(
        entities = params.entities,
        comparisons = params.comparisons,
        workers = params.workers,
        "Simulation starting"
    );

    let start = Instant::now();
    let remaining = Arc::new(AtomicUsize::new(params.comparisons));
    let mut handles = Vec::with_capacity(params.workers);

    for worker in 0..params.workers {
        let engine = engine.clone();
        let log = log.clone();
        let strengths = strengths.clone();
        let remaining = remaining.clone();
        let tie_rate = params.tie_rate;
        let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(1 + worker as u64));

        handles.push(tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
            let mut ties = 0;
            while claim(&remaining) {
                let (a, b) = engine.next_pair()?;
                let winner = if rng.gen::<f64>() < tie_rate {
                    ties += 1;
                    None
                } else {
                    let p_a = rating::expected_score(strengths[&a.id], strengths[&b.id]);
                    Some(if rng.gen::<f64>() < p_a { a.id } else { b.id })
                };

                settle(&engine, &log, ComparisonOutcome::new(a.id, b.id, winner))?;
            }
            debug!(worker, ties, "worker finished");
            Ok(ties)
        }));
    }

    let mut ties = 0;
    for handle in handles {
        ties += handle.await.context("worker panicked")??;
    }
    let elapsed = start.elapsed();

    info!(
        comparisons = log.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Simulation finished"
    );

    let stats: HashMap<EntityId, _> = engine
        .arm_stats()?
        .into_iter()
        .map(|s| (s.entity_id, s))
        .collect();

    let mut entities = Vec::new();
    for entry in engine.leaderboard()? {
        let name = store
            .get(entry.id)
            .map(|e| e.name)
            .unwrap_or_default();
        let arm = stats.get(&entry.id);
        entities.push(EntityReport {
            id: entry.id,
            name,
            hidden_strength: strengths[&entry.id],
            rating: entry.rating,
            trials: arm.map(|s| s.trials).unwrap_or(0),
            mean_reward: arm.map(|s| s.mean_reward).unwrap_or(0.0),
            ucb_score: arm.and_then(|s| s.ucb_score),
        });
    }

    let learned: Vec<f64> = entities.iter().map(|e| e.rating).collect();
    let hidden: Vec<f64> = entities.iter().map(|e| e.hidden_strength).collect();

    Ok(SimulationReport {
        comparisons: log.len(),
        ties,
        elapsed_ms: elapsed.as_millis() as u64,
        rank_correlation: spearman(&learned, &hidden),
        best_arm: engine.best_arm()?,
        entities,
    })
}

/// Apply a comparison to the engine, then store it. A rejected outcome never
/// reaches the log, so recency exclusion only sees applied comparisons.
fn settle(
    engine: &PairingEngine,
    log: &MemoryComparisonLog,
    outcome: ComparisonOutcome,
) -> DuelResult<ComparisonRecord> {
    engine.record_outcome(&outcome)?;
    log.append(outcome)
}

/// Take one unit of work from the shared budget.
fn claim(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

/// Create the entities with evenly spaced hidden strengths in shuffled order.
fn seed_entities(
    store: &MemoryEntityStore,
    center: f64,
    params: &SimulationParams,
) -> anyhow::Result<HashMap<EntityId, f64>> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let step = params.spread / (params.entities - 1) as f64;
    let mut levels: Vec<f64> = (0..params.entities)
        .map(|i| center - params.spread / 2.0 + step * i as f64)
        .collect();
    levels.shuffle(&mut rng);

    let mut strengths = HashMap::with_capacity(params.entities);
    for (i, strength) in levels.into_iter().enumerate() {
        let entity = store.create(
            NewEntity::named(format!("entity-{:03}", i + 1))
                .with_description(format!("hidden strength {strength:.0}")),
        )?;
        strengths.insert(entity.id, strength);
    }
    Ok(strengths)
}

fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut ranks = vec![0.0; values.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = rank as f64;
    }
    ranks
}

/// Spearman rank correlation (ties broken by position).
pub fn spearman(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return 0.0;
    }
    let (rx, ry) = (ranks(xs), ranks(ys));
    let d2: f64 = rx.iter().zip(&ry).map(|(a, b)| (a - b).powi(2)).sum();
    let n = n as f64;
    1.0 - 6.0 * d2 / (n * (n * n - 1.0))
}
