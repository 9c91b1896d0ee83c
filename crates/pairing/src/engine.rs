//! Pairing engine: binds the bandit statistics, recency tracker,
//! selector and Elo model behind `next_pair` / `record_outcome`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use duel_core::config::AppConfig;
use duel_core::{
    ArmStats, ComparisonHistory, ComparisonOutcome, DuelError, DuelResult, EntityId,
    EntityRepository, EntityRef, MatchResult,
};
use parking_lot::{Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::bandit::BanditStatsStore;
use crate::rating;
use crate::recency::RecencyTracker;
use crate::selector::{Candidate, PairSelector, SelectorConfig};

/// Number of lock stripes guarding rating + bandit updates per entity pair.
const OUTCOME_LOCK_STRIPES: usize = 64;

/// What `record_outcome` applied.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeReport {
    pub result: MatchResult,
    /// Entity A with its updated rating.
    pub entity_a: EntityRef,
    /// Entity B with its updated rating.
    pub entity_b: EntityRef,
}

/// Thread-safe pairing engine. Share it behind an `Arc`.
pub struct PairingEngine<R = StdRng> {
    entities: Arc<dyn EntityRepository>,
    bandit: BanditStatsStore,
    recency: RecencyTracker,
    selector: PairSelector,
    k_factor: f64,
    rng: Mutex<R>,
    outcome_locks: Vec<Mutex<()>>,
}

impl PairingEngine<StdRng> {
    /// Engine seeded from OS entropy.
    pub fn new(
        config: &AppConfig,
        entities: Arc<dyn EntityRepository>,
        history: Arc<dyn ComparisonHistory>,
    ) -> DuelResult<Self> {
        Self::with_rng(config, entities, history, StdRng::from_entropy())
    }
}

impl<R: Rng + Send> PairingEngine<R> {
    /// Engine drawing all randomness from `rng`, for reproducible selection.
    ///
    /// Fails with `DuelError::Config` if `config` does not validate; its
    /// warnings are logged.
    pub fn with_rng(
        config: &AppConfig,
        entities: Arc<dyn EntityRepository>,
        history: Arc<dyn ComparisonHistory>,
        rng: R,
    ) -> DuelResult<Self> {
        for warning in config.validate()? {
            warn!("{warning}");
        }

        info!(
            k_factor = config.elo.k_factor,
            exploration_constant = config.ucb.exploration_constant,
            recent_window = config.pairing.recent_comparison_limit,
            exclude_recent = config.pairing.exclude_recent,
            "pairing engine initialized"
        );

        Ok(Self {
            entities,
            bandit: BanditStatsStore::new(),
            recency: RecencyTracker::new(history, config.pairing.recent_comparison_limit),
            selector: PairSelector::new(SelectorConfig::from(config)),
            k_factor: config.elo.k_factor,
            rng: Mutex::new(rng),
            outcome_locks: (0..OUTCOME_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    pub fn bandit(&self) -> &BanditStatsStore {
        &self.bandit
    }

    /// Choose the next two entities to compare.
    ///
    /// Creates arms for entities seen for the first time. With exactly two
    /// entities they are returned as listed and no randomness is consumed.
    pub fn next_pair(&self) -> DuelResult<(EntityRef, EntityRef)> {
        let start = Instant::now();
        let entities = self.entities.list_entities()?;

        if entities.len() < 2 {
            metrics::counter!("pairing.not_enough_entities").increment(1);
            return Err(DuelError::NotEnoughEntities {
                available: entities.len(),
            });
        }

        for entity in &entities {
            self.bandit.ensure_arm(entity.id);
        }

        if entities.len() == 2 {
            metrics::counter!("pairing.pairs_selected").increment(1);
            return Ok((entities[0], entities[1]));
        }

        let total_trials = self.bandit.total_trials();
        let candidates: Vec<Candidate> = entities
            .iter()
            .map(|&entity| Candidate {
                entity,
                arm: self.bandit.get(entity.id).unwrap_or_default(),
            })
            .collect();

        let mut rng = self.fork_rng();
        let first = self
            .selector
            .select_first(&candidates, total_trials, &mut rng)
            .ok_or(DuelError::NotEnoughEntities {
                available: candidates.len(),
            })?;

        let recent = if self.selector.config().exclude_recent {
            self.recency.recent_opponents(candidates[first].id())
        } else {
            HashSet::new()
        };

        let second = self
            .selector
            .select_second(first, &candidates, total_trials, &recent, &mut rng)
            .ok_or(DuelError::NotEnoughEntities {
                available: candidates.len(),
            })?;

        let (a, b) = (candidates[first].entity, candidates[second].entity);
        let latency = start.elapsed().as_micros() as u64;
        debug!(
            entity_a = %a.id,
            entity_b = %b.id,
            total_trials,
            excluded = recent.len(),
            latency_us = latency,
            "pair selected"
        );
        metrics::counter!("pairing.pairs_selected").increment(1);
        metrics::histogram!("pairing.select_latency_us").record(latency as f64);

        Ok((a, b))
    }

    /// Fold a finished comparison into both entities' Elo ratings and bandit
    /// statistics. Either both effects land or the call fails with nothing
    /// applied.
    pub fn record_outcome(&self, outcome: &ComparisonOutcome) -> DuelResult<OutcomeReport> {
        let applied = self.apply_outcome(outcome);
        match &applied {
            Ok(report) => {
                info!(
                    entity_a = %report.entity_a.id,
                    entity_b = %report.entity_b.id,
                    result = ?report.result,
                    rating_a = report.entity_a.rating,
                    rating_b = report.entity_b.rating,
                    "comparison outcome recorded"
                );
                metrics::counter!("pairing.outcomes_recorded").increment(1);
            }
            Err(e) => {
                warn!(
                    entity_a = %outcome.entity_a,
                    entity_b = %outcome.entity_b,
                    error = %e,
                    "comparison outcome rejected"
                );
                metrics::counter!("pairing.outcomes_failed").increment(1);
            }
        }
        applied
    }

    fn apply_outcome(&self, outcome: &ComparisonOutcome) -> DuelResult<OutcomeReport> {
        let result = outcome.result()?;
        let (id_a, id_b) = (outcome.entity_a, outcome.entity_b);

        let _guards = self.lock_pair(id_a, id_b);

        let before_a = self
            .entities
            .get_entity(id_a)?
            .ok_or(DuelError::UnknownEntity(id_a))?;
        let before_b = self
            .entities
            .get_entity(id_b)?
            .ok_or(DuelError::UnknownEntity(id_b))?;

        self.bandit.ensure_arm(id_a);
        self.bandit.ensure_arm(id_b);

        let (rating_a, rating_b) =
            rating::apply_result(before_a.rating, before_b.rating, result, self.k_factor);

        self.entities
            .set_rating(id_a, rating_a)
            .map_err(|e| not_applied(id_a, id_b, e))?;
        if let Err(e) = self.entities.set_rating(id_b, rating_b) {
            if let Err(restore) = self.entities.set_rating(id_a, before_a.rating) {
                error!(
                    entity = %id_a,
                    rating = before_a.rating,
                    error = %restore,
                    "failed to restore rating after partial write"
                );
                return Err(not_applied(
                    id_a,
                    id_b,
                    format!("{e}; restoring rating of {id_a} also failed: {restore}"),
                ));
            }
            return Err(not_applied(id_a, id_b, e));
        }

        // Arms were ensured above and are never removed, so these cannot miss.
        let (reward_a, reward_b) = result.scores();
        self.bandit.record_reward(id_a, reward_a)?;
        self.bandit.record_reward(id_b, reward_b)?;

        Ok(OutcomeReport {
            result,
            entity_a: EntityRef::new(id_a, rating_a),
            entity_b: EntityRef::new(id_b, rating_b),
        })
    }

    /// All entities, highest rating first; equal ratings by id.
    pub fn leaderboard(&self) -> DuelResult<Vec<EntityRef>> {
        let mut entities = self.entities.list_entities()?;
        entities.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        Ok(entities)
    }

    /// Per-entity bandit statistics, ordered by entity id. Entities without
    /// an arm yet are reported as unexplored.
    pub fn arm_stats(&self) -> DuelResult<Vec<ArmStats>> {
        let mut entities = self.entities.list_entities()?;
        entities.sort_by_key(|e| e.id);
        let total_trials = self.bandit.total_trials();

        Ok(entities
            .iter()
            .map(|entity| {
                let arm = self.bandit.get(entity.id).unwrap_or_default();
                let score = self.selector.ucb_score(&arm, total_trials);
                ArmStats {
                    entity_id: entity.id,
                    trials: arm.trials,
                    mean_reward: arm.mean_reward,
                    ucb_score: score.is_finite().then_some(score),
                    trial_share: if total_trials > 0 {
                        arm.trials as f64 / total_trials as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect())
    }

    /// The arm greedy UCB1 would pull next.
    pub fn best_arm(&self) -> DuelResult<Option<EntityId>> {
        let candidates: Vec<Candidate> = self
            .entities
            .list_entities()?
            .into_iter()
            .map(|entity| Candidate {
                entity,
                arm: self.bandit.get(entity.id).unwrap_or_default(),
            })
            .collect();
        Ok(self.selector.best_arm(&candidates, self.bandit.total_trials()))
    }

    /// Per-call generator seeded from the shared source, so the shared lock
    /// is held for a single draw.
    fn fork_rng(&self) -> StdRng {
        let seed: u64 = self.rng.lock().gen();
        StdRng::seed_from_u64(seed)
    }

    /// Lock the stripes of both entities in index order.
    fn lock_pair(&self, a: EntityId, b: EntityId) -> Vec<MutexGuard<'_, ()>> {
        let mut stripes = [stripe(a), stripe(b)];
        stripes.sort_unstable();
        if stripes[0] == stripes[1] {
            vec![self.outcome_locks[stripes[0]].lock()]
        } else {
            vec![
                self.outcome_locks[stripes[0]].lock(),
                self.outcome_locks[stripes[1]].lock(),
            ]
        }
    }
}

fn stripe(id: EntityId) -> usize {
    (id.0 % OUTCOME_LOCK_STRIPES as u64) as usize
}

fn not_applied(entity_a: EntityId, entity_b: EntityId, reason: impl ToString) -> DuelError {
    DuelError::OutcomeNotApplied {
        entity_a,
        entity_b,
        reason: reason.to_string(),
    }
}
