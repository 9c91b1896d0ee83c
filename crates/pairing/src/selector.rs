//! Pair selection: UCB-weighted sampling for the first entity, then a
//! deterministic composite score (UCB, rating proximity, noise) for its
//! opponent.

use std::collections::HashSet;

use duel_core::config::AppConfig;
use duel_core::{BanditArmState, EntityId, EntityRef};
use rand::Rng;

/// Lower bound on a sampling weight so weak arms keep a nonzero chance.
const MIN_SAMPLING_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub exploration_constant: f64,
    pub unexplored_weight: f64,
    pub ucb_weight: f64,
    pub similarity_weight: f64,
    pub random_weight: f64,
    pub rating_threshold: f64,
    pub exclude_recent: bool,
}

impl From<&AppConfig> for SelectorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            exploration_constant: config.ucb.exploration_constant,
            unexplored_weight: config.ucb.unexplored_weight,
            ucb_weight: config.pairing.ucb_weight,
            similarity_weight: config.pairing.similarity_weight,
            random_weight: config.pairing.random_weight,
            rating_threshold: config.pairing.rating_threshold,
            exclude_recent: config.pairing.exclude_recent,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// An entity together with its arm statistics at selection time.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub entity: EntityRef,
    pub arm: BanditArmState,
}

impl Candidate {
    pub fn id(&self) -> EntityId {
        self.entity.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct PairSelector {
    config: SelectorConfig,
}

impl PairSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// UCB1 score. Unexplored arms score `+inf`; `total_trials` is floored
    /// to 1 so `ln` never sees zero.
    pub fn ucb_score(&self, arm: &BanditArmState, total_trials: u64) -> f64 {
        if arm.trials == 0 {
            return f64::INFINITY;
        }
        let n = total_trials.max(1) as f64;
        arm.mean_reward
            + self.config.exploration_constant * (2.0 * n.ln() / arm.trials as f64).sqrt()
    }

    /// Weight used when sampling the first entity.
    pub fn sampling_weight(&self, ucb_score: f64) -> f64 {
        if ucb_score.is_infinite() {
            self.config.unexplored_weight
        } else {
            ucb_score.max(MIN_SAMPLING_WEIGHT)
        }
    }

    /// Bonus in `[0, 1]` for opponents whose rating is within the threshold,
    /// peaking at 1 for identical ratings.
    pub fn similarity_bonus(&self, rating: f64, anchor_rating: f64) -> f64 {
        let threshold = self.config.rating_threshold;
        let gap = (rating - anchor_rating).abs();
        if gap >= threshold {
            0.0
        } else {
            (threshold - gap) / threshold
        }
    }

    /// Sample the first entity with probability proportional to its
    /// sampling weight. Returns an index into `candidates`.
    pub fn select_first<R: Rng + ?Sized>(
        &self,
        candidates: &[Candidate],
        total_trials: u64,
        rng: &mut R,
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let weights: Vec<f64> = candidates
            .iter()
            .map(|c| self.sampling_weight(self.ucb_score(&c.arm, total_trials)))
            .collect();
        let total_weight: f64 = weights.iter().sum();

        if total_weight <= 0.0 || !total_weight.is_finite() {
            return Some(rng.gen_range(0..candidates.len()));
        }
        Some(weighted_random_select(&weights, total_weight, rng))
    }

    /// Score every eligible opponent of `candidates[first]` and return the
    /// index of the best one. Ties go to the earliest candidate.
    ///
    /// Recent opponents are skipped when `exclude_recent` is set, unless that
    /// would leave nobody to pick. One random draw is taken per scored
    /// candidate, in enumeration order.
    pub fn select_second<R: Rng + ?Sized>(
        &self,
        first: usize,
        candidates: &[Candidate],
        total_trials: u64,
        recent: &HashSet<EntityId>,
        rng: &mut R,
    ) -> Option<usize> {
        let anchor = candidates.get(first)?.entity;

        let mut pool: Vec<usize> = (0..candidates.len()).filter(|&i| i != first).collect();
        if self.config.exclude_recent && !recent.is_empty() {
            let fresh: Vec<usize> = pool
                .iter()
                .copied()
                .filter(|&i| !recent.contains(&candidates[i].id()))
                .collect();
            if !fresh.is_empty() {
                pool = fresh;
            }
        }

        let mut best: Option<(usize, f64)> = None;
        for i in pool {
            let candidate = &candidates[i];
            let score = self.composite_score(candidate, anchor.rating, total_trials, rng.gen::<f64>());
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((i, score)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// `w_ucb * ucb + w_sim * similarity + w_rand * noise`, with an
    /// unexplored arm's UCB replaced by the finite unexplored weight.
    pub fn composite_score(
        &self,
        candidate: &Candidate,
        anchor_rating: f64,
        total_trials: u64,
        noise: f64,
    ) -> f64 {
        let ucb = self.ucb_score(&candidate.arm, total_trials);
        let ucb = if ucb.is_infinite() {
            self.config.unexplored_weight
        } else {
            ucb
        };
        self.config.ucb_weight * ucb
            + self.config.similarity_weight * self.similarity_bonus(candidate.entity.rating, anchor_rating)
            + self.config.random_weight * noise
    }

    /// Classic greedy UCB1: the first unexplored arm, otherwise the highest
    /// score (earliest wins ties).
    pub fn best_arm(&self, candidates: &[Candidate], total_trials: u64) -> Option<EntityId> {
        let mut best: Option<(EntityId, f64)> = None;
        for c in candidates {
            if c.arm.is_unexplored() {
                return Some(c.id());
            }
            let score = self.ucb_score(&c.arm, total_trials);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((c.id(), score)),
            }
        }
        best.map(|(id, _)| id)
    }
}

fn weighted_random_select<R: Rng + ?Sized>(weights: &[f64], total_weight: f64, rng: &mut R) -> usize {
    let mut r = rng.gen::<f64>() * total_weight;
    for (j, &w) in weights.iter().enumerate() {
        r -= w;
        if r < 0.0 {
            return j;
        }
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn candidate(id: u64, rating: f64, trials: u64, mean_reward: f64) -> Candidate {
        Candidate {
            entity: EntityRef::new(id, rating),
            arm: BanditArmState { trials, mean_reward },
        }
    }

    #[test]
    fn test_unexplored_arm_scores_infinite() {
        let selector = PairSelector::default();
        let score = selector.ucb_score(&BanditArmState::default(), 0);
        assert!(score.is_infinite() && score > 0.0);
    }

    #[test]
    fn test_ucb_formula() {
        let selector = PairSelector::default();
        let arm = BanditArmState { trials: 4, mean_reward: 0.75 };
        let expected = 0.75 + 1.414 * (2.0 * (20f64).ln() / 4.0).sqrt();
        assert!((selector.ucb_score(&arm, 20) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ucb_floors_total_trials() {
        let selector = PairSelector::default();
        let arm = BanditArmState { trials: 1, mean_reward: 0.5 };
        // ln(max(0, 1)) == 0, so only the mean remains.
        assert_eq!(selector.ucb_score(&arm, 0), 0.5);
        assert_eq!(selector.ucb_score(&arm, 1), 0.5);
    }

    #[test]
    fn test_sampling_weight_floor() {
        let selector = PairSelector::default();
        assert_eq!(selector.sampling_weight(f64::INFINITY), 1000.0);
        assert_eq!(selector.sampling_weight(0.0), 0.1);
        assert_eq!(selector.sampling_weight(0.05), 0.1);
        assert_eq!(selector.sampling_weight(1.7), 1.7);
    }

    #[test]
    fn test_similarity_bonus() {
        let selector = PairSelector::default();
        assert_eq!(selector.similarity_bonus(1500.0, 1500.0), 1.0);
        assert!((selector.similarity_bonus(1550.0, 1500.0) - 0.75).abs() < 1e-12);
        assert!((selector.similarity_bonus(1450.0, 1500.0) - 0.75).abs() < 1e-12);
        assert_eq!(selector.similarity_bonus(1700.0, 1500.0), 0.0);
        assert_eq!(selector.similarity_bonus(1000.0, 1500.0), 0.0);
    }

    #[test]
    fn test_select_first_empty() {
        let selector = PairSelector::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(selector.select_first(&[], 0, &mut rng), None);
    }

    #[test]
    fn test_select_first_is_reproducible() {
        let selector = PairSelector::default();
        let candidates: Vec<Candidate> = (1..=6)
            .map(|id| candidate(id, 1500.0, id, 0.1 * id as f64))
            .collect();

        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..50)
                .map(|_| selector.select_first(&candidates, 21, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(7), draw(7));
    }

    #[test]
    fn test_unexplored_sampling_frequency() {
        let config = SelectorConfig {
            unexplored_weight: 2.0,
            ..SelectorConfig::default()
        };
        let selector = PairSelector::new(config);
        let candidates = vec![
            candidate(1, 1500.0, 1, 0.0),
            candidate(2, 1500.0, 1, 0.0),
            candidate(3, 1500.0, 0, 0.0),
        ];
        let total = 2;
        let explored_weight = 1.414 * (2.0 * (2f64).ln()).sqrt();
        let expected = 2.0 / (2.0 + 2.0 * explored_weight);

        let mut rng = StdRng::seed_from_u64(2024);
        let draws = 20_000;
        let hits = (0..draws)
            .filter(|_| selector.select_first(&candidates, total, &mut rng) == Some(2))
            .count();
        let observed = hits as f64 / draws as f64;
        assert!(
            (observed - expected).abs() < 0.02,
            "observed {observed:.4}, expected {expected:.4}"
        );
    }

    #[test]
    fn test_default_unexplored_weight_dominates() {
        let selector = PairSelector::default();
        let candidates = vec![
            candidate(1, 1500.0, 3, 0.4),
            candidate(2, 1500.0, 3, 0.6),
            candidate(3, 1500.0, 0, 0.0),
        ];
        let mut rng = StdRng::seed_from_u64(99);
        let hits = (0..5_000)
            .filter(|_| selector.select_first(&candidates, 6, &mut rng) == Some(2))
            .count();
        assert!(hits as f64 / 5_000.0 > 0.99);
    }

    #[test]
    fn test_second_never_repeats_first() {
        let selector = PairSelector::default();
        let candidates: Vec<Candidate> = (1..=5).map(|id| candidate(id, 1500.0, 2, 0.5)).collect();
        let mut rng = StdRng::seed_from_u64(3);
        for first in 0..candidates.len() {
            for _ in 0..20 {
                let second = selector
                    .select_second(first, &candidates, 10, &HashSet::new(), &mut rng)
                    .unwrap();
                assert_ne!(first, second);
            }
        }
    }

    #[test]
    fn test_second_prefers_close_rating_without_noise() {
        let config = SelectorConfig {
            ucb_weight: 0.0,
            similarity_weight: 1.0,
            random_weight: 0.0,
            ..SelectorConfig::default()
        };
        let selector = PairSelector::new(config);
        let candidates = vec![
            candidate(1, 1500.0, 2, 0.5),
            candidate(2, 1800.0, 2, 0.5),
            candidate(3, 1520.0, 2, 0.5),
            candidate(4, 1400.0, 2, 0.5),
        ];
        let mut rng = StdRng::seed_from_u64(4);
        let second = selector
            .select_second(0, &candidates, 8, &HashSet::new(), &mut rng)
            .unwrap();
        assert_eq!(candidates[second].id(), EntityId(3));
    }

    #[test]
    fn test_second_ties_go_to_first_encountered() {
        let config = SelectorConfig {
            random_weight: 0.0,
            ..SelectorConfig::default()
        };
        let selector = PairSelector::new(config);
        let candidates: Vec<Candidate> = (1..=4).map(|id| candidate(id, 1500.0, 2, 0.5)).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let second = selector
            .select_second(2, &candidates, 8, &HashSet::new(), &mut rng)
            .unwrap();
        assert_eq!(second, 0);
    }

    #[test]
    fn test_second_excludes_recent_opponents() {
        let config = SelectorConfig {
            ucb_weight: 0.0,
            similarity_weight: 1.0,
            random_weight: 0.0,
            ..SelectorConfig::default()
        };
        let selector = PairSelector::new(config);
        let candidates = vec![
            candidate(1, 1500.0, 2, 0.5),
            candidate(2, 1500.0, 2, 0.5),
            candidate(3, 1650.0, 2, 0.5),
        ];
        let recent: HashSet<EntityId> = [EntityId(2)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(6);
        let second = selector
            .select_second(0, &candidates, 8, &recent, &mut rng)
            .unwrap();
        assert_eq!(candidates[second].id(), EntityId(3));
    }

    #[test]
    fn test_exclusion_skipped_when_it_would_empty_pool() {
        let selector = PairSelector::default();
        let candidates = vec![
            candidate(1, 1500.0, 2, 0.5),
            candidate(2, 1500.0, 2, 0.5),
            candidate(3, 1500.0, 2, 0.5),
        ];
        let recent: HashSet<EntityId> = [EntityId(2), EntityId(3)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(8);
        let second = selector.select_second(0, &candidates, 6, &recent, &mut rng);
        assert!(matches!(second, Some(1) | Some(2)));
    }

    #[test]
    fn test_exclusion_ignored_when_disabled() {
        let config = SelectorConfig {
            ucb_weight: 0.0,
            similarity_weight: 1.0,
            random_weight: 0.0,
            exclude_recent: false,
            ..SelectorConfig::default()
        };
        let selector = PairSelector::new(config);
        let candidates = vec![
            candidate(1, 1500.0, 2, 0.5),
            candidate(2, 1500.0, 2, 0.5),
            candidate(3, 1650.0, 2, 0.5),
        ];
        let recent: HashSet<EntityId> = [EntityId(2)].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(6);
        let second = selector
            .select_second(0, &candidates, 8, &recent, &mut rng)
            .unwrap();
        assert_eq!(candidates[second].id(), EntityId(2));
    }

    #[test]
    fn test_composite_score_stays_finite_for_unexplored() {
        let selector = PairSelector::default();
        let fresh = candidate(2, 1500.0, 0, 0.0);
        let score = selector.composite_score(&fresh, 1500.0, 0, 0.5);
        assert!(score.is_finite());
        assert!((score - (0.3 * 1000.0 + 0.4 * 1.0 + 0.3 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_unexplored_opponent_wins_second_slot() {
        let selector = PairSelector::default();
        let candidates = vec![
            candidate(1, 1500.0, 5, 0.9),
            candidate(2, 1500.0, 5, 0.9),
            candidate(3, 2400.0, 0, 0.0),
        ];
        let mut rng = StdRng::seed_from_u64(10);
        let second = selector
            .select_second(0, &candidates, 10, &HashSet::new(), &mut rng)
            .unwrap();
        assert_eq!(candidates[second].id(), EntityId(3));
    }

    #[test]
    fn test_best_arm() {
        let selector = PairSelector::default();
        let explored = vec![
            candidate(1, 1500.0, 10, 0.2),
            candidate(2, 1500.0, 10, 0.8),
            candidate(3, 1500.0, 10, 0.8),
        ];
        assert_eq!(selector.best_arm(&explored, 30), Some(EntityId(2)));

        let mut with_fresh = explored.clone();
        with_fresh.push(candidate(4, 1500.0, 0, 0.0));
        assert_eq!(selector.best_arm(&with_fresh, 30), Some(EntityId(4)));
        assert_eq!(selector.best_arm(&[], 0), None);
    }
}
