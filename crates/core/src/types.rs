use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DuelError, DuelResult};

/// Stable identifier of a comparable entity, assigned by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

/// The slice of an entity the pairing engine reads: its id and current rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub rating: f64,
}

impl EntityRef {
    pub fn new(id: impl Into<EntityId>, rating: f64) -> Self {
        Self {
            id: id.into(),
            rating,
        }
    }
}

/// Result of one comparison from entity A's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    AWins,
    BWins,
    Tie,
}

impl MatchResult {
    /// Actual scores `(a, b)`: 1/0 for a decisive result, 0.5 each for a tie.
    /// These double as the bandit rewards for both arms.
    pub fn scores(self) -> (f64, f64) {
        match self {
            MatchResult::AWins => (1.0, 0.0),
            MatchResult::BWins => (0.0, 1.0),
            MatchResult::Tie => (0.5, 0.5),
        }
    }
}

/// One completed comparison, created by the caller and handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    /// `None` marks a tie.
    pub winner: Option<EntityId>,
    pub recorded_at: DateTime<Utc>,
}

impl ComparisonOutcome {
    pub fn new(entity_a: EntityId, entity_b: EntityId, winner: Option<EntityId>) -> Self {
        Self {
            entity_a,
            entity_b,
            winner,
            recorded_at: Utc::now(),
        }
    }

    /// Resolve the winner id into a `MatchResult`, rejecting self-comparisons
    /// and winners that took no part in the comparison.
    pub fn result(&self) -> DuelResult<MatchResult> {
        if self.entity_a == self.entity_b {
            return Err(DuelError::SelfComparison(self.entity_a));
        }
        match self.winner {
            None => Ok(MatchResult::Tie),
            Some(w) if w == self.entity_a => Ok(MatchResult::AWins),
            Some(w) if w == self.entity_b => Ok(MatchResult::BWins),
            Some(w) => Err(DuelError::InvalidWinner {
                winner: w,
                entity_a: self.entity_a,
                entity_b: self.entity_b,
            }),
        }
    }

    /// The other participant, if `entity` took part in this comparison.
    pub fn opponent_of(&self, entity: EntityId) -> Option<EntityId> {
        if self.entity_a == entity {
            Some(self.entity_b)
        } else if self.entity_b == entity {
            Some(self.entity_a)
        } else {
            None
        }
    }
}

/// Per-entity UCB1 statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BanditArmState {
    pub trials: u64,
    /// Running mean of every reward recorded for this arm, in `[0, 1]`.
    pub mean_reward: f64,
}

impl BanditArmState {
    /// Fold one reward into the running mean.
    pub fn record(&mut self, reward: f64) {
        self.trials += 1;
        self.mean_reward += (reward - self.mean_reward) / self.trials as f64;
    }

    pub fn is_unexplored(&self) -> bool {
        self.trials == 0
    }
}

/// Reporting view of one arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmStats {
    pub entity_id: EntityId,
    pub trials: u64,
    pub mean_reward: f64,
    /// `None` while the arm is unexplored (its UCB score is unbounded).
    pub ucb_score: Option<f64>,
    /// Fraction of all recorded trials that went to this arm.
    pub trial_share: f64,
}
