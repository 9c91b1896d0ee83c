//! Per-entity UCB1 arm statistics backed by DashMap.
//!
//! Each arm lives in its own map entry, so updates to different entities
//! only contend when they share a shard, and updates to the same entity are
//! serialized by the entry's write guard. The aggregate trial counter is
//! bumped while that guard is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use duel_core::{BanditArmState, DuelError, DuelResult, EntityId};
use tracing::debug;

pub struct BanditStatsStore {
    arms: DashMap<EntityId, BanditArmState>,
    total_trials: AtomicU64,
}

impl BanditStatsStore {
    pub fn new() -> Self {
        Self {
            arms: DashMap::new(),
            total_trials: AtomicU64::new(0),
        }
    }

    /// Create a zeroed arm for `entity` unless one exists. Returns `true` if
    /// this call created it.
    pub fn ensure_arm(&self, entity: EntityId) -> bool {
        let mut created = false;
        self.arms.entry(entity).or_insert_with(|| {
            created = true;
            BanditArmState::default()
        });
        if created {
            debug!(%entity, "bandit arm created");
        }
        created
    }

    /// Fold `reward` into the arm's running mean and bump the trial counts.
    /// Returns the arm state after the update.
    pub fn record_reward(&self, entity: EntityId, reward: f64) -> DuelResult<BanditArmState> {
        if !(0.0..=1.0).contains(&reward) {
            return Err(DuelError::Validation(format!(
                "reward {reward} for entity {entity} is outside [0, 1]"
            )));
        }

        let mut arm = self
            .arms
            .get_mut(&entity)
            .ok_or(DuelError::UnknownArm(entity))?;
        arm.record(reward);
        self.total_trials.fetch_add(1, Ordering::AcqRel);
        Ok(*arm)
    }

    pub fn get(&self, entity: EntityId) -> Option<BanditArmState> {
        self.arms.get(&entity).map(|arm| *arm)
    }

    /// Copy of every arm. Not a consistent cut across concurrent updates.
    pub fn get_all(&self) -> HashMap<EntityId, BanditArmState> {
        self.arms
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Sum of all arms' trials.
    pub fn total_trials(&self) -> u64 {
        self.total_trials.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }
}

impl Default for BanditStatsStore {
    fn default() -> Self {
        Self::new()
    }
}
