//! Append-only comparison log.

use std::collections::{HashMap, HashSet};

use duel_core::{ComparisonHistory, ComparisonOutcome, DuelError, DuelResult, EntityId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub outcome: ComparisonOutcome,
}

/// Page of comparisons, newest first, optionally restricted to those
/// involving one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub entity: Option<EntityId>,
}

fn default_limit() -> usize {
    100
}

impl Default for ComparisonQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            entity: None,
        }
    }
}

/// Comparison records in arrival order, indexed by id and by participant.
pub struct MemoryComparisonLog {
    state: RwLock<LogState>,
}

#[derive(Default)]
struct LogState {
    records: Vec<ComparisonRecord>,
    by_id: HashMap<Uuid, usize>,
    /// Positions in `records` of every comparison an entity took part in,
    /// oldest first.
    by_entity: HashMap<EntityId, Vec<usize>>,
}

impl LogState {
    fn involving(&self, entity: EntityId) -> impl Iterator<Item = &ComparisonRecord> + '_ {
        self.by_entity
            .get(&entity)
            .into_iter()
            .flat_map(|positions| positions.iter().rev())
            .map(|&pos| &self.records[pos])
    }
}

impl MemoryComparisonLog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LogState::default()),
        }
    }

    /// Store a finished comparison. The winner must be one of the two
    /// participants (or absent, for a tie).
    ///
    /// Callers record the outcome with the pairing engine first and append
    /// only once that succeeds, so the log never holds a comparison whose
    /// effects were not applied.
    pub fn append(&self, outcome: ComparisonOutcome) -> DuelResult<ComparisonRecord> {
        outcome.result()?;
        let record = ComparisonRecord {
            id: Uuid::new_v4(),
            outcome,
        };

        let mut state = self.state.write();
        let pos = state.records.len();
        state.records.push(record.clone());
        state.by_id.insert(record.id, pos);
        for entity in [outcome.entity_a, outcome.entity_b] {
            state.by_entity.entry(entity).or_default().push(pos);
        }
        drop(state);

        debug!(
            comparison_id = %record.id,
            entity_a = %outcome.entity_a,
            entity_b = %outcome.entity_b,
            "comparison stored"
        );
        Ok(record)
    }

    pub fn get(&self, id: Uuid) -> Option<ComparisonRecord> {
        let state = self.state.read();
        state.by_id.get(&id).map(|&pos| state.records[pos].clone())
    }

    pub fn list(&self, query: &ComparisonQuery) -> DuelResult<Vec<ComparisonRecord>> {
        if query.limit == 0 || query.limit > MAX_PAGE_SIZE {
            return Err(DuelError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let state = self.state.read();
        let page = match query.entity {
            Some(entity) => state
                .involving(entity)
                .skip(query.skip)
                .take(query.limit)
                .cloned()
                .collect(),
            None => state
                .records
                .iter()
                .rev()
                .skip(query.skip)
                .take(query.limit)
                .cloned()
                .collect(),
        };
        Ok(page)
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}

impl Default for MemoryComparisonLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonHistory for MemoryComparisonLog {
    /// Walks only the entity's own last `limit` comparisons.
    fn recent_opponents(&self, entity: EntityId, limit: usize) -> DuelResult<HashSet<EntityId>> {
        Ok(self
            .state
            .read()
            .involving(entity)
            .take(limit)
            .filter_map(|r| r.outcome.opponent_of(entity))
            .collect())
    }
}
