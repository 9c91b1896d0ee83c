//! Collaborator seams consumed by the pairing engine. Persistence lives
//! behind these traits; the engine never owns entity or comparison records.

use std::collections::HashSet;

use crate::error::DuelResult;
use crate::types::{EntityId, EntityRef};

/// Entity lookup and rating persistence.
pub trait EntityRepository: Send + Sync {
    /// All entities, in a stable enumeration order.
    fn list_entities(&self) -> DuelResult<Vec<EntityRef>>;

    fn get_entity(&self, id: EntityId) -> DuelResult<Option<EntityRef>>;

    fn set_rating(&self, id: EntityId, rating: f64) -> DuelResult<()>;
}

/// Read access to comparison history.
pub trait ComparisonHistory: Send + Sync {
    /// Opponents of `entity` across its last `limit` comparisons.
    fn recent_opponents(&self, entity: EntityId, limit: usize) -> DuelResult<HashSet<EntityId>>;
}
