//! Recent-opponent lookup used to avoid showing the same pair twice in a row.

use std::collections::HashSet;
use std::sync::Arc;

use duel_core::{ComparisonHistory, EntityId};
use tracing::warn;

pub struct RecencyTracker {
    history: Arc<dyn ComparisonHistory>,
    window: usize,
}

impl RecencyTracker {
    /// `window` is the number of most recent comparisons involving an
    /// entity that are consulted. Zero disables the lookup.
    pub fn new(history: Arc<dyn ComparisonHistory>, window: usize) -> Self {
        Self { history, window }
    }

    /// Entities paired with `entity` in its last `window` comparisons.
    ///
    /// A failing history lookup degrades to an empty set: selection then
    /// proceeds without recency exclusion instead of failing.
    pub fn recent_opponents(&self, entity: EntityId) -> HashSet<EntityId> {
        if self.window == 0 {
            return HashSet::new();
        }
        match self.history.recent_opponents(entity, self.window) {
            Ok(mut opponents) => {
                opponents.remove(&entity);
                opponents
            }
            Err(e) => {
                warn!(%entity, error = %e, "recent opponent lookup failed, skipping exclusion");
                metrics::counter!("pairing.recency_fallback").increment(1);
                HashSet::new()
            }
        }
    }
}
