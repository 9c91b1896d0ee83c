//! In-process entity and comparison stores implementing the pairing
//! engine's collaborator traits.

#![warn(clippy::unwrap_used)]

pub mod comparisons;
pub mod entities;

pub use comparisons::{ComparisonQuery, ComparisonRecord, MemoryComparisonLog};
pub use entities::{Entity, EntityUpdate, MemoryEntityStore, NewEntity};
