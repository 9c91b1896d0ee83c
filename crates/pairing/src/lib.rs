//! Adaptive pairing engine. Picks the next two entities to compare with a
//! UCB1 bandit plus a rating-proximity heuristic, and folds each comparison
//! back into Elo ratings and bandit statistics.

#![warn(clippy::unwrap_used)]

pub mod bandit;
pub mod engine;
pub mod rating;
pub mod recency;
pub mod selector;

pub use bandit::BanditStatsStore;
pub use engine::{OutcomeReport, PairingEngine};
pub use recency::RecencyTracker;
pub use selector::{Candidate, PairSelector, SelectorConfig};
