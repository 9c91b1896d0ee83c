use thiserror::Error;

use crate::types::EntityId;

pub type DuelResult<T> = Result<T, DuelError>;

#[derive(Error, Debug)]
pub enum DuelError {
    /// Fewer than two entities exist. Callers should surface this as a
    /// "need more data" state rather than retry.
    #[error("Not enough entities for a comparison: {available} available, need at least 2")]
    NotEnoughEntities { available: usize },

    #[error("Entity {0} not found")]
    UnknownEntity(EntityId),

    #[error("No bandit arm for entity {0}")]
    UnknownArm(EntityId),

    #[error("Winner {winner} is not one of the compared entities ({entity_a}, {entity_b})")]
    InvalidWinner {
        winner: EntityId,
        entity_a: EntityId,
        entity_b: EntityId,
    },

    #[error("Entity {0} cannot be compared with itself")]
    SelfComparison(EntityId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    /// Neither the rating update nor the bandit update of a comparison was
    /// applied. Any rating already written has been restored.
    #[error("Outcome for ({entity_a}, {entity_b}) not applied: {reason}")]
    OutcomeNotApplied {
        entity_a: EntityId,
        entity_b: EntityId,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for DuelError {
    fn from(err: config::ConfigError) -> Self {
        DuelError::Config(err.to_string())
    }
}
