#![warn(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod repository;
pub mod types;

pub use config::AppConfig;
pub use error::{DuelError, DuelResult};
pub use repository::{ComparisonHistory, EntityRepository};
pub use types::{
    ArmStats, BanditArmState, ComparisonOutcome, EntityId, EntityRef, MatchResult,
};
