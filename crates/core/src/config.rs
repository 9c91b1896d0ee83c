use serde::Deserialize;

use crate::error::{DuelError, DuelResult};

/// Root configuration. Loaded from environment variables with the prefix
/// `DUEL__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub elo: EloConfig,
    #[serde(default)]
    pub ucb: UcbConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EloConfig {
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,
    #[serde(default = "default_initial_rating")]
    pub initial_rating: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UcbConfig {
    /// `C` in `mean + C * sqrt(2 ln N / n)`.
    #[serde(default = "default_exploration_constant")]
    pub exploration_constant: f64,
    /// Sampling weight of an arm with zero trials.
    #[serde(default = "default_unexplored_weight")]
    pub unexplored_weight: f64,
}

/// Second-entity scoring. The three weights conventionally sum to 1.
#[derive(Debug, Clone, Deserialize)]
pub struct PairingConfig {
    #[serde(default = "default_ucb_weight")]
    pub ucb_weight: f64,
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,
    #[serde(default = "default_random_weight")]
    pub random_weight: f64,
    /// Rating gap at which the similarity bonus drops to zero.
    #[serde(default = "default_rating_threshold")]
    pub rating_threshold: f64,
    #[serde(default = "default_exclude_recent")]
    pub exclude_recent: bool,
    #[serde(default = "default_recent_comparison_limit")]
    pub recent_comparison_limit: usize,
}

// Default functions
fn default_k_factor() -> f64 {
    32.0
}
fn default_initial_rating() -> f64 {
    1500.0
}
fn default_exploration_constant() -> f64 {
    1.414
}
fn default_unexplored_weight() -> f64 {
    1000.0
}
fn default_ucb_weight() -> f64 {
    0.3
}
fn default_similarity_weight() -> f64 {
    0.4
}
fn default_random_weight() -> f64 {
    0.3
}
fn default_rating_threshold() -> f64 {
    200.0
}
fn default_exclude_recent() -> bool {
    true
}
fn default_recent_comparison_limit() -> usize {
    5
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: default_k_factor(),
            initial_rating: default_initial_rating(),
        }
    }
}

impl Default for UcbConfig {
    fn default() -> Self {
        Self {
            exploration_constant: default_exploration_constant(),
            unexplored_weight: default_unexplored_weight(),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            ucb_weight: default_ucb_weight(),
            similarity_weight: default_similarity_weight(),
            random_weight: default_random_weight(),
            rating_threshold: default_rating_threshold(),
            exclude_recent: default_exclude_recent(),
            recent_comparison_limit: default_recent_comparison_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (which take precedence).
    pub fn load_from(path: Option<&str>) -> DuelResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("DUEL")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Check value ranges. Hard failures come back as `DuelError::Config`;
    /// suspicious but usable settings come back as warnings.
    pub fn validate(&self) -> DuelResult<Vec<String>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let numbers = [
            ("elo.k_factor", self.elo.k_factor),
            ("elo.initial_rating", self.elo.initial_rating),
            ("ucb.exploration_constant", self.ucb.exploration_constant),
            ("ucb.unexplored_weight", self.ucb.unexplored_weight),
            ("pairing.ucb_weight", self.pairing.ucb_weight),
            ("pairing.similarity_weight", self.pairing.similarity_weight),
            ("pairing.random_weight", self.pairing.random_weight),
            ("pairing.rating_threshold", self.pairing.rating_threshold),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                errors.push(format!("{name} must be a finite number"));
            }
        }

        if self.elo.k_factor <= 0.0 {
            errors.push("elo.k_factor must be positive".to_string());
        } else if self.elo.k_factor > 100.0 {
            warnings.push(format!(
                "elo.k_factor ({}) is unusually high",
                self.elo.k_factor
            ));
        }

        if self.ucb.exploration_constant < 0.0 {
            errors.push("ucb.exploration_constant must not be negative".to_string());
        }
        if self.ucb.unexplored_weight <= 0.0 {
            errors.push("ucb.unexplored_weight must be positive".to_string());
        }
        if self.pairing.rating_threshold <= 0.0 {
            errors.push("pairing.rating_threshold must be positive".to_string());
        }

        let p = &self.pairing;
        if p.ucb_weight < 0.0 || p.similarity_weight < 0.0 || p.random_weight < 0.0 {
            errors.push("pairing weights must not be negative".to_string());
        }
        let weight_sum = p.ucb_weight + p.similarity_weight + p.random_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            warnings.push(format!(
                "pairing weights sum to {weight_sum:.3}, expected 1.0"
            ));
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(DuelError::Config(errors.join("; ")))
        }
    }
}
