//! duel: adaptive pairwise comparison driver.
//!
//! Loads configuration, then runs a simulated comparison session through the
//! pairing engine or checks the configuration.

mod report;
mod simulate;

use clap::{Parser, Subcommand};
use duel_core::config::AppConfig;
use tracing::{info, warn};

use crate::simulate::SimulationParams;

#[derive(Parser, Debug)]
#[command(name = "duel")]
#[command(about = "Adaptive pairwise comparison engine (UCB1 pairing + Elo ratings)")]
#[command(version)]
struct Cli {
    /// Optional TOML config file; `DUEL__*` environment variables override it
    #[arg(long, env = "DUEL_CONFIG")]
    config: Option<String>,

    /// Elo K-factor (overrides config)
    #[arg(long, env = "DUEL__ELO__K_FACTOR")]
    k_factor: Option<f64>,

    /// UCB exploration constant (overrides config)
    #[arg(long, env = "DUEL__UCB__EXPLORATION_CONSTANT")]
    exploration_constant: Option<f64>,

    /// Recent comparisons consulted per entity (overrides config)
    #[arg(long, env = "DUEL__PAIRING__RECENT_COMPARISON_LIMIT")]
    recent_limit: Option<usize>,

    /// Allow immediate rematches
    #[arg(long, default_value_t = false)]
    no_exclude_recent: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulated comparison session against hidden strengths
    Simulate {
        /// Number of entities to create
        #[arg(long, default_value_t = 12)]
        entities: usize,

        /// Total comparisons to run
        #[arg(long, default_value_t = 2_000)]
        comparisons: usize,

        /// Concurrent comparison workers
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Spread of hidden strengths around the initial rating
        #[arg(long, default_value_t = 800.0)]
        spread: f64,

        /// Probability that a comparison ends in a tie
        #[arg(long, default_value_t = 0.05)]
        tie_rate: f64,

        /// Seed for entity strengths, workers and the engine
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Print Prometheus metrics after the run
        #[arg(long, default_value_t = false)]
        metrics: bool,
    },
    /// Validate the effective configuration and print warnings
    CheckConfig,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "duel=info,duel_pairing=warn,duel_store=warn".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(k) = cli.k_factor {
        config.elo.k_factor = k;
    }
    if let Some(c) = cli.exploration_constant {
        config.ucb.exploration_constant = c;
    }
    if let Some(limit) = cli.recent_limit {
        config.pairing.recent_comparison_limit = limit;
    }
    if cli.no_exclude_recent {
        config.pairing.exclude_recent = false;
    }

    for warning in config.validate()? {
        warn!("{warning}");
    }

    info!(
        k_factor = config.elo.k_factor,
        initial_rating = config.elo.initial_rating,
        exploration_constant = config.ucb.exploration_constant,
        unexplored_weight = config.ucb.unexplored_weight,
        exclude_recent = config.pairing.exclude_recent,
        recent_limit = config.pairing.recent_comparison_limit,
        "Configuration loaded"
    );

    match cli.command {
        Command::CheckConfig => {
            println!("configuration ok");
        }
        Command::Simulate {
            entities,
            comparisons,
            workers,
            spread,
            tie_rate,
            seed,
            json,
            metrics,
        } => {
            let recorder = if metrics {
                Some(metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?)
            } else {
                None
            };

            let params = SimulationParams {
                entities,
                comparisons,
                workers,
                spread,
                tie_rate,
                seed,
            };
            let report = simulate::run(&config, &params).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report::print(&report);
            }
            if let Some(handle) = recorder {
                println!("{}", handle.render());
            }
        }
    }

    Ok(())
}
