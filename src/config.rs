use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::model::optimizer::OptimizerConfig;

/// Fit Dixon-Coles team strengths on PSxG-resimulated match results
#[derive(Parser, Debug, Clone)]
#[command(name = "psxg-team-model", version, about)]
pub struct Config {
    /// SQLite database holding the shot table
    #[arg(long, env = "DATABASE_PATH", default_value = "team_model_db.db")]
    pub database_path: String,

    /// Table with one row per shot event
    #[arg(long, env = "SHOTS_TABLE", default_value = "prem_data")]
    pub shots_table: String,

    /// Only matches played within this many days are fitted
    #[arg(long, env = "WINDOW_DAYS", default_value = "365")]
    pub window_days: u32,

    /// Shot-level resimulations per match (0 fits on real results only)
    #[arg(long, env = "N_SIMULATIONS", default_value = "25")]
    pub simulations: u32,

    /// Time decay rate per day (weight = 1 / (1 + epsilon * days))
    #[arg(long, env = "EPSILON", default_value = "0.0065")]
    pub epsilon: f64,

    /// Multiplier applied once per season of age
    #[arg(long, env = "SEASON_PENALTY", default_value = "0.75")]
    pub season_penalty: f64,

    /// Optimizer iteration cap
    #[arg(long, env = "MAX_ITERATIONS", default_value = "15000")]
    pub max_iterations: usize,

    /// Seed for the resimulation random stream (random when omitted)
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,

    /// Team to leave out of the strength table (repeatable)
    #[arg(long = "exclude-team")]
    pub exclude_teams: Vec<String>,

    /// Print expected goals for a fixture: --predict HOME AWAY
    #[arg(long, num_args = 2, value_names = ["HOME", "AWAY"])]
    pub predict: Option<Vec<String>>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_days == 0 {
            anyhow::bail!("window_days must be positive");
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            anyhow::bail!("epsilon must be non-negative");
        }
        if !(self.season_penalty > 0.0 && self.season_penalty <= 1.0) {
            anyhow::bail!("season_penalty must be in (0, 1]");
        }
        if self.max_iterations == 0 {
            anyhow::bail!("max_iterations must be positive");
        }
        Ok(())
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            epsilon: self.epsilon,
            season_penalty: self.season_penalty,
            optimizer: OptimizerConfig {
                max_iterations: self.max_iterations,
                ..OptimizerConfig::default()
            },
            ..FitConfig::default()
        }
    }
}

/// Box constraints on the fitted parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub home_advantage: (f64, f64),
    pub rho: (f64, f64),
    /// Applies to every attack and defense rating
    pub rating: (f64, f64),
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            home_advantage: (0.5, 2.0),
            rho: (-0.3, 0.3),
            rating: (0.1, 3.0),
        }
    }
}

/// Starting point for the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialGuess {
    pub home_advantage: f64,
    pub rho: f64,
    pub rating: f64,
}

impl Default for InitialGuess {
    fn default() -> Self {
        InitialGuess {
            home_advantage: 1.2,
            rho: 0.1,
            rating: 1.0,
        }
    }
}

/// Model settings passed into every fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub epsilon: f64,
    pub season_penalty: f64,
    pub initial: InitialGuess,
    pub bounds: Bounds,
    pub optimizer: OptimizerConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            epsilon: 0.0065,
            season_penalty: 0.75,
            initial: InitialGuess::default(),
            bounds: Bounds::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}
