use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use tracing::{info, warn};

use psxg_team_model::db::Database;
use psxg_team_model::{Config, TeamModel};

fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path, &config.shots_table)?;
    info!("Database opened: {}", config.database_path);

    let matches = db.load_matches()?;
    let shots = db.load_shots()?;
    info!("Loaded {} matches and {} shots", matches.len(), shots.len());

    let seed = config.seed.unwrap_or_else(rand::random);
    info!("Resimulation seed: {} (pass --seed to replay)", seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut model = TeamModel::new(config.fit_config(), config.window_days, config.simulations);
    let today = Utc::now().date_naive();
    let summary = model.fit_models(&matches, &shots, today, &mut rng);

    if let Some(warning) = &summary.warning {
        warn!("Fitted parameters may be unreliable: {}", warning);
    }
    if !summary.data_gaps.is_empty() {
        info!(
            "{} match(es) used without resimulation or flagged as suspect",
            summary.data_gaps.len()
        );
    }
    info!(
        "Fitted {} teams from {} matches ({} records), objective {:.4}",
        summary.teams, summary.matches, summary.records, summary.objective
    );

    let strengths = model.team_strengths(&config.exclude_teams)?;
    println!("{}", serde_json::to_string_pretty(&strengths)?);

    if let Some(fixture) = &config.predict {
        let (home, away) = (&fixture[0], &fixture[1]);
        let expected = model.predict_match(home, away)?;
        let outcome = model.predict_outcome(home, away)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "expected_goals": expected,
                "outcome": outcome,
            }))?
        );
    }

    Ok(())
}
