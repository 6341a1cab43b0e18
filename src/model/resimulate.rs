//! Shot-level resimulation of played matches.
//!
//! Each real match with shot data is replayed `n_simulations` times: every
//! shot is an independent Bernoulli trial with its PSxG as the scoring
//! probability. The synthetic scorelines enter the likelihood with weight
//! `1 / n_simulations` each, so together they count as much as the real
//! result, damping the influence of finishing luck and one-off events.

use std::collections::HashMap;

use rand::Rng;
use tracing::{info, warn};

use crate::db::models::{MatchRecord, ShotRecord};
use crate::error::DataGapError;

#[derive(Debug, Clone)]
pub struct ResimulationReport {
    /// Every input match (weight reset to 1.0) followed by its synthetic copies
    pub matches: Vec<MatchRecord>,
    /// Matches that stayed as a single real observation
    pub gaps: Vec<DataGapError>,
}

impl ResimulationReport {
    pub fn synthetic_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_simulation()).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Resimulator {
    n_simulations: u32,
}

impl Resimulator {
    pub fn new(n_simulations: u32) -> Self {
        Resimulator { n_simulations }
    }

    pub fn n_simulations(&self) -> u32 {
        self.n_simulations
    }

    /// Expand `matches` with resimulated copies drawn from `shots`.
    ///
    /// The input slices are left untouched; the randomness comes solely from
    /// `rng`, so a seeded generator reproduces the same expansion. With zero
    /// simulations only the real matches come back and no gaps are reported,
    /// since no match needs shot data.
    pub fn resimulate<R: Rng + ?Sized>(
        &self,
        matches: &[MatchRecord],
        shots: &[ShotRecord],
        rng: &mut R,
    ) -> ResimulationReport {
        let shots_by_match = index_shots(shots);

        let mut expanded: Vec<MatchRecord> = matches
            .iter()
            .cloned()
            .map(|mut m| {
                if !m.is_simulation() {
                    m.weight = 1.0;
                }
                m
            })
            .collect();
        let mut gaps = Vec::new();

        if self.n_simulations == 0 {
            info!("Resimulation disabled: fitting {} real matches only", expanded.len());
            return ResimulationReport { matches: expanded, gaps };
        }
        let sim_weight = 1.0 / f64::from(self.n_simulations);

        for m in matches.iter().filter(|m| !m.is_simulation()) {
            let Some(match_id) = m.match_id.as_deref() else {
                gaps.push(DataGapError::MissingMatchId {
                    home_team: m.home_team.clone(),
                    away_team: m.away_team.clone(),
                });
                continue;
            };
            let Some(match_shots) = shots_by_match.get(match_id) else {
                gaps.push(DataGapError::NoShots {
                    match_id: match_id.to_string(),
                });
                continue;
            };

            let home_probs: Vec<f64> = match_shots
                .iter()
                .filter(|s| s.team == m.home_team)
                .map(|s| s.goal_probability())
                .collect();
            let away_probs: Vec<f64> = match_shots
                .iter()
                .filter(|s| s.team == m.away_team)
                .map(|s| s.goal_probability())
                .collect();

            for i in 0..self.n_simulations {
                let mut sim = m.clone();
                sim.home_goals = simulate_goals(&home_probs, rng);
                sim.away_goals = simulate_goals(&away_probs, rng);
                sim.simulation_id = Some(i);
                sim.weight = sim_weight;
                expanded.push(sim);
            }
        }

        for gap in &gaps {
            warn!("{}", gap);
        }
        info!(
            "Resimulated {} matches ({} simulations each): expanded from {} to {} records",
            matches.len() - gaps.len(),
            self.n_simulations,
            matches.len(),
            expanded.len()
        );

        ResimulationReport {
            matches: expanded,
            gaps,
        }
    }
}

fn index_shots(shots: &[ShotRecord]) -> HashMap<&str, Vec<&ShotRecord>> {
    let mut by_match: HashMap<&str, Vec<&ShotRecord>> = HashMap::new();
    for shot in shots {
        by_match.entry(shot.match_id.as_str()).or_default().push(shot);
    }
    by_match
}

/// Poisson-binomial draw: one uniform per shot, a goal when it falls below
/// the shot's probability.
pub fn simulate_goals<R: Rng + ?Sized>(probabilities: &[f64], rng: &mut R) -> u32 {
    probabilities
        .iter()
        .filter(|&&p| rng.gen::<f64>() < p)
        .count() as u32
}
