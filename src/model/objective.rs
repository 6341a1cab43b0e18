//! Weighted Dixon-Coles negative log-likelihood.
//!
//! Parameter vector layout: `[home_advantage, rho, attack_1..attack_k,
//! defense_1..defense_k]`, teams in the order of the team list given to
//! [`Objective::new`].

use std::collections::HashMap;

use tracing::warn;

use super::preprocess::FitMetadata;
use super::probability::{dc_probability, dc_tau};
use crate::db::models::MatchRecord;

/// Smallest probability allowed into the log.
pub const PROBABILITY_FLOOR: f64 = 1e-10;

/// Index arithmetic for the flat parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamLayout {
    pub n_teams: usize,
}

impl ParamLayout {
    pub const HOME_ADVANTAGE: usize = 0;
    pub const RHO: usize = 1;

    pub fn new(n_teams: usize) -> Self {
        ParamLayout { n_teams }
    }

    pub fn n_params(&self) -> usize {
        2 + 2 * self.n_teams
    }

    pub fn attack(&self, team: usize) -> usize {
        2 + team
    }

    pub fn defense(&self, team: usize) -> usize {
        2 + self.n_teams + team
    }

    pub fn attacks<'a>(&self, params: &'a [f64]) -> &'a [f64] {
        &params[2..2 + self.n_teams]
    }

    pub fn defenses<'a>(&self, params: &'a [f64]) -> &'a [f64] {
        &params[2 + self.n_teams..2 + 2 * self.n_teams]
    }
}

/// Recency and season weight of one match, before the resimulation weight.
///
/// `1 / (1 + epsilon * days_ago)`, multiplied by `season_penalty^seasons_ago`
/// for matches from earlier seasons.
pub fn time_weight(m: &MatchRecord, metadata: &FitMetadata, epsilon: f64, season_penalty: f64) -> f64 {
    let days_ago = m.days_from_ref.or_else(|| match (metadata.reference_date, m.match_date) {
        (Some(reference), Some(date)) => Some((reference - date).num_days().max(0)),
        _ => None,
    });
    let mut weight = match days_ago {
        Some(days) => 1.0 / (1.0 + epsilon * days as f64),
        None => 1.0,
    };

    let seasons_ago = match (metadata.current_season, m.season) {
        (Some(current), Some(season)) => current - season,
        _ => 0,
    };
    if seasons_ago > 0 {
        weight *= season_penalty.powi(seasons_ago);
    }
    weight
}

#[derive(Debug, Clone, Copy)]
struct Term {
    home: usize,
    away: usize,
    home_goals: u32,
    away_goals: u32,
    weight: f64,
}

/// The function minimised by the fitter. Weights are resolved once at
/// construction; evaluation only reads the parameter vector.
#[derive(Debug, Clone)]
pub struct Objective {
    layout: ParamLayout,
    terms: Vec<Term>,
}

impl Objective {
    pub fn new(
        matches: &[MatchRecord],
        teams: &[String],
        metadata: &FitMetadata,
        epsilon: f64,
        season_penalty: f64,
    ) -> Self {
        let index: HashMap<&str, usize> = teams
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let mut terms = Vec::with_capacity(matches.len());
        for m in matches {
            let (Some(&home), Some(&away)) = (
                index.get(m.home_team.as_str()),
                index.get(m.away_team.as_str()),
            ) else {
                warn!(
                    "Skipping {} v {}: team missing from the fitted team list",
                    m.home_team, m.away_team
                );
                continue;
            };
            terms.push(Term {
                home,
                away,
                home_goals: m.home_goals,
                away_goals: m.away_goals,
                weight: time_weight(m, metadata, epsilon, season_penalty) * m.weight,
            });
        }

        Objective {
            layout: ParamLayout::new(teams.len()),
            terms,
        }
    }

    pub fn layout(&self) -> ParamLayout {
        self.layout
    }

    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Negative weighted log-likelihood plus the sum-to-k identifiability
    /// penalty on attack and defense.
    pub fn value(&self, params: &[f64]) -> f64 {
        let home_advantage = params[ParamLayout::HOME_ADVANTAGE];
        let rho = params[ParamLayout::RHO];
        let attack = self.layout.attacks(params);
        let defense = self.layout.defenses(params);

        let mut log_likelihood = 0.0;
        for t in &self.terms {
            let lambda_home = attack[t.home] * defense[t.away] * home_advantage;
            let lambda_away = attack[t.away] * defense[t.home];
            let p = dc_probability(t.home_goals, t.away_goals, lambda_home, lambda_away, rho);
            log_likelihood += t.weight * p.max(PROBABILITY_FLOOR).ln();
        }

        -log_likelihood + self.constraint_penalty(params)
    }

    /// Objective value, writing the analytic gradient into `grad`.
    pub fn value_and_gradient(&self, params: &[f64], grad: &mut [f64]) -> f64 {
        let layout = self.layout;
        let home_advantage = params[ParamLayout::HOME_ADVANTAGE];
        let rho = params[ParamLayout::RHO];
        let attack = layout.attacks(params);
        let defense = layout.defenses(params);

        grad.iter_mut().for_each(|g| *g = 0.0);

        let mut log_likelihood = 0.0;
        for t in &self.terms {
            let a_h = attack[t.home];
            let d_h = defense[t.home];
            let a_a = attack[t.away];
            let d_a = defense[t.away];
            let lambda_home = a_h * d_a * home_advantage;
            let lambda_away = a_a * d_h;

            let p = dc_probability(t.home_goals, t.away_goals, lambda_home, lambda_away, rho);
            if p <= PROBABILITY_FLOOR {
                log_likelihood += t.weight * PROBABILITY_FLOOR.ln();
                continue;
            }
            // Capped cell: log(1) = 0 and flat in every parameter
            if p >= 1.0 {
                continue;
            }
            log_likelihood += t.weight * p.ln();

            let tau = dc_tau(t.home_goals, t.away_goals, lambda_home, lambda_away, rho);
            let (dtau_lh, dtau_la, dtau_rho) = match (t.home_goals, t.away_goals) {
                (0, 0) => (0.0, 0.0, -1.0),
                (0, 1) => (rho, 0.0, lambda_home),
                (1, 0) => (0.0, rho, lambda_away),
                (1, 1) => (-rho * lambda_away, -rho * lambda_home, -lambda_home * lambda_away),
                _ => (0.0, 0.0, 0.0),
            };

            // d log p / d lambda for Poisson(k; lambda) is k / lambda - 1
            let dl_lh = f64::from(t.home_goals) / lambda_home - 1.0 + dtau_lh / tau;
            let dl_la = f64::from(t.away_goals) / lambda_away - 1.0 + dtau_la / tau;
            let dl_rho = dtau_rho / tau;

            // Gradient of the negated likelihood
            let w = -t.weight;
            grad[ParamLayout::HOME_ADVANTAGE] += w * dl_lh * a_h * d_a;
            grad[ParamLayout::RHO] += w * dl_rho;
            grad[layout.attack(t.home)] += w * dl_lh * d_a * home_advantage;
            grad[layout.defense(t.away)] += w * dl_lh * a_h * home_advantage;
            grad[layout.attack(t.away)] += w * dl_la * d_h;
            grad[layout.defense(t.home)] += w * dl_la * a_a;
        }

        let n = layout.n_teams as f64;
        let attack_excess = attack.iter().sum::<f64>() - n;
        let defense_excess = defense.iter().sum::<f64>() - n;
        for i in 0..layout.n_teams {
            grad[layout.attack(i)] += 2.0 * attack_excess;
            grad[layout.defense(i)] += 2.0 * defense_excess;
        }

        -log_likelihood + attack_excess.powi(2) + defense_excess.powi(2)
    }

    fn constraint_penalty(&self, params: &[f64]) -> f64 {
        let n = self.layout.n_teams as f64;
        let sum_attack: f64 = self.layout.attacks(params).iter().sum();
        let sum_defense: f64 = self.layout.defenses(params).iter().sum();
        (sum_attack - n).powi(2) + (sum_defense - n).powi(2)
    }
}
