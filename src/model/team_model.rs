use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use super::fitter::{fit, unique_teams, FitOutcome};
use super::optimizer::Termination;
use super::params::ModelParameters;
use super::preprocess::preprocess;
use super::probability::{outcome_probabilities, OutcomeProbabilities, DEFAULT_MAX_GOALS};
use super::resimulate::Resimulator;
use crate::config::FitConfig;
use crate::db::models::{MatchRecord, ShotRecord};
use crate::error::{DataGapError, ModelError, NonConvergenceWarning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unfitted,
    Fitted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedGoals {
    pub home_team: String,
    pub away_team: String,
    pub home_goals: f64,
    pub away_goals: f64,
}

/// Diagnostic row for one team, measured against a league-average opponent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStrength {
    pub team: String,
    pub attack: f64,
    pub defense: f64,
    /// ln(attack) - ln(defense)
    pub log_strength: f64,
    /// attack - defense
    pub abs_strength: f64,
    /// Goals scored against average defense
    pub xg_vs_avg: f64,
    /// Goals conceded to average attack
    pub xga_vs_avg: f64,
    pub goal_diff_vs_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrengthTable {
    pub league_avg_attack: f64,
    pub league_avg_defense: f64,
    pub home_advantage: f64,
    pub rho: f64,
    /// Resimulations per match used by the fit, 0 for real results only
    pub n_simulations: u32,
    /// Best first, by goal difference against an average side
    pub teams: Vec<TeamStrength>,
}

/// What happened during one call to [`TeamModel::fit_models`].
#[derive(Debug, Clone)]
pub struct FitSummary {
    /// Real matches inside the window
    pub matches: usize,
    /// Real plus synthetic records given to the optimizer
    pub records: usize,
    pub teams: usize,
    pub objective: f64,
    pub iterations: usize,
    pub termination: Termination,
    pub warning: Option<NonConvergenceWarning>,
    /// Future-dated matches and matches that could not be resimulated
    pub data_gaps: Vec<DataGapError>,
}

/// Dixon-Coles team model fitted on resimulated results.
///
/// Starts unfitted; the first `fit_models` call moves it to fitted and later
/// calls replace the parameters wholesale.
#[derive(Debug, Clone)]
pub struct TeamModel {
    config: FitConfig,
    window_days: u32,
    resimulator: Resimulator,
    parameters: Option<ModelParameters>,
}

impl TeamModel {
    pub fn new(config: FitConfig, window_days: u32, n_simulations: u32) -> Self {
        TeamModel {
            config,
            window_days,
            resimulator: Resimulator::new(n_simulations),
            parameters: None,
        }
    }

    pub fn state(&self) -> ModelState {
        match self.parameters {
            Some(_) => ModelState::Fitted,
            None => ModelState::Unfitted,
        }
    }

    pub fn parameters(&self) -> Option<&ModelParameters> {
        self.parameters.as_ref()
    }

    /// Preprocess, resimulate and fit, then swap the new parameters in.
    ///
    /// `today` anchors the trailing window. The model is only touched once
    /// the optimizer has finished, whether or not it converged.
    pub fn fit_models<R: Rng + ?Sized>(
        &mut self,
        matches: &[MatchRecord],
        shots: &[ShotRecord],
        today: NaiveDate,
        rng: &mut R,
    ) -> FitSummary {
        let prepared = preprocess(matches, self.window_days, today);
        let resimulated = self.resimulator.resimulate(&prepared.matches, shots, rng);
        let teams = unique_teams(&resimulated.matches);

        let outcome = fit(&resimulated.matches, &teams, &prepared.metadata, &self.config);
        let warning = outcome.warning();
        let FitOutcome {
            parameters,
            objective,
            iterations,
            termination,
            ..
        } = outcome;

        self.parameters = Some(parameters);
        info!(
            "Model fitted on {} teams ({} simulations per match)",
            teams.len(),
            self.resimulator.n_simulations()
        );

        let mut data_gaps = prepared.future_dated;
        data_gaps.extend(resimulated.gaps);
        FitSummary {
            matches: prepared.matches.len(),
            records: resimulated.matches.len(),
            teams: teams.len(),
            objective,
            iterations,
            termination,
            warning,
            data_gaps,
        }
    }

    /// Install parameters produced elsewhere, e.g. by a direct [`fit`] call.
    pub fn set_parameters(&mut self, parameters: ModelParameters) {
        self.parameters = Some(parameters);
    }

    fn fitted(&self) -> Result<&ModelParameters, ModelError> {
        self.parameters.as_ref().ok_or(ModelError::NotFitted)
    }

    pub fn predict_match(&self, home_team: &str, away_team: &str) -> Result<ExpectedGoals, ModelError> {
        let (home_goals, away_goals) = self.fitted()?.expected_goals(home_team, away_team)?;
        Ok(ExpectedGoals {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_goals,
            away_goals,
        })
    }

    /// Home / draw / away probabilities from the fitted Dixon-Coles grid.
    pub fn predict_outcome(&self, home_team: &str, away_team: &str) -> Result<OutcomeProbabilities, ModelError> {
        let params = self.fitted()?;
        let (lambda_home, lambda_away) = params.expected_goals(home_team, away_team)?;
        Ok(outcome_probabilities(lambda_home, lambda_away, params.rho, DEFAULT_MAX_GOALS))
    }

    /// Rank teams by goal difference against a league-average opponent.
    ///
    /// Averages are taken over the included teams only; with every team
    /// excluded they fall back to 1.0 and the table is empty.
    pub fn team_strengths(&self, exclude_teams: &[String]) -> Result<StrengthTable, ModelError> {
        let params = self.fitted()?;
        let included: Vec<_> = params
            .ratings
            .iter()
            .filter(|(team, _)| !exclude_teams.iter().any(|e| e.as_str() == *team))
            .collect();

        let n = included.len() as f64;
        let (avg_attack, avg_defense) = if included.is_empty() {
            (1.0, 1.0)
        } else {
            let attack: f64 = included.iter().map(|(_, r)| r.attack).sum();
            let defense: f64 = included.iter().map(|(_, r)| r.defense).sum();
            (attack / n, defense / n)
        };

        let mut teams: Vec<TeamStrength> = included
            .into_iter()
            .map(|(team, r)| {
                let xg_vs_avg = r.attack * avg_defense;
                let xga_vs_avg = avg_attack * r.defense;
                TeamStrength {
                    team: team.to_string(),
                    attack: r.attack,
                    defense: r.defense,
                    log_strength: r.attack.ln() - r.defense.ln(),
                    abs_strength: r.attack - r.defense,
                    xg_vs_avg,
                    xga_vs_avg,
                    goal_diff_vs_avg: xg_vs_avg - xga_vs_avg,
                }
            })
            .collect();
        teams.sort_by(|a, b| {
            b.goal_diff_vs_avg
                .total_cmp(&a.goal_diff_vs_avg)
                .then_with(|| a.team.cmp(&b.team))
        });

        Ok(StrengthTable {
            league_avg_attack: avg_attack,
            league_avg_defense: avg_defense,
            home_advantage: params.home_advantage,
            rho: params.rho,
            n_simulations: self.resimulator.n_simulations(),
            teams,
        })
    }
}
