use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::objective::{Objective, ParamLayout};
use super::optimizer::{minimize, Termination};
use super::params::ModelParameters;
use super::preprocess::FitMetadata;
use crate::config::FitConfig;
use crate::db::models::MatchRecord;
use crate::error::NonConvergenceWarning;

/// Result of one optimizer run. The parameters are the best iterate even
/// when the optimizer did not converge.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub parameters: ModelParameters,
    pub objective: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

impl FitOutcome {
    pub fn converged(&self) -> bool {
        self.termination.converged()
    }

    pub fn warning(&self) -> Option<NonConvergenceWarning> {
        if self.converged() {
            return None;
        }
        Some(NonConvergenceWarning {
            iterations: self.iterations,
            objective: self.objective,
            reason: self.termination.describe().to_string(),
        })
    }
}

/// Every team appearing in `matches`, sorted.
pub fn unique_teams(matches: &[MatchRecord]) -> Vec<String> {
    matches
        .iter()
        .flat_map(|m| [m.home_team.as_str(), m.away_team.as_str()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Fit home advantage, rho and per-team ratings to `matches`.
///
/// `teams` fixes the parameter order; matches involving teams outside it are
/// ignored. The returned parameters are freshly built, nothing is shared
/// with a previous fit.
pub fn fit(matches: &[MatchRecord], teams: &[String], metadata: &FitMetadata, config: &FitConfig) -> FitOutcome {
    info!("Optimizing for {} matches with {} teams", matches.len(), teams.len());
    for (i, m) in matches.iter().take(3).enumerate() {
        debug!("Match {}: {:?}", i, m);
    }

    let objective = Objective::new(matches, teams, metadata, config.epsilon, config.season_penalty);
    let layout = objective.layout();

    let mut x0 = vec![config.initial.rating; layout.n_params()];
    x0[ParamLayout::HOME_ADVANTAGE] = config.initial.home_advantage;
    x0[ParamLayout::RHO] = config.initial.rho;

    let mut bounds = vec![config.bounds.rating; layout.n_params()];
    bounds[ParamLayout::HOME_ADVANTAGE] = config.bounds.home_advantage;
    bounds[ParamLayout::RHO] = config.bounds.rho;

    let result = minimize(
        |x, grad| objective.value_and_gradient(x, grad),
        &x0,
        &bounds,
        &config.optimizer,
    );

    info!(
        "Optimization success: {} ({}), final objective {:.4}, {} iterations, {} evaluations",
        result.converged(),
        result.termination.describe(),
        result.value,
        result.iterations,
        result.evaluations
    );

    let outcome = FitOutcome {
        parameters: ModelParameters::from_params(teams, &result.x),
        objective: result.value,
        iterations: result.iterations,
        evaluations: result.evaluations,
        termination: result.termination,
    };
    if let Some(warning) = outcome.warning() {
        warn!("{}", warning);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::optimizer::OptimizerConfig;
    use crate::model::probability::poisson_pmf;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()
    }

    fn two_teams() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    /// Every scoreline up to 10-10 for both fixtures, weighted by its exact
    /// frequency under independent Poisson(1.3) / Poisson(1.0) scoring.
    fn expected_frequency_league(matches_per_fixture: f64) -> Vec<MatchRecord> {
        let mut matches = Vec::new();
        for (home, away) in [("A", "B"), ("B", "A")] {
            for h in 0..=10 {
                for a in 0..=10 {
                    let mut m = MatchRecord::new(format!("{home}{away}{h}{a}"), home, away, date(), 2024, h, a);
                    m.weight = matches_per_fixture * poisson_pmf(h, 1.3) * poisson_pmf(a, 1.0);
                    matches.push(m);
                }
            }
        }
        matches
    }

    fn sample_poisson<R: Rng>(lambda: f64, rng: &mut R) -> u32 {
        let limit = (-lambda).exp();
        let mut product: f64 = rng.gen();
        let mut k = 0;
        while product > limit {
            product *= rng.gen::<f64>();
            k += 1;
        }
        k
    }

    #[test]
    fn recovers_symmetric_two_team_league() {
        let matches = expected_frequency_league(500.0);
        let outcome = fit(&matches, &two_teams(), &FitMetadata::default(), &FitConfig::default());

        assert!(outcome.converged(), "{:?}", outcome.termination);
        let p = &outcome.parameters;
        assert_relative_eq!(p.home_advantage, 1.3, epsilon = 0.05);
        assert_relative_eq!(p.rho, 0.0, epsilon = 0.05);
        for (_, r) in p.ratings.iter() {
            assert_relative_eq!(r.attack, 1.0, epsilon = 0.05);
            assert_relative_eq!(r.defense, 1.0, epsilon = 0.05);
        }
    }

    #[test]
    fn recovers_sampled_two_team_league() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut matches = Vec::new();
        for i in 0..4000 {
            let (home, away) = if i % 2 == 0 { ("A", "B") } else { ("B", "A") };
            let hg = sample_poisson(1.3, &mut rng);
            let ag = sample_poisson(1.0, &mut rng);
            matches.push(MatchRecord::new(format!("m{i}"), home, away, date(), 2024, hg, ag));
        }

        let outcome = fit(&matches, &two_teams(), &FitMetadata::default(), &FitConfig::default());
        let p = &outcome.parameters;
        assert_relative_eq!(p.home_advantage, 1.3, epsilon = 0.15);
        assert!(p.rho.abs() < 0.15, "rho {}", p.rho);
        for (_, r) in p.ratings.iter() {
            assert_relative_eq!(r.attack, 1.0, epsilon = 0.15);
            assert_relative_eq!(r.defense, 1.0, epsilon = 0.15);
        }
    }

    #[test]
    fn single_match_respects_bounds_and_scale_constraint() {
        let matches = vec![MatchRecord::new("m1", "A", "B", date(), 2024, 2, 1)];
        let outcome = fit(&matches, &two_teams(), &FitMetadata::default(), &FitConfig::default());
        let p = &outcome.parameters;

        assert!((0.5..=2.0).contains(&p.home_advantage));
        assert!((-0.3..=0.3).contains(&p.rho));
        let (sum_attack, sum_defense) = p
            .ratings
            .iter()
            .fold((0.0, 0.0), |(a, d), (_, r)| (a + r.attack, d + r.defense));
        assert_relative_eq!(sum_attack, 2.0, epsilon = 0.3);
        assert_relative_eq!(sum_defense, 2.0, epsilon = 0.3);
        for (_, r) in p.ratings.iter() {
            assert!((0.1..=3.0).contains(&r.attack));
            assert!((0.1..=3.0).contains(&r.defense));
        }
    }

    #[test]
    fn iteration_cap_returns_best_iterate_with_warning() {
        let matches = expected_frequency_league(50.0);
        let config = FitConfig {
            optimizer: OptimizerConfig {
                max_iterations: 1,
                ..OptimizerConfig::default()
            },
            ..FitConfig::default()
        };
        let outcome = fit(&matches, &two_teams(), &FitMetadata::default(), &config);
        assert!(!outcome.converged());
        let warning = outcome.warning().expect("non-convergence is reported");
        assert_eq!(warning.iterations, 1);
        assert_eq!(outcome.parameters.ratings.len(), 2);
    }

    #[test]
    fn unique_teams_sorted_and_deduplicated() {
        let matches = vec![
            MatchRecord::new("1", "Wolves", "Arsenal", date(), 2024, 0, 2),
            MatchRecord::new("2", "Arsenal", "Brentford", date(), 2024, 1, 1),
        ];
        assert_eq!(unique_teams(&matches), vec!["Arsenal", "Brentford", "Wolves"]);
    }
}
