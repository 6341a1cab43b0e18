//! Dixon-Coles scoreline probabilities.
//!
//! Goals for each side are independent Poisson variables, with a correction
//! factor τ applied to the four low-score cells (0-0, 0-1, 1-0, 1-1) to model
//! the excess of draws and narrow results seen in real football.

/// Default upper bound on goals per side when summing scoreline grids.
pub const DEFAULT_MAX_GOALS: u32 = 10;

/// Natural log of `k!`.
pub fn ln_factorial(k: u32) -> f64 {
    (2..=k).map(|i| (i as f64).ln()).sum()
}

/// Poisson probability mass `e^-λ λ^k / k!`.
pub fn poisson_pmf(k: u32, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    (k as f64 * lambda.ln() - lambda - ln_factorial(k)).exp()
}

/// Low-score correction factor τ.
pub fn dc_tau(home_goals: u32, away_goals: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - rho,
        (0, 1) => 1.0 + rho * lambda_home,
        (1, 0) => 1.0 + rho * lambda_away,
        (1, 1) => 1.0 - rho * lambda_home * lambda_away,
        _ => 1.0,
    }
}

/// Dixon-Coles adjusted probability of the exact scoreline
/// `home_goals`-`away_goals`.
///
/// This is a mass at one cell, not a normalised distribution. Large rates with
/// positive `rho` drive τ(1,1) below zero, and tiny rates with negative `rho`
/// push the 0-0 cell above one; the mass is clamped to [0, 1].
pub fn dc_probability(home_goals: u32, away_goals: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    let p_home = poisson_pmf(home_goals, lambda_home);
    let p_away = poisson_pmf(away_goals, lambda_away);
    (dc_tau(home_goals, away_goals, lambda_home, lambda_away, rho) * p_home * p_away).clamp(0.0, 1.0)
}

/// Home / draw / away probabilities for a fixture.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OutcomeProbabilities {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

/// Sum the Dixon-Coles grid up to `max_goals` per side into match outcomes.
///
/// The truncated grid loses a little mass in the tails, so the three values
/// are renormalised to sum to 1.
pub fn outcome_probabilities(lambda_home: f64, lambda_away: f64, rho: f64, max_goals: u32) -> OutcomeProbabilities {
    let mut home = 0.0;
    let mut draw = 0.0;
    let mut away = 0.0;
    for h in 0..=max_goals {
        for a in 0..=max_goals {
            let p = dc_probability(h, a, lambda_home, lambda_away, rho);
            if h > a {
                home += p;
            } else if h == a {
                draw += p;
            } else {
                away += p;
            }
        }
    }
    let total = home + draw + away;
    if total <= 0.0 {
        return OutcomeProbabilities {
            home: 0.0,
            draw: 0.0,
            away: 0.0,
        };
    }
    OutcomeProbabilities {
        home: home / total,
        draw: draw / total,
        away: away / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn poisson_pmf_matches_closed_form() {
        let lambda: f64 = 1.7;
        assert_relative_eq!(poisson_pmf(0, lambda), (-lambda).exp(), epsilon = 1e-12);
        assert_relative_eq!(poisson_pmf(1, lambda), lambda * (-lambda).exp(), epsilon = 1e-12);
        assert_relative_eq!(
            poisson_pmf(3, lambda),
            lambda.powi(3) * (-lambda).exp() / 6.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn poisson_pmf_sums_to_one() {
        let total: f64 = (0..40).map(|k| poisson_pmf(k, 2.3)).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn tau_table_low_score_cells() {
        let (lh, la, rho) = (1.4, 0.9, 0.12);
        assert_relative_eq!(dc_tau(0, 0, lh, la, rho), 1.0 - rho, epsilon = 1e-12);
        assert_relative_eq!(dc_tau(0, 1, lh, la, rho), 1.0 + rho * lh, epsilon = 1e-12);
        assert_relative_eq!(dc_tau(1, 0, lh, la, rho), 1.0 + rho * la, epsilon = 1e-12);
        assert_relative_eq!(dc_tau(1, 1, lh, la, rho), 1.0 - rho * lh * la, epsilon = 1e-12);
    }

    #[test]
    fn tau_is_one_outside_low_score_cells() {
        for h in 0..6 {
            for a in 0..6 {
                if h <= 1 && a <= 1 {
                    continue;
                }
                assert_eq!(dc_tau(h, a, 1.3, 1.1, 0.25), 1.0, "cell {}-{}", h, a);
            }
        }
    }

    #[test]
    fn dc_probability_is_tau_times_independent_poisson() {
        let p = dc_probability(1, 1, 1.5, 1.2, -0.1);
        let expected = (1.0 + 0.1 * 1.5 * 1.2) * poisson_pmf(1, 1.5) * poisson_pmf(1, 1.2);
        assert_relative_eq!(p, expected, epsilon = 1e-12);
    }

    #[test]
    fn dc_probability_in_unit_interval_over_grid() {
        // Covers the rates reachable inside the fit bounds, 0.005 up to 18.0
        let rates = [
            (0.3, 0.4),
            (1.2, 1.0),
            (2.5, 0.6),
            (1.0, 1.0),
            (2.6, 1.4),
            (6.0, 4.5),
            (18.0, 9.0),
            (0.01, 0.01),
            (0.005, 0.005),
        ];
        for &rho in &[-0.3, -0.1, 0.0, 0.1, 0.3] {
            for &(lh, la) in &rates {
                for h in 0..=10 {
                    for a in 0..=10 {
                        let p = dc_probability(h, a, lh, la, rho);
                        assert!(
                            (0.0..=1.0).contains(&p),
                            "p({}-{} | {}, {}, {}) = {}",
                            h, a, lh, la, rho, p
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn negative_tau_is_clamped_to_zero() {
        assert!(dc_tau(1, 1, 2.6, 1.4, 0.3) < 0.0);
        assert_eq!(dc_probability(1, 1, 2.6, 1.4, 0.3), 0.0);
        assert!(dc_probability(0, 0, 2.6, 1.4, 0.3) > 0.0);
    }

    #[test]
    fn low_score_mass_is_capped_at_one() {
        // 1.3 * e^-0.01 > 1 before clamping
        assert!(dc_tau(0, 0, 0.005, 0.005, -0.3) * poisson_pmf(0, 0.005).powi(2) > 1.0);
        assert_eq!(dc_probability(0, 0, 0.005, 0.005, -0.3), 1.0);
    }

    #[test]
    fn rho_zero_reduces_to_independent_poisson() {
        let p = dc_probability(0, 0, 1.1, 0.8, 0.0);
        assert_relative_eq!(p, (-1.9f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn outcome_probabilities_sum_to_one_and_favour_stronger_side() {
        let o = outcome_probabilities(2.1, 0.7, 0.05, DEFAULT_MAX_GOALS);
        assert_relative_eq!(o.home + o.draw + o.away, 1.0, epsilon = 1e-9);
        assert!(o.home > o.away);
    }

    #[test]
    fn outcome_probabilities_symmetric_rates() {
        let o = outcome_probabilities(1.3, 1.3, 0.0, DEFAULT_MAX_GOALS);
        assert_relative_eq!(o.home, o.away, epsilon = 1e-9);
    }
}
