use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::objective::ParamLayout;
use crate::error::UnknownTeamError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub attack: f64,
    pub defense: f64,
}

/// Attack and defense per team, keyed by team name.
///
/// One map holds both values, so every team has both ratings. Built in one
/// piece from a fitted parameter vector and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TeamRatings {
    ratings: BTreeMap<String, Rating>,
}

impl TeamRatings {
    /// Read ratings for `teams` out of a flat parameter vector.
    pub fn from_params(teams: &[String], params: &[f64]) -> Self {
        let layout = ParamLayout::new(teams.len());
        let ratings = teams
            .iter()
            .enumerate()
            .map(|(i, team)| {
                (
                    team.clone(),
                    Rating {
                        attack: params[layout.attack(i)],
                        defense: params[layout.defense(i)],
                    },
                )
            })
            .collect();
        TeamRatings { ratings }
    }

    pub fn get(&self, team: &str) -> Result<&Rating, UnknownTeamError> {
        self.ratings.get(team).ok_or_else(|| UnknownTeamError {
            team: team.to_string(),
            known_teams: self.teams().map(str::to_string).collect(),
        })
    }

    pub fn contains(&self, team: &str) -> bool {
        self.ratings.contains_key(team)
    }

    /// Team names in sorted order.
    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.ratings.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rating)> {
        self.ratings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

/// Everything a fit produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub home_advantage: f64,
    /// Dixon-Coles low-score dependence
    pub rho: f64,
    pub ratings: TeamRatings,
}

impl ModelParameters {
    pub fn from_params(teams: &[String], params: &[f64]) -> Self {
        ModelParameters {
            home_advantage: params[ParamLayout::HOME_ADVANTAGE],
            rho: params[ParamLayout::RHO],
            ratings: TeamRatings::from_params(teams, params),
        }
    }

    /// Expected goals `(home, away)` for a fixture.
    pub fn expected_goals(&self, home_team: &str, away_team: &str) -> Result<(f64, f64), UnknownTeamError> {
        let home = self.ratings.get(home_team)?;
        let away = self.ratings.get(away_team)?;
        Ok((
            home.attack * away.defense * self.home_advantage,
            away.attack * home.defense,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> ModelParameters {
        let teams = vec!["Arsenal".to_string(), "Chelsea".to_string()];
        ModelParameters::from_params(&teams, &[1.25, -0.05, 1.4, 0.6, 0.8, 1.2])
    }

    #[test]
    fn unpacks_attack_then_defense_blocks() {
        let p = params();
        assert_eq!(p.home_advantage, 1.25);
        assert_eq!(p.rho, -0.05);
        let arsenal = p.ratings.get("Arsenal").unwrap();
        assert_eq!((arsenal.attack, arsenal.defense), (1.4, 0.8));
        let chelsea = p.ratings.get("Chelsea").unwrap();
        assert_eq!((chelsea.attack, chelsea.defense), (0.6, 1.2));
    }

    #[test]
    fn expected_goals_formula() {
        let (h, a) = params().expected_goals("Arsenal", "Chelsea").unwrap();
        assert_relative_eq!(h, 1.4 * 1.2 * 1.25, epsilon = 1e-12);
        assert_relative_eq!(a, 0.6 * 0.8, epsilon = 1e-12);
    }

    #[test]
    fn unknown_team_lists_known_teams() {
        let err = params().expected_goals("Arsenal", "Leeds").unwrap_err();
        assert_eq!(err.team, "Leeds");
        assert_eq!(err.known_teams, vec!["Arsenal".to_string(), "Chelsea".to_string()]);
    }
}
