use thiserror::Error;

/// A match that could not contribute resimulated observations, or whose data
/// looks suspect. Always recoverable: the match is kept as a single real
/// observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataGapError {
    #[error("match {home_team} v {away_team} has no identifier, skipping resimulation")]
    MissingMatchId { home_team: String, away_team: String },

    #[error("no shot records for match {match_id}, skipping resimulation")]
    NoShots { match_id: String },

    #[error("match {home_team} v {away_team} is dated {date}, after {today}")]
    FutureDated {
        home_team: String,
        away_team: String,
        date: chrono::NaiveDate,
        today: chrono::NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("team {team:?} not found in the model, available teams: {known_teams:?}")]
pub struct UnknownTeamError {
    pub team: String,
    pub known_teams: Vec<String>,
}

/// The optimizer stopped before meeting its convergence tolerances. The best
/// iterate is still usable.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("optimizer did not converge after {iterations} iterations ({reason}), objective {objective:.4}")]
pub struct NonConvergenceWarning {
    pub iterations: usize,
    pub objective: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("{0}")]
    UnknownTeam(#[from] UnknownTeamError),
}
