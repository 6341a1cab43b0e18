use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A played match as supplied by the storage layer.
///
/// Preprocessing and resimulation never mutate the records they are given;
/// they return annotated copies carrying `days_from_ref`, `weight` and
/// `simulation_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Unique match key (the match page URL in the shot table)
    pub match_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub match_date: Option<NaiveDate>,
    /// Year the season started in, e.g. 2024 for 2024/25
    pub season: Option<i32>,
    pub home_goals: u32,
    pub away_goals: u32,
    /// Whole days between this match and the newest match in the fitted window
    pub days_from_ref: Option<i64>,
    /// Likelihood weight: 1.0 for real matches, 1/N for each of N resimulations
    pub weight: f64,
    /// Set only on synthetic records, numbered 0..N
    pub simulation_id: Option<u32>,
}

impl MatchRecord {
    pub fn new(
        match_id: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
        match_date: NaiveDate,
        season: i32,
        home_goals: u32,
        away_goals: u32,
    ) -> Self {
        MatchRecord {
            match_id: Some(match_id.into()),
            home_team: home_team.into(),
            away_team: away_team.into(),
            match_date: Some(match_date),
            season: Some(season),
            home_goals,
            away_goals,
            days_from_ref: None,
            weight: 1.0,
            simulation_id: None,
        }
    }

    pub fn is_simulation(&self) -> bool {
        self.simulation_id.is_some()
    }
}

/// Season start year for a match date: August onwards belongs to the season
/// starting that year, earlier months to the one that started the year before.
pub fn season_for_date(date: NaiveDate) -> i32 {
    if date.month() >= 8 {
        date.year()
    } else {
        date.year() - 1
    }
}

/// One shot (or other logged event) from a match's shot table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotRecord {
    pub match_id: String,
    /// Squad that took the shot; compared by equality with the match's team names
    pub team: String,
    pub minute: Option<u32>,
    /// "Goal", "Saved", "Off Target", "Blocked", "Red Card", ...
    pub outcome: String,
    pub xg: Option<f64>,
    /// Post-shot expected goals
    pub psxg: Option<f64>,
}

impl ShotRecord {
    /// Probability that this shot ends in a goal, taken from PSxG.
    ///
    /// Missing or non-finite values count as 0 so non-shot events (red cards)
    /// and shots without a post-shot model never produce simulated goals.
    pub fn goal_probability(&self) -> f64 {
        match self.psxg {
            Some(p) if p.is_finite() => p.clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    pub fn is_goal(&self) -> bool {
        self.outcome.trim().eq_ignore_ascii_case("goal")
    }
}
