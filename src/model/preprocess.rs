use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use crate::db::models::MatchRecord;
use crate::error::DataGapError;

/// Reference values shared by every likelihood term of one fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FitMetadata {
    /// Newest match date in the window
    pub reference_date: Option<NaiveDate>,
    /// Highest season in the window
    pub current_season: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct PreprocessReport {
    /// Annotated copies of the matches inside the window
    pub matches: Vec<MatchRecord>,
    pub metadata: FitMetadata,
    /// Matches dated after `today`; still kept, with zero decay
    pub future_dated: Vec<DataGapError>,
}

/// Restrict `matches` to the trailing `window_days` ending at `today` and
/// annotate each survivor with its distance from the newest match.
///
/// Undated matches cannot be placed in the window and are dropped. Empty input
/// yields an empty report with no metadata.
pub fn preprocess(matches: &[MatchRecord], window_days: u32, today: NaiveDate) -> PreprocessReport {
    let cutoff = today - Duration::days(i64::from(window_days));

    let mut filtered: Vec<MatchRecord> = matches
        .iter()
        .filter(|m| m.match_date.is_some_and(|d| d >= cutoff))
        .cloned()
        .collect();

    let metadata = FitMetadata {
        reference_date: filtered.iter().filter_map(|m| m.match_date).max(),
        current_season: filtered.iter().filter_map(|m| m.season).max(),
    };

    let mut future_dated = Vec::new();
    for m in &mut filtered {
        if let (Some(reference), Some(date)) = (metadata.reference_date, m.match_date) {
            m.days_from_ref = Some((reference - date).num_days().max(0));
            if date > today {
                future_dated.push(DataGapError::FutureDated {
                    home_team: m.home_team.clone(),
                    away_team: m.away_team.clone(),
                    date,
                    today,
                });
            }
        }
    }

    for gap in &future_dated {
        warn!("{}", gap);
    }
    info!(
        "Preprocessed {} matches: {} within {} days (reference {:?}, season {:?})",
        matches.len(),
        filtered.len(),
        window_days,
        metadata.reference_date,
        metadata.current_season
    );

    PreprocessReport {
        matches: filtered,
        metadata,
        future_dated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<MatchRecord> {
        vec![
            MatchRecord::new("a", "Arsenal", "Chelsea", date(2024, 5, 10), 2023, 2, 1),
            MatchRecord::new("b", "Chelsea", "Everton", date(2024, 9, 1), 2024, 0, 0),
            MatchRecord::new("c", "Everton", "Arsenal", date(2024, 10, 5), 2024, 1, 3),
        ]
    }

    #[test]
    fn wide_window_keeps_everything_and_annotates() {
        let input = sample();
        let report = preprocess(&input, 3650, date(2024, 10, 6));
        assert_eq!(report.matches.len(), 3);
        assert_eq!(report.metadata.reference_date, Some(date(2024, 10, 5)));
        assert_eq!(report.metadata.current_season, Some(2024));
        let days: Vec<_> = report.matches.iter().map(|m| m.days_from_ref).collect();
        assert_eq!(days, vec![Some(148), Some(34), Some(0)]);
        // Input untouched
        assert!(input.iter().all(|m| m.days_from_ref.is_none()));
        assert!(report.future_dated.is_empty());
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let today = date(2024, 10, 6);
        let first = preprocess(&sample(), 3650, today);
        let second = preprocess(&first.matches, 3650, today);
        assert_eq!(first.matches, second.matches);
        assert_eq!(first.metadata, second.metadata);
    }

    #[test]
    fn window_drops_old_and_undated_matches() {
        let mut input = sample();
        let mut undated = input[0].clone();
        undated.match_date = None;
        input.push(undated);

        let report = preprocess(&input, 60, date(2024, 10, 6));
        let ids: Vec<_> = report.matches.iter().filter_map(|m| m.match_id.clone()).collect();
        assert_eq!(ids, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn empty_input_gives_no_metadata() {
        let report = preprocess(&[], 365, date(2024, 10, 6));
        assert!(report.matches.is_empty());
        assert_eq!(report.metadata, FitMetadata::default());
    }

    #[test]
    fn future_dated_matches_are_flagged_but_kept() {
        let report = preprocess(&sample(), 3650, date(2024, 9, 30));
        assert_eq!(report.matches.len(), 3);
        assert_eq!(report.future_dated.len(), 1);
        assert!(matches!(
            &report.future_dated[0],
            DataGapError::FutureDated { home_team, .. } if home_team == "Everton"
        ));
        assert!(report.matches.iter().all(|m| m.days_from_ref.unwrap() >= 0));
    }
}
