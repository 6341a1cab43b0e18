use anyhow::{bail, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::warn;

pub mod models;
use models::*;

/// Read access to the scraped shot table.
///
/// Every row is one shot (or red card) with the match it belongs to
/// denormalised onto it; match results are derived by counting goals.
pub struct Database {
    conn: Connection,
    table: String,
}

impl Database {
    /// Open the SQLite database at `path`, reading shots from `table`
    pub fn open(path: &str, table: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, table)
    }

    pub fn open_in_memory(table: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self::with_connection(conn, table)?;
        db.ensure_schema()?;
        Ok(db)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("invalid table name {:?}", table);
        }
        Ok(Database {
            conn,
            table: table.to_string(),
        })
    }

    /// Create the shot table if it does not exist (idempotent)
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                match_url  TEXT,
                match_date TEXT,
                home_team  TEXT,
                away_team  TEXT,
                season     INTEGER,
                Team       TEXT,
                Player     TEXT,
                Minute     REAL,
                Outcome    TEXT,
                xG         REAL,
                PSxG       REAL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_match ON {table}(match_url);
            "#,
            table = self.table
        ))?;
        Ok(())
    }

    // ── Shots ─────────────────────────────────────────────────────────────────

    pub fn insert_shot(&self, fixture: &MatchRecord, shot: &ShotRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (match_url, match_date, home_team, away_team, season,
                                 Team, Minute, Outcome, xG, PSxG)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                self.table
            ),
            params![
                shot.match_id,
                fixture.match_date.map(|d| d.format("%Y-%m-%d").to_string()),
                fixture.home_team,
                fixture.away_team,
                fixture.season,
                shot.team,
                shot.minute,
                shot.outcome,
                shot.xg,
                shot.psxg,
            ],
        )?;
        Ok(())
    }

    /// Every shot row that belongs to an identified match
    pub fn load_shots(&self) -> Result<Vec<ShotRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT match_url, Team, Minute, Outcome, xG, PSxG
             FROM {} WHERE match_url IS NOT NULL AND Team IS NOT NULL",
            self.table
        ))?;
        let shots = stmt
            .query_map([], map_shot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(shots)
    }

    // ── Matches ───────────────────────────────────────────────────────────────

    /// One record per match, goals counted from rows with outcome "Goal"
    pub fn load_matches(&self) -> Result<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT match_url, MIN(match_date), home_team, away_team, MAX(season),
                    SUM(CASE WHEN Team = home_team AND Outcome = 'Goal' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN Team = away_team AND Outcome = 'Goal' THEN 1 ELSE 0 END)
             FROM {}
             WHERE home_team IS NOT NULL AND away_team IS NOT NULL
             GROUP BY match_url, home_team, away_team
             ORDER BY MIN(match_date), match_url",
            self.table
        ))?;
        let rows = stmt
            .query_map([], map_match_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().map(MatchRow::into_record).collect())
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

struct MatchRow {
    match_id: Option<String>,
    match_date: Option<String>,
    home_team: String,
    away_team: String,
    season: Option<f64>,
    home_goals: i64,
    away_goals: i64,
}

impl MatchRow {
    fn into_record(self) -> MatchRecord {
        let match_date = self.match_date.as_deref().and_then(|raw| {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                warn!("Unparseable match date {:?} for {:?}", raw, self.match_id);
            }
            parsed
        });
        let season = self
            .season
            .map(|s| s as i32)
            .or_else(|| match_date.map(season_for_date));
        MatchRecord {
            match_id: self.match_id,
            home_team: self.home_team,
            away_team: self.away_team,
            match_date,
            season,
            home_goals: self.home_goals.max(0) as u32,
            away_goals: self.away_goals.max(0) as u32,
            days_from_ref: None,
            weight: 1.0,
            simulation_id: None,
        }
    }
}

fn map_match_row(row: &rusqlite::Row) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        match_id: row.get(0)?,
        match_date: row.get(1)?,
        home_team: row.get(2)?,
        away_team: row.get(3)?,
        season: row.get(4)?,
        home_goals: row.get(5)?,
        away_goals: row.get(6)?,
    })
}

fn map_shot(row: &rusqlite::Row) -> rusqlite::Result<ShotRecord> {
    let minute: Option<f64> = row.get(2)?;
    let outcome: Option<String> = row.get(3)?;
    Ok(ShotRecord {
        match_id: row.get(0)?,
        team: row.get(1)?,
        minute: minute.filter(|m| m.is_finite() && *m >= 0.0).map(|m| m as u32),
        outcome: outcome.unwrap_or_default(),
        xg: row.get(4)?,
        psxg: row.get(5)?,
    })
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
