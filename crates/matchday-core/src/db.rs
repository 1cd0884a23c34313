// SQLite persistence: prediction cache, admin settings and daily performance.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::config::{EngineSettings, Thresholds, Weights};
use crate::context::MatchContext;
use crate::engine::{PredictionEngine, PredictionResult};
use crate::model::{Fixture, Outcome};
use crate::performance::{self, DailyPerformance, OutcomeTally};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed store for cached predictions, the admin settings row and
/// per-day accuracy.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS predictions (
                fixture_id        INTEGER PRIMARY KEY,
                prediction        TEXT NOT NULL,
                confidence        REAL NOT NULL,
                reasoning         TEXT NOT NULL,
                criteria_scores   TEXT NOT NULL,
                data_warnings     TEXT NOT NULL,
                home_percentage   REAL NOT NULL,
                away_percentage   REAL NOT NULL,
                data_availability REAL NOT NULL,
                draw_overrides    TEXT NOT NULL DEFAULT '[]',
                created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS admin_settings (
                id                          INTEGER PRIMARY KEY CHECK (id = 1),
                home_win_threshold          REAL NOT NULL,
                draw_threshold_min          REAL NOT NULL,
                draw_threshold_max          REAL NOT NULL,
                away_win_threshold          REAL NOT NULL,
                form_weight                 REAL NOT NULL,
                home_away_weight            REAL NOT NULL,
                player_availability_weight  REAL NOT NULL,
                match_stats_weight          REAL NOT NULL,
                h2h_weight                  REAL NOT NULL,
                ai_predictions_weight       REAL NOT NULL,
                odds_agreement_weight       REAL NOT NULL,
                intangibles_weight          REAL NOT NULL,
                updated_at                  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS performance (
                date                TEXT PRIMARY KEY,
                total_predictions   INTEGER NOT NULL,
                correct_predictions INTEGER NOT NULL,
                home_predicted      INTEGER NOT NULL,
                home_correct        INTEGER NOT NULL,
                draw_predicted      INTEGER NOT NULL,
                draw_correct        INTEGER NOT NULL,
                away_predicted      INTEGER NOT NULL,
                away_correct        INTEGER NOT NULL,
                accuracy_percentage REAL NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ------------------------------------------------------------------
    // Prediction cache
    // ------------------------------------------------------------------

    /// Store the prediction for `fixture_id`, replacing any earlier one.
    pub fn save_prediction(&self, fixture_id: i64, result: &PredictionResult) -> Result<()> {
        let conn = self.conn();
        let criteria_json = result
            .criteria_scores
            .to_json()
            .context("failed to serialize criteria scores")?;
        let warnings_json =
            serde_json::to_string(&result.warnings).context("failed to serialize warnings")?;
        let overrides_json = serde_json::to_string(&result.draw_overrides)
            .context("failed to serialize draw overrides")?;

        conn.execute(
            "INSERT OR REPLACE INTO predictions
                (fixture_id, prediction, confidence, reasoning, criteria_scores, data_warnings,
                 home_percentage, away_percentage, data_availability, draw_overrides)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                fixture_id,
                result.prediction.as_str(),
                result.confidence,
                result.reasoning,
                criteria_json,
                warnings_json,
                result.home_percentage,
                result.away_percentage,
                result.data_availability,
                overrides_json,
            ],
        )
        .context("failed to save prediction")?;
        Ok(())
    }

    /// Load the cached prediction for `fixture_id`, if any.
    pub fn load_prediction(&self, fixture_id: i64) -> Result<Option<PredictionResult>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT prediction, confidence, reasoning, criteria_scores, data_warnings,
                        home_percentage, away_percentage, data_availability, draw_overrides
                 FROM predictions WHERE fixture_id = ?1",
                params![fixture_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, f64>(6)?,
                        row.get::<_, f64>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()
            .context("failed to query prediction")?;

        let Some((
            prediction,
            confidence,
            reasoning,
            criteria_json,
            warnings_json,
            home_percentage,
            away_percentage,
            data_availability,
            overrides_json,
        )) = row
        else {
            return Ok(None);
        };

        let prediction = Outcome::from_str_outcome(&prediction)
            .ok_or_else(|| anyhow!("unknown stored prediction '{prediction}'"))?;

        Ok(Some(PredictionResult {
            prediction,
            confidence,
            reasoning,
            criteria_scores: crate::engine::criteria::CriteriaScores::from_json(&criteria_json)
                .context("failed to deserialize criteria scores")?,
            warnings: serde_json::from_str(&warnings_json)
                .context("failed to deserialize warnings")?,
            home_percentage,
            away_percentage,
            data_availability,
            draw_overrides: serde_json::from_str(&overrides_json)
                .context("failed to deserialize draw overrides")?,
        }))
    }

    pub fn prediction_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))
            .context("failed to count predictions")?;
        Ok(count as usize)
    }

    /// Drop every cached prediction, e.g. after the weights change.
    pub fn clear_predictions(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM predictions", [])
            .context("failed to clear predictions")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Admin settings
    // ------------------------------------------------------------------

    /// The stored admin settings row, or `None` if none has been saved.
    pub fn load_settings(&self) -> Result<Option<EngineSettings>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT home_win_threshold, draw_threshold_min, draw_threshold_max, away_win_threshold,
                    form_weight, home_away_weight, player_availability_weight, match_stats_weight,
                    h2h_weight, ai_predictions_weight, odds_agreement_weight, intangibles_weight
             FROM admin_settings WHERE id = 1",
            [],
            |row| {
                Ok(EngineSettings {
                    thresholds: Thresholds {
                        home_win: row.get(0)?,
                        draw_min: row.get(1)?,
                        draw_max: row.get(2)?,
                        away_win: row.get(3)?,
                    },
                    weights: Weights {
                        form_standings: row.get(4)?,
                        home_away: row.get(5)?,
                        player_availability: row.get(6)?,
                        match_stats: row.get(7)?,
                        h2h: row.get(8)?,
                        ai_predictions: row.get(9)?,
                        odds_agreement: row.get(10)?,
                        intangibles: row.get(11)?,
                    },
                })
            },
        )
        .optional()
        .context("failed to load admin settings")
    }

    /// Validate and store the admin settings row.
    pub fn save_settings(&self, settings: &EngineSettings) -> Result<()> {
        settings.validate().context("refusing to store invalid settings")?;
        let t = &settings.thresholds;
        let w = &settings.weights;
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO admin_settings
                (id, home_win_threshold, draw_threshold_min, draw_threshold_max, away_win_threshold,
                 form_weight, home_away_weight, player_availability_weight, match_stats_weight,
                 h2h_weight, ai_predictions_weight, odds_agreement_weight, intangibles_weight)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                t.home_win,
                t.draw_min,
                t.draw_max,
                t.away_win,
                w.form_standings,
                w.home_away,
                w.player_availability,
                w.match_stats,
                w.h2h,
                w.ai_predictions,
                w.odds_agreement,
                w.intangibles,
            ],
        )
        .context("failed to save admin settings")?;
        Ok(())
    }

    /// Overwrite the stored row with built-in defaults and return them.
    pub fn reset_settings(&self) -> Result<EngineSettings> {
        let defaults = EngineSettings::default();
        self.save_settings(&defaults)?;
        Ok(defaults)
    }

    // ------------------------------------------------------------------
    // Performance
    // ------------------------------------------------------------------

    /// Insert or replace the row for `day.date`.
    pub fn record_performance(&self, day: &DailyPerformance) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO performance
                (date, total_predictions, correct_predictions, home_predicted, home_correct,
                 draw_predicted, draw_correct, away_predicted, away_correct, accuracy_percentage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                day.date.format(DATE_FORMAT).to_string(),
                day.total_predictions,
                day.correct_predictions,
                day.home.predicted,
                day.home.correct,
                day.draw.predicted,
                day.draw.correct,
                day.away.predicted,
                day.away.correct,
                day.accuracy_percentage(),
            ],
        )
        .context("failed to record performance")?;
        Ok(())
    }

    /// Rows dated on or after `since`, newest first.
    pub fn load_performance_since(&self, since: NaiveDate) -> Result<Vec<DailyPerformance>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT date, total_predictions, correct_predictions, home_predicted, home_correct,
                        draw_predicted, draw_correct, away_predicted, away_correct
                 FROM performance WHERE date >= ?1 ORDER BY date DESC",
            )
            .context("failed to prepare load_performance_since query")?;

        let rows = stmt
            .query_map(params![since.format(DATE_FORMAT).to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    DailyPerformance {
                        date: since,
                        total_predictions: row.get(1)?,
                        correct_predictions: row.get(2)?,
                        home: OutcomeTally {
                            predicted: row.get(3)?,
                            correct: row.get(4)?,
                        },
                        draw: OutcomeTally {
                            predicted: row.get(5)?,
                            correct: row.get(6)?,
                        },
                        away: OutcomeTally {
                            predicted: row.get(7)?,
                            correct: row.get(8)?,
                        },
                    },
                ))
            })
            .context("failed to query performance")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map performance rows")?;

        rows.into_iter()
            .map(|(date, mut day)| {
                day.date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                    .with_context(|| format!("invalid performance date '{date}'"))?;
                Ok(day)
            })
            .collect()
    }

    /// Acquire the connection lock.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

/// Return the cached prediction for the fixture unless `refresh` is set;
/// otherwise predict and store. Fallback results are returned but not cached.
pub fn predict_cached(
    engine: &PredictionEngine,
    db: &Database,
    ctx: &MatchContext,
    refresh: bool,
) -> Result<PredictionResult> {
    let fixture_id = ctx.fixture.id;
    if !refresh {
        if let Some(cached) = db.load_prediction(fixture_id)? {
            debug!("Using cached prediction for fixture {}", fixture_id);
            return Ok(cached);
        }
    }

    let result = engine.predict(ctx);
    if !result.is_fallback() {
        db.save_prediction(fixture_id, &result)?;
    }
    Ok(result)
}

/// Grade every finished fixture that has a stored prediction and upsert one
/// performance row per kickoff date. Returns the rows written.
pub fn record_graded_fixtures<'a>(
    db: &Database,
    finished: impl IntoIterator<Item = &'a Fixture>,
) -> Result<Vec<DailyPerformance>> {
    let mut grades = Vec::new();
    for fixture in finished {
        let Some(prediction) = db.load_prediction(fixture.id)? else {
            continue;
        };
        grades.extend(performance::grade(&prediction, fixture));
    }

    let days = performance::tally_by_kickoff_date(&grades);
    for day in &days {
        db.record_performance(day)?;
    }
    debug!("Graded {} fixtures across {} day(s)", grades.len(), days.len());
    Ok(days)
}
