// Prediction engine: analyzers -> weighted aggregate -> classifier ->
// draw overrides -> confidence normalization -> explanation.

pub mod aggregate;
pub mod analyzers;
pub mod criteria;
pub mod explain;
pub mod overrides;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{resolve_settings, Config, EngineSettings, SettingsSource};
use crate::context::MatchContext;
use crate::db::Database;
use crate::model::Outcome;

use self::criteria::{CriteriaScores, Criterion};
use self::explain::ConfidenceTier;
use self::overrides::DrawOverride;

pub const FALLBACK_CONFIDENCE: f64 = 35.0;
pub const FALLBACK_REASONING: &str = "Prediction failed due to insufficient data";
pub const FALLBACK_WARNING: &str = "System error occurred during prediction";

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(
        "fixture {fixture_id} lists teams {fixture_home}/{fixture_away} but context supplies {home}/{away}"
    )]
    TeamMismatch {
        fixture_id: i64,
        fixture_home: i64,
        fixture_away: i64,
        home: i64,
        away: i64,
    },

    #[error("non-finite {stage} for fixture {fixture_id}")]
    NonFiniteScore { fixture_id: i64, stage: &'static str },
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of one prediction. Numeric display fields are rounded to one
/// decimal place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: Outcome,
    /// Final confidence, 0-100.
    pub confidence: f64,
    pub reasoning: String,
    pub criteria_scores: CriteriaScores,
    pub warnings: Vec<String>,
    pub home_percentage: f64,
    pub away_percentage: f64,
    /// Share of criteria that produced a score, 0-100.
    pub data_availability: f64,
    #[serde(default)]
    pub draw_overrides: Vec<DrawOverride>,
}

impl PredictionResult {
    /// The result returned when the engine hits a fault.
    pub fn fallback() -> Self {
        PredictionResult {
            prediction: Outcome::Draw,
            confidence: FALLBACK_CONFIDENCE,
            reasoning: FALLBACK_REASONING.to_string(),
            criteria_scores: CriteriaScores::default(),
            warnings: vec![FALLBACK_WARNING.to_string()],
            home_percentage: 50.0,
            away_percentage: 50.0,
            data_availability: 0.0,
            draw_overrides: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.reasoning == FALLBACK_REASONING && self.data_availability == 0.0
    }

    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }

    pub fn confidence_display(&self) -> String {
        explain::confidence_display(self.prediction, self.confidence)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless per call; holds only the active settings.
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine {
    settings: EngineSettings,
}

impl PredictionEngine {
    pub fn new(settings: EngineSettings) -> Self {
        PredictionEngine { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Swap in new settings, e.g. after an admin edit.
    pub fn update(&mut self, settings: EngineSettings) {
        self.settings = settings;
    }

    /// Re-resolve settings from the stored admin row, then `weights.toml`,
    /// then defaults.
    pub fn reload(&mut self, db: &Database, config: &Config) -> Result<SettingsSource> {
        let (settings, source) = resolve_settings(db.load_settings()?, config);
        debug!("Engine settings reloaded from {:?}", source);
        self.settings = settings;
        Ok(source)
    }

    /// Predict a fixture. Never fails: any fault is logged and replaced by
    /// [`PredictionResult::fallback`].
    pub fn predict(&self, ctx: &MatchContext) -> PredictionResult {
        match self.try_predict(ctx) {
            Ok(result) => result,
            Err(e) => {
                error!("Prediction failed for fixture {}: {}", ctx.fixture.id, e);
                PredictionResult::fallback()
            }
        }
    }

    pub fn try_predict(&self, ctx: &MatchContext) -> Result<PredictionResult, EngineError> {
        let fixture_id = ctx.fixture.id;
        if !ctx.teams_match_fixture() {
            return Err(EngineError::TeamMismatch {
                fixture_id,
                fixture_home: ctx.fixture.home_team_id,
                fixture_away: ctx.fixture.away_team_id,
                home: ctx.home_team.id,
                away: ctx.away_team.id,
            });
        }

        let scores = analyzers::analyze_all(ctx);
        let agg = aggregate::aggregate(&scores, &self.settings.weights);
        if !agg.is_finite() {
            return Err(EngineError::NonFiniteScore {
                fixture_id,
                stage: "aggregate score",
            });
        }
        let mut warnings = agg.warnings;
        if !warnings.is_empty() {
            debug!("Fixture {}: {} signal(s) missing", fixture_id, warnings.len());
        }

        let (mut prediction, mut confidence) = aggregate::classify(
            agg.home_percentage,
            agg.away_percentage,
            &self.settings.thresholds,
        );

        let draw_overrides = overrides::evaluate(ctx, &scores);
        if !draw_overrides.is_empty() {
            debug!(
                "Fixture {}: draw override ({:?}) replaces {} at {:.1}",
                fixture_id, draw_overrides, prediction, confidence
            );
            prediction = Outcome::Draw;
            confidence = overrides::dampen(confidence);
            warnings.push(overrides::OVERRIDE_WARNING.to_string());
        }

        let availability = scores.present_count() as f64 / Criterion::ALL.len() as f64;
        let confidence = confidence * availability;
        if !confidence.is_finite() {
            return Err(EngineError::NonFiniteScore {
                fixture_id,
                stage: "confidence",
            });
        }
        let confidence = round1(confidence.clamp(0.0, 100.0));

        let reasoning = explain::reasoning(
            &ctx.home_team.name,
            &ctx.away_team.name,
            prediction,
            confidence,
            &scores,
            &warnings,
        );

        Ok(PredictionResult {
            prediction,
            confidence,
            reasoning,
            criteria_scores: scores,
            warnings,
            home_percentage: round1(agg.home_percentage),
            away_percentage: round1(agg.away_percentage),
            data_availability: round1(availability * 100.0),
            draw_overrides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Weights;
    use crate::model::{Fixture, FixtureStatus, Standing, Team};
    use chrono::NaiveDate;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn team(id: i64, name: &str) -> Team {
        Team {
            id,
            name: name.into(),
            country: None,
            league_id: Some(1),
        }
    }

    fn standing(team_id: i64, position: u32, points: i32) -> Standing {
        Standing {
            team_id,
            league_id: 1,
            position,
            points,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            goal_difference: 0,
            home_wins: 0,
            home_draws: 0,
            home_losses: 0,
            away_wins: 0,
            away_draws: 0,
            away_losses: 0,
        }
    }

    /// Tuesday kickoff so intangibles stay neutral.
    fn ctx() -> MatchContext {
        let fixture = Fixture {
            id: 7,
            home_team_id: 1,
            away_team_id: 2,
            league_id: 1,
            kickoff_time: NaiveDate::from_ymd_opt(2025, 8, 19)
                .unwrap()
                .and_hms_opt(19, 45, 0)
                .unwrap(),
            status: FixtureStatus::NotStarted,
            home_score: 0,
            away_score: 0,
            venue: None,
            round_info: None,
            importance_level: None,
        };
        MatchContext::bare(fixture, team(1, "Rovers"), team(2, "United"))
    }

    #[test]
    fn bare_context_is_an_even_draw() {
        let result = PredictionEngine::default().predict(&ctx());
        assert_eq!(result.prediction, Outcome::Draw);
        assert_eq!((result.home_percentage, result.away_percentage), (50.0, 50.0));
        assert_eq!(result.data_availability, 12.5);
        // (100 - 50) * 1/8
        assert!(approx_eq(result.confidence, 6.3, 1e-9));
        assert_eq!(result.warnings.len(), 7);
        assert!(!result.is_fallback());
    }

    #[test]
    fn zero_total_score_is_even_draw() {
        let settings = EngineSettings {
            weights: Weights {
                intangibles: 0.0,
                ..Weights::default()
            },
            ..EngineSettings::default()
        };
        let result = PredictionEngine::new(settings).predict(&ctx());
        assert_eq!(result.prediction, Outcome::Draw);
        assert_eq!((result.home_percentage, result.away_percentage), (50.0, 50.0));
    }

    #[test]
    fn dominant_home_standing_predicts_home() {
        let mut c = ctx();
        c.home_standing = Some(standing(1, 1, 80));
        c.away_standing = Some(standing(2, 18, 20));
        let result = PredictionEngine::default().predict(&c);

        assert_eq!(result.prediction, Outcome::Home);
        assert!(result.home_percentage > 65.0);
        assert_eq!(result.data_availability, 50.0);
        assert!(approx_eq(
            result.confidence,
            result.home_percentage * 0.5,
            0.1
        ));
        assert!(result.draw_overrides.is_empty());
    }

    #[test]
    fn close_standings_force_draw() {
        let mut c = ctx();
        c.home_standing = Some(standing(1, 4, 50));
        c.away_standing = Some(standing(2, 5, 48));
        let engine = PredictionEngine::default();
        let result = engine.predict(&c);

        assert_eq!(result.prediction, Outcome::Draw);
        assert_eq!(result.draw_overrides, vec![DrawOverride::CloseStandings]);
        assert_eq!(
            result.warnings.last().map(String::as_str),
            Some(overrides::OVERRIDE_WARNING)
        );

        let (_, raw) = aggregate::classify(
            result.home_percentage,
            result.away_percentage,
            &engine.settings().thresholds,
        );
        let availability = result.data_availability / 100.0;
        assert!(result.confidence <= overrides::dampen(raw) * availability + 0.1);
    }

    #[test]
    fn team_mismatch_falls_back() {
        let mut c = ctx();
        c.away_team = team(99, "Impostors");
        let engine = PredictionEngine::default();

        assert!(matches!(
            engine.try_predict(&c),
            Err(EngineError::TeamMismatch { fixture_id: 7, .. })
        ));

        let result = engine.predict(&c);
        assert!(result.is_fallback());
        assert_eq!(result, PredictionResult::fallback());
        assert_eq!(result.confidence, 35.0);
        assert_eq!(result.warnings, vec![FALLBACK_WARNING]);
    }

    #[test]
    fn infinite_weight_falls_back() {
        let settings = EngineSettings {
            weights: Weights {
                intangibles: f64::INFINITY,
                ..Weights::default()
            },
            ..EngineSettings::default()
        };
        let engine = PredictionEngine::new(settings);
        assert!(matches!(
            engine.try_predict(&ctx()),
            Err(EngineError::NonFiniteScore { .. })
        ));
        assert!(engine.predict(&ctx()).is_fallback());
    }

    #[test]
    fn update_replaces_settings() {
        let mut engine = PredictionEngine::default();
        let mut settings = EngineSettings::default();
        settings.thresholds.home_win = 80.0;
        engine.update(settings);
        assert_eq!(engine.settings().thresholds.home_win, 80.0);
    }

    #[test]
    fn reload_prefers_stored_settings() {
        let db = Database::open(":memory:").unwrap();
        let config = Config {
            engine: None,
            db_path: ":memory:".into(),
            runner: crate::config::RunnerConfig { max_concurrency: 1 },
            logging: Default::default(),
        };
        let mut engine = PredictionEngine::default();
        assert_eq!(engine.reload(&db, &config).unwrap(), SettingsSource::Defaults);

        let mut stored = EngineSettings::default();
        stored.weights.odds_agreement = 30.0;
        db.save_settings(&stored).unwrap();
        assert_eq!(engine.reload(&db, &config).unwrap(), SettingsSource::Database);
        assert_eq!(engine.settings().weights.odds_agreement, 30.0);
    }

    #[test]
    fn result_serializes_with_breakdown() {
        let mut c = ctx();
        c.home_standing = Some(standing(1, 1, 80));
        c.away_standing = Some(standing(2, 18, 20));
        let result = PredictionEngine::default().predict(&c);
        let json = serde_json::to_string(&result).unwrap();
        let back: PredictionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn display_uses_final_confidence() {
        let result = PredictionResult::fallback();
        assert_eq!(result.tier(), ConfidenceTier::Low);
        assert!(result.confidence_display().ends_with("35.0% Draw"));
    }
}
