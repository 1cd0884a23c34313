// Post-classification rules that force a Draw.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::MatchContext;
use crate::engine::criteria::CriteriaScores;
use crate::model::ImportanceLevel;

const CLOSE_POSITION_GAP: u32 = 2;
const CLOSE_POINTS_GAP: u32 = 3;
const POOR_FORM_SCORE: f64 = 30.0;
const DERBY_MIN_MEETINGS: u32 = 5;
const DERBY_WIN_GAP: u32 = 1;

const OVERRIDE_CONFIDENCE_FLOOR: f64 = 50.0;
const OVERRIDE_DAMPENING: f64 = 0.8;

pub const OVERRIDE_WARNING: &str = "Draw override applied: special conditions detected";

/// A rule that fired and forced the prediction to Draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawOverride {
    /// Teams within two places and three points of each other.
    CloseStandings,
    /// Both sides scored under 30 on form.
    BothPoorForm,
    /// A derby whose last five meetings split within one win.
    DerbyCloseHistory,
}

impl fmt::Display for DrawOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DrawOverride::CloseStandings => "close standings",
            DrawOverride::BothPoorForm => "both teams in poor form",
            DrawOverride::DerbyCloseHistory => "derby with close history",
        };
        f.write_str(s)
    }
}

/// Every rule that fires for this fixture, in rule order.
pub fn evaluate(ctx: &MatchContext, scores: &CriteriaScores) -> Vec<DrawOverride> {
    let mut fired = Vec::new();

    if let Some((home, away)) = ctx.standings() {
        let position_gap = home.position.abs_diff(away.position);
        let points_gap = home.points.abs_diff(away.points);
        if position_gap <= CLOSE_POSITION_GAP && points_gap <= CLOSE_POINTS_GAP {
            fired.push(DrawOverride::CloseStandings);
        }
    }

    if let Some(form) = &scores.form_standings {
        if form.home_score < POOR_FORM_SCORE && form.away_score < POOR_FORM_SCORE {
            fired.push(DrawOverride::BothPoorForm);
        }
    }

    if ctx.fixture.importance_level == Some(ImportanceLevel::Derby) {
        if let Some(h2h) = &scores.h2h {
            if h2h.total_games >= DERBY_MIN_MEETINGS
                && h2h.home_wins.abs_diff(h2h.away_wins) <= DERBY_WIN_GAP
            {
                fired.push(DrawOverride::DerbyCloseHistory);
            }
        }
    }

    fired
}

/// Confidence after a forced Draw. Anything below the floor is raised to it.
pub fn dampen(confidence: f64) -> f64 {
    (confidence * OVERRIDE_DAMPENING).max(OVERRIDE_CONFIDENCE_FLOOR)
}
