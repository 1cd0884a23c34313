// The eight signal analyzers.
//
// Each analyzer is a pure function of the slice of match data it needs and
// returns `None` when that data is insufficient. Scores share a loose 0-100
// scale but are not normalized: form can exceed 100 and the home/away factor
// carries a flat home offset.

use chrono::{Datelike, Weekday};
use tracing::debug;

use crate::context::MatchContext;
use crate::engine::criteria::*;
use crate::engine::round1;
use crate::model::{
    BettingOdds, Fixture, ImportanceLevel, InjurySuspension, Outcome, PredictionAggregation,
    Standing,
};

/// League positions at or below this earn no form score.
const FORM_POSITION_CEILING: i64 = 20;
const FORM_POINTS_PER_PLACE: f64 = 5.0;
const FORM_POINTS_BONUS_CAP: f64 = 20.0;

const HOME_ADVANTAGE_OFFSET: f64 = 25.0;
const WIN_RATE_SCALE: f64 = 60.0;

const INJURY_PENALTY: f64 = 15.0;

const GOAL_DIFF_CLAMP: i32 = 20;

/// Meetings considered for head-to-head.
pub const H2H_WINDOW: usize = 5;

const INTANGIBLES_BASE: f64 = 50.0;
const IMPORTANCE_HOME_BOOST: f64 = 15.0;
const RELEGATION_BOOST: f64 = 10.0;
const WEEKEND_HOME_BOOST: f64 = 5.0;

/// Run every analyzer against `ctx`.
pub fn analyze_all(ctx: &MatchContext) -> CriteriaScores {
    let standings = ctx.standings();
    let injuries = match (&ctx.home_injuries, &ctx.away_injuries) {
        (Some(home), Some(away)) => Some((home.as_slice(), away.as_slice())),
        _ => None,
    };

    CriteriaScores {
        form_standings: standings.and_then(|(h, a)| form_standings(h, a)),
        home_away: standings.and_then(|(h, a)| home_away(h, a)),
        player_availability: injuries.and_then(|(h, a)| player_availability(h, a)),
        match_stats: standings.and_then(|(h, a)| match_statistics(h, a)),
        h2h: head_to_head(
            ctx.fixture.home_team_id,
            ctx.fixture.away_team_id,
            &ctx.head_to_head,
        ),
        ai_predictions: ai_consensus(&ctx.aggregations),
        odds_agreement: odds_agreement(&ctx.odds),
        intangibles: finite(Criterion::Intangibles, intangibles(&ctx.fixture)),
    }
}

/// Drop a score whose arithmetic produced NaN or infinity.
fn finite<S: SidedScore>(criterion: Criterion, score: S) -> Option<S> {
    if score.home_score().is_finite() && score.away_score().is_finite() {
        Some(score)
    } else {
        debug!("{} produced a non-finite score, treating as missing", criterion.key());
        None
    }
}

// ---------------------------------------------------------------------------
// Standings-based analyzers
// ---------------------------------------------------------------------------

/// League position plus a capped bonus for the side ahead on points.
pub fn form_standings(home: &Standing, away: &Standing) -> Option<FormStandingsScore> {
    let position_score =
        |s: &Standing| (FORM_POSITION_CEILING - s.position as i64).max(0) as f64 * FORM_POINTS_PER_PLACE;

    let mut home_score = position_score(home);
    let mut away_score = position_score(away);

    let points_difference = home.points - away.points;
    let bonus = (points_difference.unsigned_abs() as f64 * 2.0).min(FORM_POINTS_BONUS_CAP);
    if points_difference > 0 {
        home_score += bonus;
    } else {
        away_score += bonus;
    }

    finite(
        Criterion::FormStandings,
        FormStandingsScore {
            home_score,
            away_score,
            home_position: home.position,
            away_position: away.position,
            points_difference,
        },
    )
}

/// Home team's home record against the away team's away record.
pub fn home_away(home: &Standing, away: &Standing) -> Option<HomeAwayScore> {
    let home_win_rate = home.home_wins as f64 / home.home_played().max(1) as f64;
    let away_win_rate = away.away_wins as f64 / away.away_played().max(1) as f64;

    finite(
        Criterion::HomeAway,
        HomeAwayScore {
            home_score: home_win_rate * WIN_RATE_SCALE + HOME_ADVANTAGE_OFFSET,
            away_score: away_win_rate * WIN_RATE_SCALE,
            home_win_rate: round1(home_win_rate * 100.0),
            away_win_rate: round1(away_win_rate * 100.0),
        },
    )
}

/// Goal difference as a proxy for underlying match statistics.
pub fn match_statistics(home: &Standing, away: &Standing) -> Option<MatchStatsScore> {
    let score = |gd: i32| 50.0 + gd.clamp(-GOAL_DIFF_CLAMP, GOAL_DIFF_CLAMP) as f64 * 2.0;

    finite(
        Criterion::MatchStats,
        MatchStatsScore {
            home_score: score(home.goal_difference),
            away_score: score(away.goal_difference),
            home_goal_diff: home.goal_difference,
            away_goal_diff: away.goal_difference,
        },
    )
}

// ---------------------------------------------------------------------------
// Squad availability
// ---------------------------------------------------------------------------

/// Only players marked `Out` count against a side.
pub fn player_availability(
    home: &[InjurySuspension],
    away: &[InjurySuspension],
) -> Option<AvailabilityScore> {
    let home_injuries = home.iter().filter(|i| i.is_out()).count() as u32;
    let away_injuries = away.iter().filter(|i| i.is_out()).count() as u32;
    let score = |out: u32| (100.0 - out as f64 * INJURY_PENALTY).max(0.0);

    finite(
        Criterion::PlayerAvailability,
        AvailabilityScore {
            home_score: score(home_injuries),
            away_score: score(away_injuries),
            home_injuries,
            away_injuries,
        },
    )
}

// ---------------------------------------------------------------------------
// Head-to-head
// ---------------------------------------------------------------------------

/// Win share over the most recent finished meetings, counted from the
/// current home team's perspective regardless of who hosted each meeting.
///
/// `meetings` is expected newest first; anything unfinished or involving a
/// different pair is skipped.
pub fn head_to_head(
    home_team_id: i64,
    away_team_id: i64,
    meetings: &[Fixture],
) -> Option<HeadToHeadScore> {
    let mut home_wins = 0u32;
    let mut away_wins = 0u32;
    let mut draws = 0u32;

    let recent = meetings
        .iter()
        .filter(|f| f.is_finished() && f.involves_pair(home_team_id, away_team_id))
        .take(H2H_WINDOW);

    for meeting in recent {
        let hosted_by_home = meeting.home_team_id == home_team_id;
        match (Outcome::from_score(meeting.home_score, meeting.away_score), hosted_by_home) {
            (Outcome::Draw, _) => draws += 1,
            (Outcome::Home, true) | (Outcome::Away, false) => home_wins += 1,
            (Outcome::Away, true) | (Outcome::Home, false) => away_wins += 1,
        }
    }

    let total_games = home_wins + away_wins + draws;
    if total_games == 0 {
        return None;
    }

    finite(
        Criterion::HeadToHead,
        HeadToHeadScore {
            home_score: home_wins as f64 / total_games as f64 * 100.0,
            away_score: away_wins as f64 / total_games as f64 * 100.0,
            home_wins,
            away_wins,
            draws,
            total_games,
        },
    )
}

// ---------------------------------------------------------------------------
// External signals
// ---------------------------------------------------------------------------

/// Majority vote across external prediction sources.
///
/// Ties: Draw wins any tie it is part of, and Home beats Away.
pub fn ai_consensus(rows: &[PredictionAggregation]) -> Option<ConsensusScore> {
    if rows.is_empty() {
        return None;
    }

    let count = |o: Outcome| rows.iter().filter(|r| r.prediction == o).count() as u32;
    let home_count = count(Outcome::Home);
    let draw_count = count(Outcome::Draw);
    let away_count = count(Outcome::Away);
    let total_sources = rows.len() as u32;

    let (prediction, winning) = if home_count > draw_count && home_count >= away_count {
        (Outcome::Home, home_count)
    } else if draw_count >= away_count {
        (Outcome::Draw, draw_count)
    } else {
        (Outcome::Away, away_count)
    };

    Some(ConsensusScore {
        prediction,
        confidence: winning as f64 / total_sources as f64 * 100.0,
        home_count,
        draw_count,
        away_count,
        total_sources,
    })
}

/// Bookmaker-implied probabilities with the overround removed per row, then
/// averaged across rows that quote all three legs.
pub fn odds_agreement(rows: &[BettingOdds]) -> Option<OddsScore> {
    let mut sums = (0.0, 0.0, 0.0);
    let mut used = 0usize;

    for (h, d, a) in rows.iter().filter_map(BettingOdds::complete_legs) {
        let (ph, pd, pa) = (1.0 / h, 1.0 / d, 1.0 / a);
        let book = ph + pd + pa;
        sums.0 += ph / book * 100.0;
        sums.1 += pd / book * 100.0;
        sums.2 += pa / book * 100.0;
        used += 1;
    }

    if used == 0 {
        return None;
    }

    let n = used as f64;
    let (home, draw, away) = (sums.0 / n, sums.1 / n, sums.2 / n);

    finite(
        Criterion::OddsAgreement,
        OddsScore {
            home_score: home,
            away_score: away,
            bookmaker_count: rows.len() as u32,
            home_probability: round1(home),
            draw_probability: round1(draw),
            away_probability: round1(away),
        },
    )
}

// ---------------------------------------------------------------------------
// Intangibles
// ---------------------------------------------------------------------------

/// Fixture significance and scheduling. Always produces a score.
pub fn intangibles(fixture: &Fixture) -> IntangiblesScore {
    let mut home_score = INTANGIBLES_BASE;
    let mut away_score = INTANGIBLES_BASE;
    let mut factors = Vec::new();

    if let Some(level) = fixture.importance_level {
        if level.boosts_home() {
            home_score += IMPORTANCE_HOME_BOOST;
            factors.push(format!("{} match importance", level.label()));
        }
        if level == ImportanceLevel::Relegation {
            home_score += RELEGATION_BOOST;
            away_score += RELEGATION_BOOST;
            factors.push("Relegation battle intensity".to_string());
        }
    }

    if matches!(fixture.kickoff_time.weekday(), Weekday::Sat | Weekday::Sun) {
        home_score += WEEKEND_HOME_BOOST;
        factors.push("Weekend fixture advantage".to_string());
    }

    IntangiblesScore {
        home_score,
        away_score,
        factors,
    }
}
