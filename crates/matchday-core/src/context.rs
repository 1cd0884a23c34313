// Per-fixture input bundle handed to the prediction engine.

use crate::model::{BettingOdds, Fixture, InjurySuspension, PredictionAggregation, Standing, Team};

/// Everything the engine reads for one fixture. All collections are
/// caller-owned snapshots; the engine never mutates them.
///
/// Optional fields model absent feeds: `None` standings mean the league table
/// has no row for the team, and a `None` injury report means no injury feed
/// was available (as opposed to `Some(vec![])`, a team with nobody out).
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub fixture: Fixture,
    pub home_team: Team,
    pub away_team: Team,
    pub home_standing: Option<Standing>,
    pub away_standing: Option<Standing>,
    pub home_injuries: Option<Vec<InjurySuspension>>,
    pub away_injuries: Option<Vec<InjurySuspension>>,
    /// Finished meetings between the two teams, most recent first.
    pub head_to_head: Vec<Fixture>,
    pub aggregations: Vec<PredictionAggregation>,
    pub odds: Vec<BettingOdds>,
}

impl MatchContext {
    /// A context with no signal data beyond the fixture itself.
    pub fn bare(fixture: Fixture, home_team: Team, away_team: Team) -> Self {
        MatchContext {
            fixture,
            home_team,
            away_team,
            home_standing: None,
            away_standing: None,
            home_injuries: None,
            away_injuries: None,
            head_to_head: Vec::new(),
            aggregations: Vec::new(),
            odds: Vec::new(),
        }
    }

    /// Both standings, only when each side has one.
    pub fn standings(&self) -> Option<(&Standing, &Standing)> {
        Some((self.home_standing.as_ref()?, self.away_standing.as_ref()?))
    }

    /// Whether the fixture's team ids agree with the supplied teams.
    pub fn teams_match_fixture(&self) -> bool {
        self.fixture.home_team_id == self.home_team.id
            && self.fixture.away_team_id == self.away_team.id
    }
}
