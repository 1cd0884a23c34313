// Data snapshot loading: a JSON document of teams, fixtures, standings,
// injuries, external predictions and odds, plus CSV league tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::context::MatchContext;
use crate::engine::analyzers::H2H_WINDOW;
use crate::model::{
    BettingOdds, Fixture, FixtureStatus, InjurySuspension, PredictionAggregation, Standing, Team,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid snapshot JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("fixture {0} not found in snapshot")]
    UnknownFixture(i64),

    #[error("fixture {fixture_id} references unknown team {team_id}")]
    UnknownTeam { fixture_id: i64, team_id: i64 },
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the engine can read, as delivered by the upstream feeds.
///
/// `injuries` is `None` when no injury feed was supplied at all; in that
/// case every context gets `None` reports and player availability is
/// treated as missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSnapshot {
    pub teams: Vec<Team>,
    pub fixtures: Vec<Fixture>,
    pub standings: Vec<Standing>,
    pub injuries: Option<Vec<InjurySuspension>>,
    pub aggregations: Vec<PredictionAggregation>,
    pub odds: Vec<BettingOdds>,
}

impl DataSnapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = std::fs::read_to_string(path).map_err(|e| SnapshotError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| SnapshotError::Json {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn team(&self, id: i64) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn fixture(&self, id: i64) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.id == id)
    }

    pub fn standing_for(&self, team_id: i64) -> Option<&Standing> {
        self.standings.iter().find(|s| s.team_id == team_id)
    }

    /// Replace standings for every team present in `incoming`; keep the rest.
    pub fn merge_standings(&mut self, incoming: Vec<Standing>) {
        for standing in incoming {
            match self
                .standings
                .iter_mut()
                .find(|s| s.team_id == standing.team_id)
            {
                Some(existing) => *existing = standing,
                None => self.standings.push(standing),
            }
        }
    }

    /// Fixtures that have not kicked off.
    pub fn upcoming(&self) -> Vec<&Fixture> {
        self.fixtures
            .iter()
            .filter(|f| f.status == FixtureStatus::NotStarted)
            .collect()
    }

    pub fn finished(&self) -> Vec<&Fixture> {
        self.fixtures.iter().filter(|f| f.is_finished()).collect()
    }

    /// Assemble the engine input for one fixture.
    pub fn context_for(&self, fixture_id: i64) -> Result<MatchContext, SnapshotError> {
        let fixture = self
            .fixture(fixture_id)
            .ok_or(SnapshotError::UnknownFixture(fixture_id))?;
        let team = |team_id: i64| {
            self.team(team_id)
                .cloned()
                .ok_or(SnapshotError::UnknownTeam {
                    fixture_id,
                    team_id,
                })
        };
        let home_team = team(fixture.home_team_id)?;
        let away_team = team(fixture.away_team_id)?;

        let injury_report = |team_id: i64| {
            self.injuries.as_ref().map(|all| {
                all.iter()
                    .filter(|i| i.team_id == team_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
        };

        let mut head_to_head: Vec<Fixture> = self
            .fixtures
            .iter()
            .filter(|f| {
                f.id != fixture_id
                    && f.is_finished()
                    && f.involves_pair(fixture.home_team_id, fixture.away_team_id)
            })
            .cloned()
            .collect();
        head_to_head.sort_by(|a, b| b.kickoff_time.cmp(&a.kickoff_time));
        head_to_head.truncate(H2H_WINDOW);

        Ok(MatchContext {
            fixture: fixture.clone(),
            home_standing: self.standing_for(home_team.id).cloned(),
            away_standing: self.standing_for(away_team.id).cloned(),
            home_injuries: injury_report(home_team.id),
            away_injuries: injury_report(away_team.id),
            head_to_head,
            aggregations: self
                .aggregations
                .iter()
                .filter(|a| a.fixture_id == fixture_id)
                .cloned()
                .collect(),
            odds: self
                .odds
                .iter()
                .filter(|o| o.fixture_id == fixture_id)
                .cloned()
                .collect(),
            home_team,
            away_team,
        })
    }
}

// ---------------------------------------------------------------------------
// Standings CSV
// ---------------------------------------------------------------------------

/// League-table CSV row. Common short headers are accepted as aliases and
/// extra columns are ignored.
#[derive(Debug, Deserialize)]
struct RawStandingRow {
    team_id: i64,
    league_id: i64,
    #[serde(alias = "pos")]
    position: u32,
    #[serde(alias = "pts")]
    points: i32,
    #[serde(default, alias = "w")]
    wins: u32,
    #[serde(default, alias = "d")]
    draws: u32,
    #[serde(default, alias = "l")]
    losses: u32,
    #[serde(default, alias = "gf")]
    goals_for: u32,
    #[serde(default, alias = "ga")]
    goals_against: u32,
    #[serde(default, alias = "gd")]
    goal_difference: Option<i32>,
    #[serde(default)]
    home_wins: u32,
    #[serde(default)]
    home_draws: u32,
    #[serde(default)]
    home_losses: u32,
    #[serde(default)]
    away_wins: u32,
    #[serde(default)]
    away_draws: u32,
    #[serde(default)]
    away_losses: u32,
    #[serde(flatten)]
    _extra: HashMap<String, serde_json::Value>,
}

impl From<RawStandingRow> for Standing {
    fn from(raw: RawStandingRow) -> Self {
        Standing {
            team_id: raw.team_id,
            league_id: raw.league_id,
            position: raw.position,
            points: raw.points,
            wins: raw.wins,
            draws: raw.draws,
            losses: raw.losses,
            goals_for: raw.goals_for,
            goals_against: raw.goals_against,
            goal_difference: raw
                .goal_difference
                .unwrap_or(raw.goals_for as i32 - raw.goals_against as i32),
            home_wins: raw.home_wins,
            home_draws: raw.home_draws,
            home_losses: raw.home_losses,
            away_wins: raw.away_wins,
            away_draws: raw.away_draws,
            away_losses: raw.away_losses,
        }
    }
}

fn load_standings_from_reader<R: Read>(rdr: R) -> Result<Vec<Standing>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut standings = Vec::new();
    for result in reader.deserialize::<RawStandingRow>() {
        match result {
            Ok(raw) => standings.push(Standing::from(raw)),
            Err(e) => warn!("skipping malformed standings row: {}", e),
        }
    }
    Ok(standings)
}

/// Read a league table from CSV. Malformed rows are skipped with a warning.
pub fn load_standings_csv(path: &Path) -> Result<Vec<Standing>, SnapshotError> {
    let file = std::fs::File::open(path).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_standings_from_reader(file).map_err(|e| SnapshotError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AbsenceKind, AvailabilityStatus, Outcome};

    const SNAPSHOT: &str = r#"{
        "teams": [
            {"id": 1, "name": "Rovers", "league_id": 10},
            {"id": 2, "name": "United", "league_id": 10},
            {"id": 3, "name": "Athletic", "league_id": 10}
        ],
        "fixtures": [
            {"id": 100, "home_team_id": 1, "away_team_id": 2, "league_id": 10,
             "kickoff_time": "2025-08-16T15:00:00", "importance_level": "Derby"},
            {"id": 90, "home_team_id": 2, "away_team_id": 1, "league_id": 10,
             "kickoff_time": "2025-03-01T15:00:00", "status": "Finished",
             "home_score": 0, "away_score": 2},
            {"id": 80, "home_team_id": 1, "away_team_id": 2, "league_id": 10,
             "kickoff_time": "2024-10-05T15:00:00", "status": "Finished",
             "home_score": 1, "away_score": 1},
            {"id": 70, "home_team_id": 1, "away_team_id": 3, "league_id": 10,
             "kickoff_time": "2025-02-01T15:00:00", "status": "Finished",
             "home_score": 3, "away_score": 0},
            {"id": 60, "home_team_id": 2, "away_team_id": 3, "league_id": 10,
             "kickoff_time": "2025-08-17T12:30:00", "status": "Postponed"}
        ],
        "standings": [
            {"team_id": 1, "league_id": 10, "position": 2, "points": 40},
            {"team_id": 2, "league_id": 10, "position": 7, "points": 30}
        ],
        "injuries": [
            {"player_id": 5, "team_id": 2, "player_name": "Keeper", "kind": "Injury",
             "status": "Out"}
        ],
        "aggregations": [
            {"fixture_id": 100, "source_name": "model-a", "prediction": "Home"},
            {"fixture_id": 90, "source_name": "model-a", "prediction": "Away"}
        ],
        "odds": [
            {"fixture_id": 100, "bookmaker": "book", "home_odds": 1.9, "draw_odds": 3.4,
             "away_odds": 4.2}
        ]
    }"#;

    fn snapshot() -> DataSnapshot {
        serde_json::from_str(SNAPSHOT).unwrap()
    }

    #[test]
    fn context_collects_fixture_data() {
        let ctx = snapshot().context_for(100).unwrap();
        assert_eq!(ctx.home_team.name, "Rovers");
        assert_eq!(ctx.away_team.name, "United");
        assert_eq!(ctx.home_standing.as_ref().unwrap().position, 2);
        assert_eq!(ctx.aggregations.len(), 1);
        assert_eq!(ctx.aggregations[0].prediction, Outcome::Home);
        assert_eq!(ctx.odds.len(), 1);
    }

    #[test]
    fn head_to_head_is_newest_first_and_pair_only() {
        let ctx = snapshot().context_for(100).unwrap();
        let ids: Vec<i64> = ctx.head_to_head.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![90, 80]);
    }

    #[test]
    fn injury_reports_are_split_by_team() {
        let ctx = snapshot().context_for(100).unwrap();
        assert_eq!(ctx.home_injuries, Some(vec![]));
        let away = ctx.away_injuries.unwrap();
        assert_eq!(away.len(), 1);
        assert_eq!(away[0].kind, AbsenceKind::Injury);
        assert_eq!(away[0].status, AvailabilityStatus::Out);
    }

    #[test]
    fn missing_injury_feed_gives_no_reports() {
        let mut snap = snapshot();
        snap.injuries = None;
        let ctx = snap.context_for(100).unwrap();
        assert!(ctx.home_injuries.is_none());
        assert!(ctx.away_injuries.is_none());
    }

    #[test]
    fn unknown_ids_are_errors() {
        let snap = snapshot();
        assert!(matches!(
            snap.context_for(999),
            Err(SnapshotError::UnknownFixture(999))
        ));

        let mut snap = snapshot();
        snap.teams.retain(|t| t.id != 2);
        assert!(matches!(
            snap.context_for(100),
            Err(SnapshotError::UnknownTeam {
                fixture_id: 100,
                team_id: 2
            })
        ));
    }

    #[test]
    fn upcoming_and_finished_filter_by_status() {
        let snap = snapshot();
        let upcoming: Vec<i64> = snap.upcoming().iter().map(|f| f.id).collect();
        assert_eq!(upcoming, vec![100]);
        let finished: Vec<i64> = snap.finished().iter().map(|f| f.id).collect();
        assert_eq!(finished, vec![90, 80, 70]);
    }

    #[test]
    fn sparse_snapshot_uses_defaults() {
        let snap: DataSnapshot = serde_json::from_str(r#"{"teams": []}"#).unwrap();
        assert!(snap.fixtures.is_empty());
        assert!(snap.injuries.is_none());
    }

    #[test]
    fn standings_csv_with_aliases_and_extras() {
        let csv_data = "\
team_id,league_id,pos,pts,w,d,l,gf,ga,form
1,10,1,80,25,5,2,70,20,WWWDW
2,10,18,20,4,8,20,25,60,LLDLL
";
        let standings = load_standings_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].position, 1);
        assert_eq!(standings[0].points, 80);
        assert_eq!(standings[0].goal_difference, 50);
        assert_eq!(standings[1].goal_difference, -35);
        assert_eq!(standings[1].home_wins, 0);
    }

    #[test]
    fn standings_csv_skips_malformed_rows() {
        let csv_data = "\
team_id,league_id,position,points,goal_difference
1,10,1,80,12
x,10,2,70,5
3,10,3,60,-2
";
        let standings = load_standings_from_reader(csv_data.as_bytes()).unwrap();
        let ids: Vec<i64> = standings.iter().map(|s| s.team_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(standings[1].goal_difference, -2);
    }

    #[test]
    fn merge_standings_replaces_by_team() {
        let mut snap = snapshot();
        let mut updated = snap.standing_for(2).cloned().unwrap();
        updated.position = 3;
        let mut newcomer = updated.clone();
        newcomer.team_id = 3;
        snap.merge_standings(vec![updated, newcomer]);

        assert_eq!(snap.standings.len(), 3);
        assert_eq!(snap.standing_for(2).unwrap().position, 3);
        assert_eq!(snap.standing_for(1).unwrap().position, 2);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = DataSnapshot::load(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}
