// Domain records read by the prediction engine: fixtures, teams, standings,
// injuries, external prediction sources and bookmaker odds.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Categorical match outcome from the home team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// Parse an outcome label. Accepts the canonical names plus the common
    /// single-letter shorthand (`1`/`X`/`2`, `H`/`D`/`A`).
    pub fn from_str_outcome(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HOME" | "H" | "1" => Some(Outcome::Home),
            "DRAW" | "D" | "X" => Some(Outcome::Draw),
            "AWAY" | "A" | "2" => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Home => "Home",
            Outcome::Draw => "Draw",
            Outcome::Away => "Away",
        }
    }

    /// Outcome implied by a final score.
    pub fn from_score(home_goals: u32, away_goals: u32) -> Self {
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => Outcome::Home,
            std::cmp::Ordering::Less => Outcome::Away,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// Match status as reported by the fixture feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FixtureStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "1st Half")]
    FirstHalf,
    #[serde(rename = "Half Time")]
    HalfTime,
    #[serde(rename = "2nd Half")]
    SecondHalf,
    #[serde(rename = "In Progress")]
    InProgress,
    Finished,
    Postponed,
    Cancelled,
}

/// Special significance attached to a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportanceLevel {
    Derby,
    Final,
    #[serde(rename = "Semi-Final")]
    SemiFinal,
    Relegation,
    #[serde(rename = "Champions League")]
    ChampionsLeague,
    #[serde(rename = "Europa League")]
    EuropaLeague,
}

impl ImportanceLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ImportanceLevel::Derby => "Derby",
            ImportanceLevel::Final => "Final",
            ImportanceLevel::SemiFinal => "Semi-Final",
            ImportanceLevel::Relegation => "Relegation",
            ImportanceLevel::ChampionsLeague => "Champions League",
            ImportanceLevel::EuropaLeague => "Europa League",
        }
    }

    /// Knockout-style or rivalry fixtures where the home crowd counts for more.
    pub fn boosts_home(&self) -> bool {
        matches!(
            self,
            ImportanceLevel::Derby | ImportanceLevel::Final | ImportanceLevel::SemiFinal
        )
    }
}

/// A single scheduled or completed match between two teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub league_id: i64,
    pub kickoff_time: NaiveDateTime,
    #[serde(default)]
    pub status: FixtureStatus,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub round_info: Option<String>,
    #[serde(default)]
    pub importance_level: Option<ImportanceLevel>,
}

impl Fixture {
    pub fn is_finished(&self) -> bool {
        self.status == FixtureStatus::Finished
    }

    /// Whether this fixture was played between `a` and `b`, in either
    /// orientation.
    pub fn involves_pair(&self, a: i64, b: i64) -> bool {
        (self.home_team_id == a && self.away_team_id == b)
            || (self.home_team_id == b && self.away_team_id == a)
    }

    /// Final outcome, only for finished fixtures.
    pub fn result(&self) -> Option<Outcome> {
        self.is_finished()
            .then(|| Outcome::from_score(self.home_score, self.away_score))
    }
}

// ---------------------------------------------------------------------------
// Teams and standings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub league_id: Option<i64>,
}

/// League-table snapshot for one team. Counters missing from the source
/// default to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub team_id: i64,
    pub league_id: i64,
    pub position: u32,
    #[serde(default)]
    pub points: i32,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub draws: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub goals_for: u32,
    #[serde(default)]
    pub goals_against: u32,
    #[serde(default)]
    pub goal_difference: i32,
    #[serde(default)]
    pub home_wins: u32,
    #[serde(default)]
    pub home_draws: u32,
    #[serde(default)]
    pub home_losses: u32,
    #[serde(default)]
    pub away_wins: u32,
    #[serde(default)]
    pub away_draws: u32,
    #[serde(default)]
    pub away_losses: u32,
}

impl Standing {
    pub fn home_played(&self) -> u32 {
        self.home_wins + self.home_draws + self.home_losses
    }

    pub fn away_played(&self) -> u32 {
        self.away_wins + self.away_draws + self.away_losses
    }
}

// ---------------------------------------------------------------------------
// Injuries and suspensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbsenceKind {
    Injury,
    Suspension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    Out,
    Doubtful,
    Back,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjurySuspension {
    pub player_id: i64,
    pub team_id: i64,
    pub player_name: String,
    pub kind: AbsenceKind,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: AvailabilityStatus,
}

impl InjurySuspension {
    pub fn is_out(&self) -> bool {
        self.status == AvailabilityStatus::Out
    }
}

// ---------------------------------------------------------------------------
// External signals
// ---------------------------------------------------------------------------

/// One external source's call for a fixture. Sources may label the call
/// with tipster shorthand (`1`/`X`/`2`, `H`/`D`/`A`) as well as the full name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionAggregation {
    pub fixture_id: i64,
    pub source_name: String,
    #[serde(deserialize_with = "outcome_label")]
    pub prediction: Outcome,
    #[serde(default)]
    pub confidence: Option<f64>,
}

fn outcome_label<'de, D>(deserializer: D) -> Result<Outcome, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let label = String::deserialize(deserializer)?;
    Outcome::from_str_outcome(&label)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown outcome label '{label}'")))
}

/// One bookmaker's decimal 1X2 odds for a fixture. Any leg may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BettingOdds {
    pub fixture_id: i64,
    pub bookmaker: String,
    #[serde(default)]
    pub home_odds: Option<f64>,
    #[serde(default)]
    pub draw_odds: Option<f64>,
    #[serde(default)]
    pub away_odds: Option<f64>,
}

impl BettingOdds {
    /// All three legs, only when each is present and strictly positive.
    pub fn complete_legs(&self) -> Option<(f64, f64, f64)> {
        match (self.home_odds, self.draw_odds, self.away_odds) {
            (Some(h), Some(d), Some(a)) if h > 0.0 && d > 0.0 && a > 0.0 => Some((h, d, a)),
            _ => None,
        }
    }
}
