// Per-criterion score records produced by the signal analyzers.
//
// Every record is serializable so callers can persist the breakdown next to
// the categorical prediction and rebuild the explanation from it later.

use serde::{Deserialize, Serialize};

use crate::model::Outcome;

// ---------------------------------------------------------------------------
// Criterion identity
// ---------------------------------------------------------------------------

/// The eight signals fused by the engine, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    FormStandings,
    HomeAway,
    PlayerAvailability,
    MatchStats,
    #[serde(rename = "h2h")]
    HeadToHead,
    AiPredictions,
    OddsAgreement,
    Intangibles,
}

impl Criterion {
    pub const ALL: [Criterion; 8] = [
        Criterion::FormStandings,
        Criterion::HomeAway,
        Criterion::PlayerAvailability,
        Criterion::MatchStats,
        Criterion::HeadToHead,
        Criterion::AiPredictions,
        Criterion::OddsAgreement,
        Criterion::Intangibles,
    ];

    /// Stable key used in serialized breakdowns and config field names.
    pub fn key(&self) -> &'static str {
        match self {
            Criterion::FormStandings => "form_standings",
            Criterion::HomeAway => "home_away",
            Criterion::PlayerAvailability => "player_availability",
            Criterion::MatchStats => "match_stats",
            Criterion::HeadToHead => "h2h",
            Criterion::AiPredictions => "ai_predictions",
            Criterion::OddsAgreement => "odds_agreement",
            Criterion::Intangibles => "intangibles",
        }
    }

    /// Warning shown when this criterion could not be computed.
    /// Intangibles always computes, so it has none.
    pub fn missing_warning(&self) -> Option<&'static str> {
        match self {
            Criterion::FormStandings => Some("Form data missing, confidence reduced"),
            Criterion::HomeAway => Some("Home/Away stats missing, using average"),
            Criterion::PlayerAvailability => {
                Some("Player availability data missing, confidence reduced")
            }
            Criterion::MatchStats => Some("Team statistics missing, using form only"),
            Criterion::HeadToHead => Some("Head-to-head data limited, reduced weight"),
            Criterion::AiPredictions => Some("AI predictions unavailable, using manual analysis"),
            Criterion::OddsAgreement => Some("Odds unavailable, using form stats only"),
            Criterion::Intangibles => None,
        }
    }
}

/// Home/away score pair on the common (unnormalized) analyzer scale.
pub trait SidedScore {
    fn home_score(&self) -> f64;
    fn away_score(&self) -> f64;
}

macro_rules! sided_score {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SidedScore for $ty {
                fn home_score(&self) -> f64 {
                    self.home_score
                }
                fn away_score(&self) -> f64 {
                    self.away_score
                }
            }
        )*
    };
}

// ---------------------------------------------------------------------------
// Score records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormStandingsScore {
    pub home_score: f64,
    pub away_score: f64,
    pub home_position: u32,
    pub away_position: u32,
    /// Home points minus away points.
    pub points_difference: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeAwayScore {
    pub home_score: f64,
    pub away_score: f64,
    /// Home team's home win rate, percent, 1 decimal.
    pub home_win_rate: f64,
    /// Away team's away win rate, percent, 1 decimal.
    pub away_win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityScore {
    pub home_score: f64,
    pub away_score: f64,
    pub home_injuries: u32,
    pub away_injuries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatsScore {
    pub home_score: f64,
    pub away_score: f64,
    pub home_goal_diff: i32,
    pub away_goal_diff: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHeadScore {
    pub home_score: f64,
    pub away_score: f64,
    pub home_wins: u32,
    pub away_wins: u32,
    pub draws: u32,
    pub total_games: u32,
}

/// Majority call of the external prediction sources. Has no home/away pair:
/// it only awards its weight to the winning side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusScore {
    pub prediction: Outcome,
    pub confidence: f64,
    pub home_count: u32,
    pub draw_count: u32,
    pub away_count: u32,
    pub total_sources: u32,
}

impl ConsensusScore {
    /// Consensus confidence scaled by how many sources voted; ten or more
    /// sources count in full.
    pub fn source_adjusted_confidence(&self) -> f64 {
        let coverage = (self.total_sources as f64 / 10.0).min(1.0);
        self.confidence * coverage
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsScore {
    pub home_score: f64,
    pub away_score: f64,
    /// Every odds row for the fixture, including incomplete ones.
    pub bookmaker_count: u32,
    pub home_probability: f64,
    pub draw_probability: f64,
    pub away_probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntangiblesScore {
    pub home_score: f64,
    pub away_score: f64,
    pub factors: Vec<String>,
}

sided_score!(
    FormStandingsScore,
    HomeAwayScore,
    AvailabilityScore,
    MatchStatsScore,
    HeadToHeadScore,
    OddsScore,
    IntangiblesScore,
);

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

/// Criterion name -> score record. Absent criteria are omitted from the
/// serialized form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_standings: Option<FormStandingsScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_away: Option<HomeAwayScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_availability: Option<AvailabilityScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_stats: Option<MatchStatsScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h2h: Option<HeadToHeadScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_predictions: Option<ConsensusScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_agreement: Option<OddsScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intangibles: Option<IntangiblesScore>,
}

impl CriteriaScores {
    pub fn is_present(&self, criterion: Criterion) -> bool {
        match criterion {
            Criterion::FormStandings => self.form_standings.is_some(),
            Criterion::HomeAway => self.home_away.is_some(),
            Criterion::PlayerAvailability => self.player_availability.is_some(),
            Criterion::MatchStats => self.match_stats.is_some(),
            Criterion::HeadToHead => self.h2h.is_some(),
            Criterion::AiPredictions => self.ai_predictions.is_some(),
            Criterion::OddsAgreement => self.odds_agreement.is_some(),
            Criterion::Intangibles => self.intangibles.is_some(),
        }
    }

    /// The home/away pair for a two-sided criterion, `None` when it is absent
    /// or when the criterion is the single-sided AI consensus.
    pub fn sided(&self, criterion: Criterion) -> Option<&dyn SidedScore> {
        match criterion {
            Criterion::FormStandings => self.form_standings.as_ref().map(|s| s as &dyn SidedScore),
            Criterion::HomeAway => self.home_away.as_ref().map(|s| s as &dyn SidedScore),
            Criterion::PlayerAvailability => self
                .player_availability
                .as_ref()
                .map(|s| s as &dyn SidedScore),
            Criterion::MatchStats => self.match_stats.as_ref().map(|s| s as &dyn SidedScore),
            Criterion::HeadToHead => self.h2h.as_ref().map(|s| s as &dyn SidedScore),
            Criterion::AiPredictions => None,
            Criterion::OddsAgreement => self.odds_agreement.as_ref().map(|s| s as &dyn SidedScore),
            Criterion::Intangibles => self.intangibles.as_ref().map(|s| s as &dyn SidedScore),
        }
    }

    pub fn present_count(&self) -> usize {
        Criterion::ALL
            .iter()
            .filter(|c| self.is_present(**c))
            .count()
    }

    pub fn missing(&self) -> impl Iterator<Item = Criterion> + '_ {
        Criterion::ALL.into_iter().filter(|c| !self.is_present(*c))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CriteriaScores {
        CriteriaScores {
            form_standings: Some(FormStandingsScore {
                home_score: 115.0,
                away_score: 10.0,
                home_position: 1,
                away_position: 18,
                points_difference: 60,
            }),
            home_away: Some(HomeAwayScore {
                home_score: 61.0,
                away_score: 12.0,
                home_win_rate: 60.0,
                away_win_rate: 20.0,
            }),
            player_availability: Some(AvailabilityScore {
                home_score: 70.0,
                away_score: 100.0,
                home_injuries: 2,
                away_injuries: 0,
            }),
            ai_predictions: Some(ConsensusScore {
                prediction: Outcome::Home,
                confidence: 66.66666666666667,
                home_count: 2,
                draw_count: 1,
                away_count: 0,
                total_sources: 3,
            }),
            intangibles: Some(IntangiblesScore {
                home_score: 55.0,
                away_score: 50.0,
                factors: vec!["Weekend fixture advantage".into()],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn keys_match_serialized_criterion_names() {
        for criterion in Criterion::ALL {
            let json = serde_json::to_string(&criterion).unwrap();
            assert_eq!(json, format!("\"{}\"", criterion.key()));
        }
    }

    #[test]
    fn only_intangibles_lacks_a_warning() {
        let silent: Vec<_> = Criterion::ALL
            .iter()
            .filter(|c| c.missing_warning().is_none())
            .collect();
        assert_eq!(silent, vec![&Criterion::Intangibles]);
    }

    #[test]
    fn serialized_breakdown_omits_absent_criteria() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert!(keys.contains(&"form_standings"));
        assert!(keys.contains(&"ai_predictions"));
        assert!(!keys.contains(&"h2h"));
        assert!(!keys.contains(&"odds_agreement"));
    }

    #[test]
    fn breakdown_json_preserves_explanation_fields() {
        let original = sample();
        let restored = CriteriaScores::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(restored, original);
        assert_eq!(restored.present_count(), 5);

        let form = restored.form_standings.unwrap();
        assert_eq!((form.home_position, form.away_position), (1, 18));
        let ha = restored.home_away.unwrap();
        assert_eq!((ha.home_win_rate, ha.away_win_rate), (60.0, 20.0));
        let pa = restored.player_availability.unwrap();
        assert_eq!((pa.home_injuries, pa.away_injuries), (2, 0));
        let ai = restored.ai_predictions.unwrap();
        assert_eq!((ai.prediction, ai.total_sources), (Outcome::Home, 3));
    }

    #[test]
    fn consensus_is_not_sided() {
        let scores = sample();
        assert!(scores.is_present(Criterion::AiPredictions));
        assert!(scores.sided(Criterion::AiPredictions).is_none());
        let form = scores.sided(Criterion::FormStandings).unwrap();
        assert_eq!(form.home_score(), 115.0);
    }

    #[test]
    fn source_adjusted_confidence_scales_with_sources() {
        let mut ai = sample().ai_predictions.unwrap();
        ai.confidence = 80.0;
        ai.total_sources = 5;
        assert!((ai.source_adjusted_confidence() - 40.0).abs() < 1e-9);
        ai.total_sources = 12;
        assert!((ai.source_adjusted_confidence() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn missing_lists_absent_in_order() {
        let missing: Vec<_> = sample().missing().collect();
        assert_eq!(
            missing,
            vec![
                Criterion::MatchStats,
                Criterion::HeadToHead,
                Criterion::OddsAgreement
            ]
        );
    }
}
