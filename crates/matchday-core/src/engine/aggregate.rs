// Weighted fusion of analyzer scores and threshold classification.

use crate::config::{Thresholds, Weights};
use crate::engine::criteria::{CriteriaScores, Criterion};
use crate::model::Outcome;

/// Raw weighted totals plus the derived percentage split.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub home_score: f64,
    pub away_score: f64,
    pub home_percentage: f64,
    pub away_percentage: f64,
    /// One entry per missing criterion, in criterion order.
    pub warnings: Vec<String>,
}

impl Aggregate {
    pub fn is_finite(&self) -> bool {
        self.home_score.is_finite()
            && self.away_score.is_finite()
            && self.home_percentage.is_finite()
            && self.away_percentage.is_finite()
    }
}

/// Fold every present criterion into home/away totals by weight.
///
/// Two-sided criteria contribute `score * weight / 100` to each side. The AI
/// consensus only contributes `weight / 100` to the side it favours, and
/// nothing when it calls a draw.
pub fn aggregate(scores: &CriteriaScores, weights: &Weights) -> Aggregate {
    let mut home_score = 0.0;
    let mut away_score = 0.0;
    let mut warnings = Vec::new();

    for criterion in Criterion::ALL {
        let weight = weights.for_criterion(criterion) / 100.0;

        if criterion == Criterion::AiPredictions {
            match scores.ai_predictions.as_ref().map(|ai| ai.prediction) {
                Some(Outcome::Home) => home_score += weight,
                Some(Outcome::Away) => away_score += weight,
                Some(Outcome::Draw) => {}
                None => warnings.extend(criterion.missing_warning().map(String::from)),
            }
            continue;
        }

        match scores.sided(criterion) {
            Some(score) => {
                home_score += score.home_score() * weight;
                away_score += score.away_score() * weight;
            }
            None => warnings.extend(criterion.missing_warning().map(String::from)),
        }
    }

    let total = home_score + away_score;
    let (home_percentage, away_percentage) = if total > 0.0 {
        (home_score / total * 100.0, away_score / total * 100.0)
    } else {
        (50.0, 50.0)
    };

    Aggregate {
        home_score,
        away_score,
        home_percentage,
        away_percentage,
        warnings,
    }
}

/// Map the percentage split to an outcome and its pre-normalization
/// confidence.
///
/// The draw band (`draw_min..=draw_max`) is informational; anything that is
/// neither a home nor an away call is a draw.
pub fn classify(home_percentage: f64, away_percentage: f64, thresholds: &Thresholds) -> (Outcome, f64) {
    if home_percentage >= thresholds.home_win {
        (Outcome::Home, home_percentage)
    } else if away_percentage >= 100.0 - thresholds.away_win {
        (Outcome::Away, away_percentage)
    } else {
        (Outcome::Draw, 100.0 - home_percentage.max(away_percentage))
    }
}
