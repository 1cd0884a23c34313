// Human-readable reasoning and confidence tiers.

use serde::{Deserialize, Serialize};

use crate::engine::criteria::CriteriaScores;
use crate::model::Outcome;

const HIGH_CONFIDENCE: f64 = 70.0;
const MODERATE_CONFIDENCE: f64 = 50.0;

/// Coarse confidence band used by the explanation and by displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceTier {
    High,
    Moderate,
    Low,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceTier::High
        } else if confidence >= MODERATE_CONFIDENCE {
            ConfidenceTier::Moderate
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "High",
            ConfidenceTier::Moderate => "Moderate",
            ConfidenceTier::Low => "Low",
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "\u{1F7E2}",
            ConfidenceTier::Moderate => "\u{1F7E1}",
            ConfidenceTier::Low => "\u{1F534}",
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ConfidenceTier::High => {
                "**High confidence** prediction based on multiple strong indicators."
            }
            ConfidenceTier::Moderate => {
                "**Moderate confidence** prediction with some supporting data."
            }
            ConfidenceTier::Low => {
                "**Low confidence** prediction due to limited data availability."
            }
        }
    }
}

/// "Home Win", "Away Win" or "Draw".
pub fn outcome_phrase(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Home => "Home Win",
        Outcome::Away => "Away Win",
        Outcome::Draw => "Draw",
    }
}

/// Short one-line display, e.g. `"🟢 72.5% Home Win"`.
pub fn confidence_display(prediction: Outcome, confidence: f64) -> String {
    let tier = ConfidenceTier::from_confidence(confidence);
    format!("{} {:.1}% {}", tier.marker(), confidence, outcome_phrase(prediction))
}

/// Build the reasoning text for a finished prediction. Deterministic for
/// identical inputs.
pub fn reasoning(
    home_name: &str,
    away_name: &str,
    prediction: Outcome,
    confidence: f64,
    scores: &CriteriaScores,
    warnings: &[String],
) -> String {
    let mut lines = vec![
        format!(
            "**{} Predicted** ({:.1}% confidence)",
            outcome_phrase(prediction),
            confidence
        ),
        String::new(),
    ];

    let facts = key_factors(home_name, away_name, scores);
    if !facts.is_empty() {
        lines.push("**Key Factors:**".to_string());
        lines.extend(facts.into_iter().map(|f| format!("\u{2022} {f}")));
        lines.push(String::new());
    }

    if !warnings.is_empty() {
        lines.push("**Data Warnings:**".to_string());
        lines.extend(warnings.iter().map(|w| format!("\u{2022} {w}")));
        lines.push(String::new());
    }

    lines.push(ConfidenceTier::from_confidence(confidence).summary().to_string());
    lines.join("\n")
}

fn key_factors(home_name: &str, away_name: &str, scores: &CriteriaScores) -> Vec<String> {
    let mut facts = Vec::new();

    if let Some(form) = &scores.form_standings {
        facts.push(format!(
            "League Position: {home_name} ({}) vs {away_name} ({})",
            form.home_position, form.away_position
        ));
    }
    if let Some(ha) = &scores.home_away {
        facts.push(format!(
            "Home/Away Form: {:.1}% home wins vs {:.1}% away wins",
            ha.home_win_rate, ha.away_win_rate
        ));
    }
    if let Some(pa) = &scores.player_availability {
        if pa.home_injuries > 0 || pa.away_injuries > 0 {
            facts.push(format!(
                "Player Availability: {} home injuries, {} away injuries",
                pa.home_injuries, pa.away_injuries
            ));
        }
    }
    if let Some(ai) = &scores.ai_predictions {
        facts.push(format!(
            "AI Consensus: {} ({} sources)",
            ai.prediction, ai.total_sources
        ));
    }

    facts
}
