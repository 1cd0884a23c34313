// Prediction accuracy tracking against finished fixtures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::{round1, PredictionResult};
use crate::model::{Fixture, Outcome};

/// A stored prediction checked against the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub fixture_id: i64,
    /// Day the fixture kicked off; grades are filed under this date.
    pub kickoff_date: NaiveDate,
    pub predicted: Outcome,
    pub actual: Outcome,
}

impl Grade {
    pub fn is_correct(&self) -> bool {
        self.predicted == self.actual
    }
}

/// Grade a prediction. `None` until the fixture is finished.
pub fn grade(prediction: &PredictionResult, fixture: &Fixture) -> Option<Grade> {
    Some(Grade {
        fixture_id: fixture.id,
        kickoff_date: fixture.kickoff_time.date(),
        predicted: prediction.prediction,
        actual: fixture.result()?,
    })
}

fn accuracy(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(correct as f64 / total as f64 * 100.0)
    }
}

/// Predicted/correct counts for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub predicted: u32,
    pub correct: u32,
}

impl OutcomeTally {
    pub fn accuracy_percentage(&self) -> f64 {
        accuracy(self.correct, self.predicted)
    }

    fn merge(&mut self, other: &OutcomeTally) {
        self.predicted += other.predicted;
        self.correct += other.correct;
    }
}

/// One day's graded predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPerformance {
    pub date: NaiveDate,
    pub total_predictions: u32,
    pub correct_predictions: u32,
    pub home: OutcomeTally,
    pub draw: OutcomeTally,
    pub away: OutcomeTally,
}

impl DailyPerformance {
    pub fn new(date: NaiveDate) -> Self {
        DailyPerformance {
            date,
            total_predictions: 0,
            correct_predictions: 0,
            home: OutcomeTally::default(),
            draw: OutcomeTally::default(),
            away: OutcomeTally::default(),
        }
    }

    pub fn record(&mut self, grade: &Grade) {
        let correct = grade.is_correct() as u32;
        self.total_predictions += 1;
        self.correct_predictions += correct;
        let tally = self.tally_mut(grade.predicted);
        tally.predicted += 1;
        tally.correct += correct;
    }

    pub fn tally(&self, outcome: Outcome) -> &OutcomeTally {
        match outcome {
            Outcome::Home => &self.home,
            Outcome::Draw => &self.draw,
            Outcome::Away => &self.away,
        }
    }

    fn tally_mut(&mut self, outcome: Outcome) -> &mut OutcomeTally {
        match outcome {
            Outcome::Home => &mut self.home,
            Outcome::Draw => &mut self.draw,
            Outcome::Away => &mut self.away,
        }
    }

    pub fn accuracy_percentage(&self) -> f64 {
        accuracy(self.correct_predictions, self.total_predictions)
    }
}

/// Group grades into one row per kickoff date, oldest first. Grading the
/// same fixtures again yields the same rows, so storing them is idempotent.
pub fn tally_by_kickoff_date(grades: &[Grade]) -> Vec<DailyPerformance> {
    let mut days: BTreeMap<NaiveDate, DailyPerformance> = BTreeMap::new();
    for grade in grades {
        days.entry(grade.kickoff_date)
            .or_insert_with(|| DailyPerformance::new(grade.kickoff_date))
            .record(grade);
    }
    days.into_values().collect()
}

/// Accuracy across a range of days.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub days: usize,
    pub total_predictions: u32,
    pub correct_predictions: u32,
    pub home: OutcomeTally,
    pub draw: OutcomeTally,
    pub away: OutcomeTally,
}

impl PerformanceSummary {
    pub fn from_days(days: &[DailyPerformance]) -> Self {
        let mut summary = PerformanceSummary {
            days: days.len(),
            ..Default::default()
        };
        for day in days {
            summary.total_predictions += day.total_predictions;
            summary.correct_predictions += day.correct_predictions;
            summary.home.merge(&day.home);
            summary.draw.merge(&day.draw);
            summary.away.merge(&day.away);
        }
        summary
    }

    pub fn overall_accuracy(&self) -> f64 {
        accuracy(self.correct_predictions, self.total_predictions)
    }

    pub fn home_accuracy(&self) -> f64 {
        self.home.accuracy_percentage()
    }

    pub fn draw_accuracy(&self) -> f64 {
        self.draw.accuracy_percentage()
    }

    pub fn away_accuracy(&self) -> f64 {
        self.away.accuracy_percentage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FixtureStatus;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn fixture(status: FixtureStatus, home: u32, away: u32) -> Fixture {
        Fixture {
            id: 3,
            home_team_id: 1,
            away_team_id: 2,
            league_id: 1,
            kickoff_time: date(13).and_hms_opt(15, 0, 0).unwrap(),
            status,
            home_score: home,
            away_score: away,
            venue: None,
            round_info: None,
            importance_level: None,
        }
    }

    fn predicted(outcome: Outcome) -> PredictionResult {
        PredictionResult {
            prediction: outcome,
            ..PredictionResult::fallback()
        }
    }

    fn g(predicted: Outcome, actual: Outcome) -> Grade {
        Grade {
            fixture_id: 1,
            kickoff_date: date(13),
            predicted,
            actual,
        }
    }

    #[test]
    fn grade_waits_for_final_whistle() {
        let p = predicted(Outcome::Home);
        assert!(grade(&p, &fixture(FixtureStatus::SecondHalf, 2, 0)).is_none());

        let graded = grade(&p, &fixture(FixtureStatus::Finished, 2, 0)).unwrap();
        assert_eq!(graded.actual, Outcome::Home);
        assert_eq!(graded.kickoff_date, date(13));
        assert!(graded.is_correct());

        let graded = grade(&p, &fixture(FixtureStatus::Finished, 1, 1)).unwrap();
        assert_eq!(graded.actual, Outcome::Draw);
        assert!(!graded.is_correct());
    }

    #[test]
    fn daily_tallies_by_predicted_outcome() {
        let mut day = DailyPerformance::new(date(13));
        day.record(&g(Outcome::Home, Outcome::Home));
        day.record(&g(Outcome::Home, Outcome::Away));
        day.record(&g(Outcome::Draw, Outcome::Draw));

        assert_eq!(day.total_predictions, 3);
        assert_eq!(day.correct_predictions, 2);
        assert_eq!(*day.tally(Outcome::Home), OutcomeTally { predicted: 2, correct: 1 });
        assert_eq!(day.tally(Outcome::Away).predicted, 0);
        assert_eq!(day.accuracy_percentage(), 66.7);
    }

    #[test]
    fn empty_day_has_zero_accuracy() {
        assert_eq!(DailyPerformance::new(date(1)).accuracy_percentage(), 0.0);
    }

    #[test]
    fn summary_merges_days() {
        let mut a = DailyPerformance::new(date(13));
        a.record(&g(Outcome::Home, Outcome::Home));
        a.record(&g(Outcome::Away, Outcome::Home));
        let mut b = DailyPerformance::new(date(14));
        b.record(&g(Outcome::Home, Outcome::Draw));
        b.record(&g(Outcome::Draw, Outcome::Draw));

        let summary = PerformanceSummary::from_days(&[a, b]);
        assert_eq!(summary.days, 2);
        assert_eq!(summary.total_predictions, 4);
        assert_eq!(summary.overall_accuracy(), 50.0);
        assert_eq!(summary.home_accuracy(), 50.0);
        assert_eq!(summary.draw_accuracy(), 100.0);
        assert_eq!(summary.away_accuracy(), 0.0);
    }

    #[test]
    fn grades_are_filed_under_kickoff_date() {
        let on = |day: u32, predicted: Outcome, actual: Outcome| Grade {
            kickoff_date: date(day),
            ..g(predicted, actual)
        };
        let grades = [
            on(14, Outcome::Home, Outcome::Home),
            on(13, Outcome::Draw, Outcome::Away),
            on(14, Outcome::Away, Outcome::Away),
        ];

        let days = tally_by_kickoff_date(&grades);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(13));
        assert_eq!(days[0].total_predictions, 1);
        assert_eq!(days[1].date, date(14));
        assert_eq!(days[1].correct_predictions, 2);

        // Regrading gives identical rows rather than additional ones.
        assert_eq!(tally_by_kickoff_date(&grades), days);
        assert!(tally_by_kickoff_date(&[]).is_empty());
    }
}
