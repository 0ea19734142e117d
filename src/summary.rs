use std::collections::HashMap;

use crate::score::ExerciseAverage;

pub const MAX_STARS: u8 = 5;
const SCORE_PER_STAR: f64 = 0.2;

/// Maps a mean score onto 0..=5 stars.
pub fn star_rating(mean_score: f64) -> u8 {
    if !mean_score.is_finite() {
        return 0;
    }
    (mean_score / SCORE_PER_STAR)
        .floor()
        .clamp(0.0, MAX_STARS as f64) as u8
}

/// Result of one finished run through a routine.
#[derive(Clone, Debug, Default)]
pub struct SessionSummary {
    pub entries: Vec<ExerciseAverage>,
}

impl SessionSummary {
    pub fn new(entries: Vec<ExerciseAverage>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn overall_mean(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|e| e.mean_score).sum::<f64>() / self.entries.len() as f64
    }
}

/// Receives the summary once a routine is finished.
pub trait SummarySink {
    fn record(&mut self, summary: &SessionSummary);
}

#[derive(Clone, Debug, Default)]
struct ExerciseRecord {
    name: String,
    scores: Vec<f64>,
}

/// A user's score history, one list of attempt means per exercise.
#[derive(Clone, Debug, Default)]
pub struct ExerciseHistory {
    records: Vec<ExerciseRecord>,
    index: HashMap<String, usize>,
}

impl ExerciseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_score(&mut self, exercise: &str, score: f64) {
        let idx = match self.index.get(exercise) {
            Some(idx) => *idx,
            None => {
                self.records.push(ExerciseRecord {
                    name: exercise.to_string(),
                    scores: Vec::new(),
                });
                let idx = self.records.len() - 1;
                self.index.insert(exercise.to_string(), idx);
                idx
            }
        };
        self.records[idx].scores.push(score);
    }

    pub fn scores(&self, exercise: &str) -> &[f64] {
        self.index
            .get(exercise)
            .map(|idx| self.records[*idx].scores.as_slice())
            .unwrap_or(&[])
    }

    pub fn average(&self, exercise: &str) -> f64 {
        let scores = self.scores(exercise);
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }

    pub fn stars(&self, exercise: &str) -> u8 {
        star_rating(self.average(exercise))
    }

    /// Exercise names in the order they were first recorded.
    pub fn exercises(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }
}

impl SummarySink for ExerciseHistory {
    fn record(&mut self, summary: &SessionSummary) {
        for entry in &summary.entries {
            self.add_score(&entry.exercise.name, entry.mean_score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::Exercise;

    fn entry(name: &str, mean_score: f64) -> ExerciseAverage {
        ExerciseAverage {
            exercise: Exercise::new(name, 1, 0),
            mean_score,
        }
    }

    #[test]
    fn star_rating_is_clamped() {
        assert_eq!(star_rating(0.0), 0);
        assert_eq!(star_rating(0.19), 0);
        assert_eq!(star_rating(0.45), 2);
        assert_eq!(star_rating(2.1), 5);
        assert_eq!(star_rating(-1.0), 0);
        assert_eq!(star_rating(f64::NAN), 0);
    }

    #[test]
    fn history_averages_across_sessions() {
        let mut history = ExerciseHistory::new();
        history.record(&SessionSummary::new(vec![entry("squat", 2.0), entry("lunge", 0.5)]));
        history.record(&SessionSummary::new(vec![entry("squat", 1.0)]));

        assert_eq!(history.scores("squat"), &[2.0, 1.0]);
        assert!((history.average("squat") - 1.5).abs() < 1e-9);
        assert_eq!(history.stars("lunge"), 2);
        assert_eq!(history.exercises().collect::<Vec<_>>(), vec!["squat", "lunge"]);
    }

    #[test]
    fn unknown_exercise_averages_zero() {
        let history = ExerciseHistory::new();
        assert_eq!(history.average("plank"), 0.0);
        assert_eq!(history.stars("plank"), 0);
    }

    #[test]
    fn overall_mean_of_summary() {
        assert_eq!(SessionSummary::default().overall_mean(), 0.0);
        let summary = SessionSummary::new(vec![entry("a", 1.0), entry("b", 2.0)]);
        assert!((summary.overall_mean() - 1.5).abs() < 1e-9);
    }
}
