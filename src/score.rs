use crate::{
    exercise::Exercise,
    types::{Evaluation, ReturnCode},
};

/// Added to a frame's score when the predicate accepted the pose.
pub const SUCCESS_BONUS: f64 = 2.0;

/// `|measured - ideal| / 360`, plus [`SUCCESS_BONUS`] on success.
pub fn score_evaluation(eval: &Evaluation) -> f64 {
    let mut score = (eval.measured_angle - eval.ideal_angle).abs() / 360.0;
    if eval.code == ReturnCode::Success {
        score += SUCCESS_BONUS;
    }
    score
}

/// Running sum of frame scores for the attempt in progress.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScoreAccumulator {
    sum: f64,
    count: u32,
}

impl ScoreAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, score: f64) {
        self.sum += score;
        self.count += 1;
    }

    /// Zero when nothing was scored.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[derive(Clone, Debug)]
pub struct ExerciseAverage {
    pub exercise: Exercise,
    pub mean_score: f64,
}

/// Per-attempt means collected over one run through a routine.
#[derive(Clone, Debug, Default)]
pub struct SessionAverager {
    entries: Vec<ExerciseAverage>,
}

impl SessionAverager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, exercise: Exercise, mean_score: f64) {
        self.entries.push(ExerciseAverage {
            exercise,
            mean_score,
        });
    }

    pub fn entries(&self) -> &[ExerciseAverage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Hands the collected entries over and leaves the averager empty.
    pub fn take(&mut self) -> Vec<ExerciseAverage> {
        std::mem::take(&mut self.entries)
    }
}
