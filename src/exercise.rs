use std::{fmt, sync::Arc, time::Duration};

use thiserror::Error;

use crate::types::{Evaluation, Frame, ReturnCode};

/// Reasons a frame produced no score.
#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("no pose detected in frame")]
    NoPose,
    #[error("landmark extraction failed: {0}")]
    Landmarks(String),
    #[error("predicate panicked: {0}")]
    Panicked(String),
}

/// Per-exercise scoring function. Runs on the scoring worker thread.
pub trait ExercisePredicate: Send + Sync + 'static {
    fn check(&self, frame: &Frame) -> Result<Evaluation, PredicateError>;
}

impl<F> ExercisePredicate for F
where
    F: Fn(&Frame) -> Result<Evaluation, PredicateError> + Send + Sync + 'static,
{
    fn check(&self, frame: &Frame) -> Result<Evaluation, PredicateError> {
        self(frame)
    }
}

#[derive(Clone)]
pub struct Exercise {
    pub name: String,
    pub reps: u32,
    /// Remaining sets. Goes negative once the exercise is exhausted.
    pub sets: i32,
    pub duration: Duration,
    pub description: String,
    pub body_parts: Vec<String>,
    pub angles: Vec<f64>,
    pub image_path: String,
    pub predicate: Option<Arc<dyn ExercisePredicate>>,
}

impl Exercise {
    pub fn new(name: impl Into<String>, reps: u32, sets: i32) -> Self {
        Self {
            name: name.into(),
            reps,
            sets,
            duration: Duration::ZERO,
            description: String::new(),
            body_parts: Vec::new(),
            angles: Vec::new(),
            image_path: String::new(),
            predicate: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_image(mut self, image_path: impl Into<String>) -> Self {
        self.image_path = image_path.into();
        self
    }

    pub fn with_targets(mut self, body_parts: Vec<String>, angles: Vec<f64>) -> Self {
        self.body_parts = body_parts;
        self.angles = angles;
        self
    }

    pub fn with_predicate(mut self, predicate: impl ExercisePredicate) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn is_scoreable(&self) -> bool {
        self.predicate.is_some()
    }
}

impl fmt::Debug for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exercise")
            .field("name", &self.name)
            .field("reps", &self.reps)
            .field("sets", &self.sets)
            .field("duration", &self.duration)
            .field("body_parts", &self.body_parts)
            .field("angles", &self.angles)
            .field("scoreable", &self.is_scoreable())
            .finish()
    }
}

/// A named, ordered list of exercises as the user picked it.
#[derive(Clone, Debug, Default)]
pub struct Routine {
    pub name: String,
    pub description: String,
    pub exercises: Vec<Exercise>,
}

impl Routine {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            exercises: Vec::new(),
        }
    }

    pub fn add_exercise(&mut self, exercise: Exercise) {
        self.exercises.push(exercise);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exercise> {
        self.exercises.iter()
    }
}

const DEFAULT_IDEAL_ANGLE: f64 = 90.0;
const DEFAULT_TOLERANCE: f64 = 15.0;

/// Stand-in for a pose model: maps mean frame brightness onto 0..=180 degrees.
#[derive(Clone, Debug)]
pub struct BrightnessPredicate {
    ideal_angle: f64,
    tolerance: f64,
}

impl BrightnessPredicate {
    pub fn new(ideal_angle: f64, tolerance: f64) -> Self {
        Self {
            ideal_angle,
            tolerance,
        }
    }

    pub fn for_exercise(exercise: &Exercise) -> Self {
        let ideal = exercise
            .angles
            .first()
            .copied()
            .unwrap_or(DEFAULT_IDEAL_ANGLE);
        Self::new(ideal, DEFAULT_TOLERANCE)
    }
}

impl Default for BrightnessPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_IDEAL_ANGLE, DEFAULT_TOLERANCE)
    }
}

impl ExercisePredicate for BrightnessPredicate {
    fn check(&self, frame: &Frame) -> Result<Evaluation, PredicateError> {
        if frame.pixel_count() == 0 {
            return Err(PredicateError::NoPose);
        }

        let measured = frame.mean_brightness() as f64 / 255.0 * 180.0;
        let code = if (measured - self.ideal_angle).abs() <= self.tolerance {
            ReturnCode::Success
        } else {
            ReturnCode::Failure
        };
        Ok(Evaluation::new(code, measured, self.ideal_angle))
    }
}
