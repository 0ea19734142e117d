//! Real-time exercise evaluation: a fixed-tick capture loop feeds a single
//! scoring worker through a one-frame slot, and accepted frames drive a rep
//! counter that walks the session through a routine.

pub mod config;
pub mod error;
pub mod exercise;
pub mod pipeline;
pub mod reps;
pub mod routine;
pub mod score;
pub mod summary;
pub mod types;

pub use config::SessionConfig;
pub use error::SessionError;
pub use exercise::{BrightnessPredicate, Exercise, ExercisePredicate, PredicateError, Routine};
pub use pipeline::{Control, PipelineScheduler, SessionOutcome, SessionSignal, SessionState};
pub use reps::RepCounter;
pub use routine::RoutineCursor;
pub use score::{ScoreAccumulator, SessionAverager};
pub use summary::{ExerciseHistory, SessionSummary, SummarySink, star_rating};
pub use types::{Evaluation, Frame, ReturnCode};
