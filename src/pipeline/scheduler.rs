use std::{collections::VecDeque, sync::Arc};

use super::{
    camera::{CameraBackend, FrameSource},
    slot::FrameSlot,
    worker::ScoringWorker,
};
use crate::{
    config::SessionConfig,
    error::{Result, SessionError},
    exercise::Exercise,
    reps::{RepCounter, RepOutcome},
    routine::RoutineCursor,
    score::{ScoreAccumulator, SessionAverager},
    summary::SessionSummary,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Active,
    /// Paused while the user decides whether to leave.
    ConfirmingExit,
    Finalizing,
}

/// Transitions reported to whoever renders the session.
#[derive(Clone, Debug)]
pub enum SessionSignal {
    AttemptStarted {
        exercise: String,
        target_reps: u32,
    },
    AttemptComplete {
        exercise: String,
        mean_score: f64,
        next: String,
    },
    RoutineComplete(SessionSummary),
    ExitPending,
    Resumed,
    Cancelled,
}

struct Attempt {
    id: u64,
    exercise: Exercise,
    reps: RepCounter,
    scores: ScoreAccumulator,
}

/// Drives a routine: owns the camera, the frame slot and the scoring worker,
/// and moves the session through its states.
///
/// Everything here runs on the thread that calls [`tick`](Self::tick); the
/// worker only talks back through its sample channel.
pub struct PipelineScheduler {
    config: SessionConfig,
    camera: Box<dyn CameraBackend>,
    routine: RoutineCursor,
    state: SessionState,
    source: Option<Box<dyn FrameSource>>,
    slot: Arc<FrameSlot>,
    worker: Option<ScoringWorker>,
    attempt: Option<Attempt>,
    next_attempt_id: u64,
    ticks: u64,
    averager: SessionAverager,
    /// Signals raised alongside the one a call returned, oldest first.
    pending: VecDeque<SessionSignal>,
}

impl PipelineScheduler {
    pub fn new(
        config: SessionConfig,
        camera: impl CameraBackend + 'static,
        routine: RoutineCursor,
    ) -> Self {
        Self {
            config,
            camera: Box::new(camera),
            routine,
            state: SessionState::Idle,
            source: None,
            slot: Arc::new(FrameSlot::new()),
            worker: None,
            attempt: None,
            next_attempt_id: 1,
            ticks: 0,
            averager: SessionAverager::new(),
            pending: VecDeque::new(),
        }
    }

    /// Opens the camera, starts the worker and loads the first exercise.
    pub fn enter(&mut self) -> Result<SessionSignal> {
        self.expect_state(SessionState::Idle, "enter")?;

        if self.routine.current().is_none() {
            log::error!("exercise session entered with an empty routine");
            return Err(SessionError::EmptyRoutine);
        }

        self.state = SessionState::Loading;
        self.averager.clear();

        match self.camera.open(self.config.camera_index) {
            Ok(source) => self.source = Some(source),
            Err(err) => {
                self.state = SessionState::Idle;
                return Err(SessionError::Camera(err));
            }
        }

        match ScoringWorker::spawn(self.slot.clone(), self.config.worker_wait) {
            Ok(worker) => self.worker = Some(worker),
            Err(err) => {
                self.teardown();
                return Err(SessionError::WorkerSpawn(err));
            }
        }

        Ok(match self.load_next() {
            Some(exercise) => self.start_attempt(exercise),
            None => self.finish_routine(),
        })
    }

    /// One capture tick: publish a frame, then apply whatever the worker scored.
    /// A queued signal is handed out first, before anything is captured.
    pub fn tick(&mut self) -> Option<SessionSignal> {
        if self.state != SessionState::Active {
            return None;
        }
        if let Some(signal) = self.pending.pop_front() {
            return Some(signal);
        }

        self.ticks += 1;
        self.capture();

        if self.apply_samples() {
            Some(self.finalize())
        } else {
            None
        }
    }

    /// Finishes the current attempt without waiting for reps. Exercises
    /// without a predicate can only move on this way.
    pub fn advance_manually(&mut self) -> Result<SessionSignal> {
        self.expect_state(SessionState::Active, "advance")?;
        log::info!("attempt advanced manually");
        Ok(self.finalize())
    }

    /// Pauses capture and scoring until the exit is confirmed or declined.
    pub fn request_exit(&mut self) -> Result<SessionSignal> {
        self.expect_state(SessionState::Active, "request exit")?;
        self.state = SessionState::ConfirmingExit;
        if let Some(worker) = &self.worker {
            worker.suspend();
        }
        self.slot.clear();
        Ok(SessionSignal::ExitPending)
    }

    pub fn decline_exit(&mut self) -> Result<SessionSignal> {
        self.expect_state(SessionState::ConfirmingExit, "resume")?;
        if let Some(worker) = &self.worker {
            worker.resume();
        }
        self.state = SessionState::Active;
        Ok(SessionSignal::Resumed)
    }

    /// Abandons the routine. The attempt in progress and the averages
    /// collected so far are discarded.
    pub fn confirm_exit(&mut self) -> Result<SessionSignal> {
        self.expect_state(SessionState::ConfirmingExit, "exit")?;
        self.teardown();
        self.attempt = None;
        self.averager.clear();
        log::info!("routine cancelled");
        Ok(SessionSignal::Cancelled)
    }

    /// Takes the next signal that was raised together with an earlier one,
    /// such as the start of the attempt that follows a completed one.
    pub fn next_signal(&mut self) -> Option<SessionSignal> {
        self.pending.pop_front()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.attempt.as_ref().map_or(0, |a| a.reps.count())
    }

    pub fn rep_target(&self) -> u32 {
        self.attempt.as_ref().map_or(0, |a| a.reps.target())
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.attempt.as_ref().map(|a| &a.exercise)
    }

    pub fn attempt_scores(&self) -> ScoreAccumulator {
        self.attempt
            .as_ref()
            .map(|a| a.scores)
            .unwrap_or_default()
    }

    pub fn routine(&self) -> &RoutineCursor {
        &self.routine
    }

    pub fn averager(&self) -> &SessionAverager {
        &self.averager
    }

    pub fn frames_dropped(&self) -> u64 {
        self.slot.dropped()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    /// Deducts a set and picks the next exercise that has reps to count.
    fn load_next(&mut self) -> Option<Exercise> {
        self.state = SessionState::Loading;
        self.routine.advance(true);
        loop {
            match self.routine.current() {
                None => return None,
                Some(exercise) if exercise.reps == 0 => {
                    log::info!("skipping {}: no reps to count", exercise.name);
                }
                Some(exercise) => return Some(exercise.clone()),
            }
            // All of its sets go at once; the next head is loaded as usual.
            self.routine.skip_current();
            self.routine.advance(true);
        }
    }

    fn start_attempt(&mut self, exercise: Exercise) -> SessionSignal {
        let id = self.next_attempt_id;
        self.next_attempt_id += 1;
        self.slot.clear();

        // Counters are fresh before the worker can score anything for this attempt.
        let attempt = Attempt {
            id,
            reps: RepCounter::new(exercise.reps),
            scores: ScoreAccumulator::new(),
            exercise,
        };
        if let Some(worker) = &self.worker {
            worker.begin(id, attempt.exercise.predicate.clone());
        }

        if !attempt.exercise.is_scoreable() {
            log::warn!(
                "{} has no predicate; it will only advance manually",
                attempt.exercise.name
            );
        }
        log::info!(
            "attempt {id}: {} ({} reps, {} sets left)",
            attempt.exercise.name,
            attempt.exercise.reps,
            attempt.exercise.sets
        );

        let signal = SessionSignal::AttemptStarted {
            exercise: attempt.exercise.name.clone(),
            target_reps: attempt.exercise.reps,
        };
        self.attempt = Some(attempt);
        self.state = SessionState::Active;
        signal
    }

    fn capture(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        match source.read(self.ticks) {
            Ok(frame) => {
                let frame = if self.config.rotate_frames {
                    frame.rotated_180()
                } else {
                    frame
                };
                self.slot.publish(frame);
            }
            Err(err) => log::debug!("no frame on tick {}: {err:#}", self.ticks),
        }
    }

    /// Returns true once the rep target is met. Samples past that point stay
    /// unapplied and are dropped as stale by the next attempt.
    fn apply_samples(&mut self) -> bool {
        let (Some(worker), Some(attempt)) = (self.worker.as_ref(), self.attempt.as_mut()) else {
            return false;
        };

        for sample in worker.samples().try_iter() {
            if sample.attempt != attempt.id {
                log::trace!("stale sample from attempt {} dropped", sample.attempt);
                continue;
            }
            attempt.scores.record(sample.score);
            if !sample.success {
                continue;
            }
            match attempt.reps.increment() {
                RepOutcome::Counted(count) => {
                    log::debug!(
                        "{}: rep {count}/{}",
                        attempt.exercise.name,
                        attempt.reps.target()
                    );
                }
                RepOutcome::Completed(count) => {
                    log::debug!("{}: rep {count}, target met", attempt.exercise.name);
                    return true;
                }
                RepOutcome::Ignored => {}
            }
        }

        attempt.reps.is_complete()
    }

    fn finalize(&mut self) -> SessionSignal {
        self.state = SessionState::Finalizing;
        if let Some(worker) = &self.worker {
            worker.suspend();
        }
        self.slot.clear();

        let Some(attempt) = self.attempt.take() else {
            return self.finish_routine();
        };
        let mean_score = attempt.scores.mean();
        log::info!(
            "{} done: {} reps, mean score {mean_score:.3} over {} frames",
            attempt.exercise.name,
            attempt.reps.count(),
            attempt.scores.count()
        );
        let finished = attempt.exercise.name.clone();
        self.averager.append(attempt.exercise, mean_score);

        match self.load_next() {
            Some(exercise) => {
                let next = exercise.name.clone();
                let started = self.start_attempt(exercise);
                self.pending.push_back(started);
                SessionSignal::AttemptComplete {
                    exercise: finished,
                    mean_score,
                    next,
                }
            }
            None => self.finish_routine(),
        }
    }

    fn finish_routine(&mut self) -> SessionSignal {
        self.teardown();
        self.attempt = None;
        let summary = SessionSummary::new(self.averager.take());
        log::info!("routine complete: {} exercises scored", summary.entries.len());
        SessionSignal::RoutineComplete(summary)
    }

    /// Worker is joined before the camera goes away so it can never touch a
    /// released device.
    fn teardown(&mut self) {
        self.pending.clear();
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.slot.clear();
        if let Some(mut source) = self.source.take() {
            source.release();
            log::debug!(
                "capture stopped after {} ticks, {} frames dropped unscored",
                self.ticks,
                self.slot.dropped()
            );
        }
        self.state = SessionState::Idle;
    }
}

impl Drop for PipelineScheduler {
    fn drop(&mut self) {
        self.teardown();
    }
}
