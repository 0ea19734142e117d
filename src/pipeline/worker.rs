use std::{
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

use super::slot::FrameSlot;
use crate::{
    exercise::{ExercisePredicate, PredicateError},
    score::score_evaluation,
    types::{Evaluation, Frame, ScoreSample},
};

const WORKER_THREAD_NAME: &str = "fitquest-score";

enum WorkerCommand {
    Begin {
        attempt: u64,
        predicate: Option<Arc<dyn ExercisePredicate>>,
    },
    Suspend,
    Resume,
    Shutdown,
}

struct ActiveAttempt {
    id: u64,
    predicate: Option<Arc<dyn ExercisePredicate>>,
}

/// The session's one scoring thread. Drains the frame slot, runs the current
/// exercise's predicate and reports samples back over a channel.
pub struct ScoringWorker {
    commands: Sender<WorkerCommand>,
    samples: Receiver<ScoreSample>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ScoringWorker {
    pub fn spawn(slot: Arc<FrameSlot>, wait: Duration) -> io::Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let (sample_tx, sample_rx) = unbounded();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker_loop(slot, command_rx, sample_tx, wait))?;

        Ok(Self {
            commands: command_tx,
            samples: sample_rx,
            handle: Some(handle),
        })
    }

    /// Starts scoring for a new attempt. Samples carry `attempt` so the tick
    /// thread can drop anything left over from the previous one.
    pub fn begin(&self, attempt: u64, predicate: Option<Arc<dyn ExercisePredicate>>) {
        self.send(WorkerCommand::Begin { attempt, predicate });
    }

    pub fn suspend(&self) {
        self.send(WorkerCommand::Suspend);
    }

    pub fn resume(&self) {
        self.send(WorkerCommand::Resume);
    }

    pub fn samples(&self) -> &Receiver<ScoreSample> {
        &self.samples
    }

    /// Signals the thread to exit and waits for it.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.send(WorkerCommand::Shutdown);
        if handle.join().is_err() {
            log::error!("scoring worker panicked");
        }
    }

    fn send(&self, command: WorkerCommand) {
        if self.commands.send(command).is_err() {
            log::warn!("scoring worker is gone, command dropped");
        }
    }
}

impl Drop for ScoringWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker_loop(
    slot: Arc<FrameSlot>,
    commands: Receiver<WorkerCommand>,
    samples: Sender<ScoreSample>,
    wait: Duration,
) {
    let mut attempt: Option<ActiveAttempt> = None;
    let mut suspended = false;

    loop {
        // Block on the command channel when there is nothing to score.
        let command = if suspended || attempt.is_none() {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        } else {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        };

        if let Some(command) = command {
            match command {
                WorkerCommand::Begin {
                    attempt: id,
                    predicate,
                } => {
                    log::debug!("scoring attempt {id}");
                    attempt = Some(ActiveAttempt { id, predicate });
                    suspended = false;
                }
                WorkerCommand::Suspend => suspended = true,
                WorkerCommand::Resume => suspended = false,
                WorkerCommand::Shutdown => break,
            }
            continue;
        }

        let Some(frame) = slot.wait_take(wait) else {
            continue;
        };
        let Some(active) = attempt.as_ref() else {
            continue;
        };
        // Exercises without a predicate only advance manually; frames are discarded.
        let Some(predicate) = active.predicate.as_deref() else {
            continue;
        };

        match evaluate(predicate, &frame) {
            Ok(eval) => {
                let sample = ScoreSample {
                    attempt: active.id,
                    tick: frame.tick,
                    score: score_evaluation(&eval),
                    success: eval.code.is_success(),
                };
                if samples.send(sample).is_err() {
                    break;
                }
            }
            Err(err) => log::debug!("frame {} not scored: {err}", frame.tick),
        }
    }

    log::debug!("scoring worker exiting");
}

fn evaluate(
    predicate: &dyn ExercisePredicate,
    frame: &Frame,
) -> Result<Evaluation, PredicateError> {
    match panic::catch_unwind(AssertUnwindSafe(|| predicate.check(frame))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::warn!("predicate panicked on frame {}: {message}", frame.tick);
            Err(PredicateError::Panicked(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::ReturnCode;

    const WAIT: Duration = Duration::from_millis(5);
    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    fn frame(tick: u64) -> Frame {
        Frame::filled(2, 2, 0, tick)
    }

    fn accept_all() -> Arc<dyn ExercisePredicate> {
        Arc::new(|_: &Frame| -> Result<Evaluation, PredicateError> {
            Ok(Evaluation::new(ReturnCode::Success, 36.0, 0.0))
        })
    }

    #[test]
    fn scores_published_frames() {
        let slot = Arc::new(FrameSlot::new());
        let mut worker = ScoringWorker::spawn(slot.clone(), WAIT).unwrap();
        worker.begin(1, Some(accept_all()));

        slot.publish(frame(9));
        let sample = worker.samples().recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(sample.attempt, 1);
        assert_eq!(sample.tick, 9);
        assert!(sample.success);
        assert!((sample.score - 2.1).abs() < 1e-9);

        worker.shutdown();
    }

    #[test]
    fn panicking_predicate_does_not_stop_worker() {
        let slot = Arc::new(FrameSlot::new());
        let mut worker = ScoringWorker::spawn(slot.clone(), WAIT).unwrap();
        let predicate: Arc<dyn ExercisePredicate> =
            Arc::new(|frame: &Frame| -> Result<Evaluation, PredicateError> {
                if frame.tick == 1 {
                    panic!("bad landmarks");
                }
                Ok(Evaluation::new(ReturnCode::Failure, 0.0, 0.0))
            });
        worker.begin(1, Some(predicate));

        slot.publish(frame(1));
        thread::sleep(Duration::from_millis(50));
        slot.publish(frame(2));

        let sample = worker.samples().recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(sample.tick, 2);
        assert!(!sample.success);
        worker.shutdown();
    }

    #[test]
    fn erroring_predicate_yields_no_sample() {
        let slot = Arc::new(FrameSlot::new());
        let mut worker = ScoringWorker::spawn(slot.clone(), WAIT).unwrap();
        let predicate: Arc<dyn ExercisePredicate> =
            Arc::new(|_: &Frame| -> Result<Evaluation, PredicateError> {
                Err(PredicateError::NoPose)
            });
        worker.begin(1, Some(predicate));

        slot.publish(frame(1));
        assert!(
            worker
                .samples()
                .recv_timeout(Duration::from_millis(100))
                .is_err()
        );
        worker.shutdown();
    }

    #[test]
    fn suspended_worker_leaves_slot_alone() {
        let slot = Arc::new(FrameSlot::new());
        let mut worker = ScoringWorker::spawn(slot.clone(), WAIT).unwrap();
        worker.begin(1, Some(accept_all()));
        worker.suspend();
        thread::sleep(Duration::from_millis(30));

        slot.publish(frame(4));
        thread::sleep(Duration::from_millis(50));
        assert!(worker.samples().try_recv().is_err());
        assert_eq!(slot.take().map(|f| f.tick), Some(4));

        worker.resume();
        slot.publish(frame(5));
        let sample = worker.samples().recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(sample.tick, 5);
        worker.shutdown();
    }

    #[test]
    fn unscoreable_attempt_discards_frames() {
        let slot = Arc::new(FrameSlot::new());
        let mut worker = ScoringWorker::spawn(slot.clone(), WAIT).unwrap();
        worker.begin(3, None);

        slot.publish(frame(1));
        thread::sleep(Duration::from_millis(50));
        assert!(slot.take().is_none());
        assert!(worker.samples().try_recv().is_err());
        worker.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let slot = Arc::new(FrameSlot::new());
        let mut worker = ScoringWorker::spawn(slot, WAIT).unwrap();
        worker.shutdown();
        worker.shutdown();
    }
}
