use std::time::Instant;

use crossbeam_channel::{Receiver, never, select, tick};

use super::scheduler::{PipelineScheduler, SessionSignal, SessionState};
use crate::{error::Result, summary::SessionSummary};

/// Requests coming from the UI side while a routine runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    RequestExit,
    ConfirmExit,
    DeclineExit,
    Advance,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Completed(SessionSummary),
    Cancelled,
}

/// Runs a routine to the end on the calling thread.
///
/// The capture timer only fires while the session is active; during an exit
/// confirmation it is replaced by a channel that never delivers. Every signal,
/// including the start of each following attempt, is passed to `on_signal`
/// before the loop acts on it.
pub fn drive<F>(
    scheduler: &mut PipelineScheduler,
    controls: &Receiver<Control>,
    mut on_signal: F,
) -> Result<SessionOutcome>
where
    F: FnMut(&PipelineScheduler, &SessionSignal),
{
    let signal = scheduler.enter()?;
    if let Some(outcome) = deliver(scheduler, signal, &mut on_signal) {
        return Ok(outcome);
    }

    let period = scheduler.config().tick_period;
    let mut ticker = tick(period);
    let paused = never::<Instant>();
    let closed = never::<Control>();
    let mut controls_open = true;

    loop {
        let ticks = if scheduler.state() == SessionState::Active {
            &ticker
        } else {
            &paused
        };
        let requests = if controls_open { controls } else { &closed };

        select! {
            recv(ticks) -> _ => {
                if let Some(signal) = scheduler.tick()
                    && let Some(outcome) = deliver(scheduler, signal, &mut on_signal)
                {
                    return Ok(outcome);
                }
            }
            recv(requests) -> msg => {
                let control = match msg {
                    Ok(control) => control,
                    Err(_) => {
                        controls_open = false;
                        // Nobody is left to answer the confirmation.
                        if scheduler.state() != SessionState::ConfirmingExit {
                            continue;
                        }
                        Control::ConfirmExit
                    }
                };

                let result = match control {
                    Control::RequestExit => scheduler.request_exit(),
                    Control::ConfirmExit => scheduler.confirm_exit(),
                    Control::DeclineExit => scheduler.decline_exit(),
                    Control::Advance => scheduler.advance_manually(),
                };

                match result {
                    Ok(signal) => {
                        if matches!(signal, SessionSignal::Resumed) {
                            ticker = tick(period);
                        }
                        if let Some(outcome) = deliver(scheduler, signal, &mut on_signal) {
                            return Ok(outcome);
                        }
                    }
                    Err(err) => log::warn!("ignoring {control:?}: {err}"),
                }
            }
        }
    }
}

/// Hands `signal` and anything queued behind it to `on_signal`, stopping at
/// the first terminal one.
fn deliver<F>(
    scheduler: &mut PipelineScheduler,
    signal: SessionSignal,
    on_signal: &mut F,
) -> Option<SessionOutcome>
where
    F: FnMut(&PipelineScheduler, &SessionSignal),
{
    let mut next = Some(signal);
    while let Some(signal) = next {
        on_signal(scheduler, &signal);
        match signal {
            SessionSignal::RoutineComplete(summary) => {
                return Some(SessionOutcome::Completed(summary));
            }
            SessionSignal::Cancelled => return Some(SessionOutcome::Cancelled),
            _ => {}
        }
        next = scheduler.next_signal();
    }
    None
}
