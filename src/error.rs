use thiserror::Error;

use crate::pipeline::SessionState;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The session was entered with nothing left to do. Callers should not
    /// start a session on an empty routine.
    #[error("no exercise available: session entered with an empty routine")]
    EmptyRoutine,
    #[error("failed to open camera")]
    Camera(#[source] anyhow::Error),
    #[error("failed to spawn scoring worker")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("cannot {action} while {state:?}")]
    InvalidTransition {
        state: SessionState,
        action: &'static str,
    },
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
