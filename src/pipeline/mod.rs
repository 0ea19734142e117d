pub mod camera;
pub mod driver;
pub mod rgba_converter;
pub mod scheduler;
pub mod slot;
pub mod worker;

// Re-exports for convenience
#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraDevice, NokhwaBackend, available_cameras};
pub use camera::{CameraBackend, FrameSource, StillImageCamera, SyntheticCamera};
pub use driver::{Control, SessionOutcome, drive};
pub use scheduler::{PipelineScheduler, SessionSignal, SessionState};
pub use slot::FrameSlot;
pub use worker::ScoringWorker;
