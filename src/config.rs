use std::time::Duration;

/// Capture tick, roughly one display refresh.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(16);
/// How long the scoring worker sleeps on an empty slot before rechecking its commands.
pub const DEFAULT_WORKER_WAIT: Duration = Duration::from_millis(20);

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub camera_index: u32,
    pub tick_period: Duration,
    pub worker_wait: Duration,
    /// Rotate captured frames by 180 degrees before they are scored.
    pub rotate_frames: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            tick_period: DEFAULT_TICK_PERIOD,
            worker_wait: DEFAULT_WORKER_WAIT,
            rotate_frames: false,
        }
    }
}

impl SessionConfig {
    pub fn with_camera_index(mut self, index: u32) -> Self {
        self.camera_index = index;
        self
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period.max(Duration::from_millis(1));
        self
    }

    pub fn with_worker_wait(mut self, wait: Duration) -> Self {
        self.worker_wait = wait.max(Duration::from_millis(1));
        self
    }

    pub fn with_rotation(mut self, rotate: bool) -> Self {
        self.rotate_frames = rotate;
        self
    }
}
