use std::{
    sync::{
        Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::types::Frame;

/// Single-frame handoff between the capture tick and the scoring worker.
///
/// Publishing never blocks and overwrites whatever the worker has not taken
/// yet, so a slow worker only ever sees the freshest frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    frame: Mutex<Option<Frame>>,
    ready: Condvar,
    dropped: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if an untaken frame was overwritten.
    pub fn publish(&self, frame: Frame) -> bool {
        let displaced = self.lock().replace(frame);
        self.ready.notify_one();

        match displaced {
            Some(stale) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("frame from tick {} dropped before scoring", stale.tick);
                true
            }
            None => false,
        }
    }

    pub fn take(&self) -> Option<Frame> {
        self.lock().take()
    }

    /// Like [`take`](Self::take) but sleeps up to `timeout` for a frame to arrive.
    pub fn wait_take(&self, timeout: Duration) -> Option<Frame> {
        let guard = self.lock();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |frame| frame.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    // The slot only holds plain data, so a panic elsewhere cannot leave it inconsistent.
    fn lock(&self) -> MutexGuard<'_, Option<Frame>> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use super::*;

    fn frame(tick: u64) -> Frame {
        Frame::filled(2, 2, 0, tick)
    }

    #[test]
    fn latest_publish_wins() {
        let slot = FrameSlot::new();
        assert!(!slot.publish(frame(1)));
        assert!(slot.publish(frame(2)));
        assert!(slot.publish(frame(3)));

        assert_eq!(slot.take().map(|f| f.tick), Some(3));
        assert!(slot.take().is_none());
        assert_eq!(slot.dropped(), 2);
    }

    #[test]
    fn take_on_empty_slot_returns_immediately() {
        let slot = FrameSlot::new();
        let started = Instant::now();
        assert!(slot.take().is_none());
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn wait_take_times_out_on_empty_slot() {
        let slot = FrameSlot::new();
        let started = Instant::now();
        assert!(slot.wait_take(Duration::from_millis(20)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_take_wakes_on_publish() {
        let slot = Arc::new(FrameSlot::new());
        let consumer = {
            let slot = slot.clone();
            thread::spawn(move || slot.wait_take(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(10));
        slot.publish(frame(7));

        let taken = consumer.join().unwrap();
        assert_eq!(taken.map(|f| f.tick), Some(7));
    }

    #[test]
    fn clear_discards_pending_frame() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.clear();
        assert!(slot.take().is_none());
    }
}
