/// Counts accepted reps for one attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepCounter {
    count: u32,
    target: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepOutcome {
    Counted(u32),
    /// This increment reached the target.
    Completed(u32),
    /// Target already met; the increment was dropped.
    Ignored,
}

impl RepCounter {
    pub fn new(target: u32) -> Self {
        Self { count: 0, target }
    }

    pub fn increment(&mut self) -> RepOutcome {
        if self.is_complete() {
            return RepOutcome::Ignored;
        }
        self.count += 1;
        if self.is_complete() {
            RepOutcome::Completed(self.count)
        } else {
            RepOutcome::Counted(self.count)
        }
    }

    /// A zero target never completes on its own.
    pub fn is_complete(&self) -> bool {
        self.target > 0 && self.count >= self.target
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn target(&self) -> u32 {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_at_target_and_stops_counting() {
        let mut reps = RepCounter::new(2);
        assert_eq!(reps.increment(), RepOutcome::Counted(1));
        assert_eq!(reps.increment(), RepOutcome::Completed(2));
        assert_eq!(reps.increment(), RepOutcome::Ignored);
        assert_eq!(reps.count(), 2);
        assert!(reps.is_complete());
    }

    #[test]
    fn zero_target_never_completes() {
        let mut reps = RepCounter::new(0);
        for _ in 0..5 {
            reps.increment();
        }
        assert_eq!(reps.count(), 5);
        assert!(!reps.is_complete());
    }

    #[test]
    fn count_is_monotonic() {
        let mut reps = RepCounter::new(4);
        let mut last = 0;
        for _ in 0..10 {
            reps.increment();
            assert!(reps.count() >= last);
            last = reps.count();
        }
        assert_eq!(last, 4);
    }
}
