use std::collections::VecDeque;

use crate::exercise::{Exercise, Routine};

/// The remaining part of a routine, drained as the user works through it.
///
/// The head entry with `sets >= 0` is the current exercise. Entries whose
/// `sets` fall below zero are exhausted and get dropped.
#[derive(Clone, Debug, Default)]
pub struct RoutineCursor {
    remaining: VecDeque<Exercise>,
}

impl RoutineCursor {
    pub fn new(exercises: impl IntoIterator<Item = Exercise>) -> Self {
        Self {
            remaining: exercises.into_iter().collect(),
        }
    }

    pub fn current(&mut self) -> Option<&Exercise> {
        self.discard_exhausted();
        self.remaining.front()
    }

    /// Moves to the next set. With `had_deduction` every live head examined in
    /// this pass loses one set, so a head at zero sets is consumed here too.
    pub fn advance(&mut self, had_deduction: bool) {
        while let Some(head) = self.remaining.front_mut() {
            if had_deduction && head.sets >= 0 {
                head.sets -= 1;
            }
            if head.sets >= 0 {
                return;
            }
            log::debug!("routine entry {} exhausted", head.name);
            self.remaining.pop_front();
        }
    }

    /// Drops the current exercise along with all of its remaining sets.
    pub fn skip_current(&mut self) -> Option<Exercise> {
        self.discard_exhausted();
        self.remaining.pop_front()
    }

    pub fn has_remaining(&self) -> bool {
        let mut live = self.remaining.iter().skip_while(|ex| ex.sets < 0);
        match live.next() {
            Some(head) => head.sets > 0 || live.next().is_some(),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.iter().all(|ex| ex.sets < 0)
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exercise> {
        self.remaining.iter()
    }

    fn discard_exhausted(&mut self) {
        while self.remaining.front().is_some_and(|ex| ex.sets < 0) {
            self.remaining.pop_front();
        }
    }
}

impl From<&Routine> for RoutineCursor {
    fn from(routine: &Routine) -> Self {
        Self::new(routine.exercises.iter().cloned())
    }
}

impl Routine {
    /// A fresh cursor over a copy of the exercises; the routine itself is left intact.
    pub fn cursor(&self) -> RoutineCursor {
        RoutineCursor::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(entries: &[(&str, i32)]) -> RoutineCursor {
        RoutineCursor::new(
            entries
                .iter()
                .map(|(name, sets)| Exercise::new(*name, 5, *sets)),
        )
    }

    fn current_name(cursor: &mut RoutineCursor) -> Option<String> {
        cursor.current().map(|ex| ex.name.clone())
    }

    #[test]
    fn loading_deducts_one_set_from_head() {
        let mut cursor = cursor(&[("a", 2), ("b", 1)]);
        cursor.advance(true);
        assert_eq!(current_name(&mut cursor).as_deref(), Some("a"));
        assert_eq!(cursor.current().unwrap().sets, 1);
        assert_eq!(cursor.iter().nth(1).unwrap().sets, 1);
    }

    #[test]
    fn exhausted_heads_are_removed_in_the_same_pass() {
        let mut cursor = cursor(&[("a", 1), ("b", 0)]);

        cursor.advance(true);
        assert_eq!(current_name(&mut cursor).as_deref(), Some("a"));
        assert!(cursor.has_remaining());

        // a drops to -1, b is deducted on the same pass and drops to -1 as well.
        cursor.advance(true);
        assert_eq!(current_name(&mut cursor), None);
        assert!(!cursor.has_remaining());
        assert_eq!(cursor.len(), 0);
    }

    #[test]
    fn exhausted_heads_are_not_deducted() {
        let mut cursor = cursor(&[("a", 0), ("b", i32::MIN), ("c", 1)]);
        cursor.advance(true);
        assert_eq!(current_name(&mut cursor).as_deref(), Some("c"));
        assert_eq!(cursor.current().unwrap().sets, 0);
    }

    #[test]
    fn skip_current_drops_every_set_at_once() {
        let mut cursor = cursor(&[("a", -1), ("b", i32::MAX), ("c", 2)]);
        assert_eq!(cursor.skip_current().map(|ex| ex.name).as_deref(), Some("b"));
        assert_eq!(current_name(&mut cursor).as_deref(), Some("c"));
        assert_eq!(cursor.current().unwrap().sets, 2);

        cursor.skip_current();
        assert!(cursor.skip_current().is_none());
        assert!(cursor.is_empty());
    }

    #[test]
    fn advance_without_deduction_only_skips_exhausted() {
        let mut cursor = cursor(&[("a", -1), ("b", 0)]);
        cursor.advance(false);
        assert_eq!(current_name(&mut cursor).as_deref(), Some("b"));
        assert_eq!(cursor.current().unwrap().sets, 0);
        assert!(!cursor.has_remaining());
    }

    #[test]
    fn current_discards_exhausted_heads_lazily() {
        let mut cursor = cursor(&[("a", -1), ("b", -3), ("c", 2)]);
        assert_eq!(cursor.len(), 3);
        assert_eq!(current_name(&mut cursor).as_deref(), Some("c"));
        assert_eq!(cursor.len(), 1);
    }

    #[test]
    fn has_remaining_checks_head_sets_and_tail() {
        assert!(cursor(&[("a", 1)]).has_remaining());
        assert!(!cursor(&[("a", 0)]).has_remaining());
        assert!(cursor(&[("a", 0), ("b", 0)]).has_remaining());
        assert!(!RoutineCursor::default().has_remaining());
        assert!(RoutineCursor::default().is_empty());
    }

    #[test]
    fn cursor_does_not_drain_the_routine() {
        let mut routine = Routine::new("legs", "");
        routine.add_exercise(Exercise::new("squat", 10, 1));
        let mut cursor = routine.cursor();
        cursor.advance(true);
        cursor.advance(true);
        assert!(cursor.is_empty());
        assert_eq!(routine.exercises[0].sets, 1);
    }
}
