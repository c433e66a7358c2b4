//! Unlock policy for the sequential player.
//!
//! Works purely on the flattened lesson sequence and the set of completed
//! lesson ids; callers fetch both fresh per request, so there is no unlock
//! state to invalidate.

use std::collections::HashSet;
use uuid::Uuid;

/// Highest accessible position in the flattened sequence.
///
/// Position 0 is always unlocked. Position i (i > 0) is unlocked iff the
/// lesson at i-1 is completed; the walk stops at the first locked position,
/// so unlocking is always a contiguous prefix. An empty sequence yields 0 —
/// callers must not treat that as an accessible lesson.
pub fn unlocked_index(sequence: &[Uuid], completed: &HashSet<Uuid>) -> usize {
    let mut idx = 0;
    for i in 1..sequence.len() {
        if completed.contains(&sequence[i - 1]) {
            idx = i;
        } else {
            break;
        }
    }
    idx
}

/// Whether `lesson_id` may be served. Lessons absent from the sequence
/// (unpublished or deleted) are never accessible.
pub fn is_accessible(sequence: &[Uuid], completed: &HashSet<Uuid>, lesson_id: Uuid) -> bool {
    match sequence.iter().position(|id| *id == lesson_id) {
        Some(pos) => pos <= unlocked_index(sequence, completed),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn first_lesson_always_unlocked() {
        let seq = ids(3);
        let none = HashSet::new();
        assert_eq!(unlocked_index(&seq, &none), 0);
        assert!(is_accessible(&seq, &none, seq[0]));
        assert!(!is_accessible(&seq, &none, seq[1]));
    }

    #[test]
    fn completion_unlocks_the_next_position_only() {
        let seq = ids(4);
        let completed: HashSet<_> = [seq[0]].into_iter().collect();
        assert_eq!(unlocked_index(&seq, &completed), 1);
        assert!(is_accessible(&seq, &completed, seq[1]));
        assert!(!is_accessible(&seq, &completed, seq[2]));
    }

    #[test]
    fn gap_in_completions_stops_the_walk() {
        let seq = ids(4);
        // seq[1] missing: positions 2+ stay locked even though seq[2] is done
        let completed: HashSet<_> = [seq[0], seq[2]].into_iter().collect();
        assert_eq!(unlocked_index(&seq, &completed), 1);
        assert!(!is_accessible(&seq, &completed, seq[2]));
        assert!(!is_accessible(&seq, &completed, seq[3]));
    }

    #[test]
    fn fully_completed_course_unlocks_last_position() {
        let seq = ids(3);
        let completed: HashSet<_> = seq.iter().copied().collect();
        assert_eq!(unlocked_index(&seq, &completed), 2);
    }

    #[test]
    fn empty_sequence_yields_zero_and_nothing_accessible() {
        let seq: Vec<Uuid> = Vec::new();
        let none = HashSet::new();
        assert_eq!(unlocked_index(&seq, &none), 0);
        assert!(!is_accessible(&seq, &none, Uuid::new_v4()));
    }

    #[test]
    fn foreign_lesson_is_never_accessible() {
        let seq = ids(2);
        let completed: HashSet<_> = seq.iter().copied().collect();
        assert!(!is_accessible(&seq, &completed, Uuid::new_v4()));
    }
}
