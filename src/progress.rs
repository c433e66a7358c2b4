//! Progress ledger and the complete/un-complete state machine.
//!
//! A lesson is either complete or not for an enrollment; the ledger row is
//! the only record of it. The decision logic is pure and operates on the
//! flattened sequence plus the completed-id set; the async functions only
//! fetch state and apply the decided writes.

use std::collections::HashSet;

use sqlx::Postgres;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, AppResult};
use crate::models::{CreateEnrollmentReq, Enrollment, ProgressRecord};

/// Precondition for marking a lesson complete: it must be in the published
/// sequence, and its immediate predecessor (if any) must already be
/// complete. Completing an already-complete lesson is allowed.
pub fn check_complete(
    sequence: &[Uuid],
    completed: &HashSet<Uuid>,
    lesson_id: Uuid,
) -> Result<(), AppError> {
    let pos = sequence
        .iter()
        .position(|id| *id == lesson_id)
        .ok_or(AppError::NotFound("lesson not found"))?;
    if pos > 0 && !completed.contains(&sequence[pos - 1]) {
        return Err(AppError::Forbidden("previous lesson not completed"));
    }
    Ok(())
}

/// Lessons whose completion must be removed when `lesson_id` is
/// un-completed: the lesson itself and everything after it in the sequence.
/// Anything less would leave a gap and break the contiguous-prefix shape the
/// unlock policy depends on.
pub fn cascade_ids(sequence: &[Uuid], lesson_id: Uuid) -> Result<Vec<Uuid>, AppError> {
    let pos = sequence
        .iter()
        .position(|id| *id == lesson_id)
        .ok_or(AppError::NotFound("lesson not found"))?;
    Ok(sequence[pos..].to_vec())
}

pub async fn completed_ids(db: &Db, enrollment_id: Uuid) -> AppResult<HashSet<Uuid>> {
    let ids = sqlx::query_scalar::<Postgres, Uuid>(
        "SELECT lesson_id FROM progress_records WHERE enrollment_id = $1",
    )
    .bind(enrollment_id)
    .fetch_all(db)
    .await?;
    Ok(ids.into_iter().collect())
}

pub async fn ledger(db: &Db, enrollment_id: Uuid) -> AppResult<Vec<ProgressRecord>> {
    let rows = sqlx::query_as::<Postgres, ProgressRecord>(
        "SELECT * FROM progress_records WHERE enrollment_id = $1 ORDER BY completed_at, lesson_id",
    )
    .bind(enrollment_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Upsert the ledger row. Re-completing re-stamps `completed_at`; the unique
/// constraint plus ON CONFLICT makes concurrent same-lesson calls safe.
pub async fn record_completion(db: &Db, enrollment_id: Uuid, lesson_id: Uuid) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO progress_records (enrollment_id, lesson_id, completed_at)
        VALUES ($1, $2, now())
        ON CONFLICT (enrollment_id, lesson_id)
        DO UPDATE SET completed_at = now()
        "#,
    )
    .bind(enrollment_id)
    .bind(lesson_id)
    .execute(db)
    .await?;
    tracing::debug!(%enrollment_id, %lesson_id, "lesson completed");
    Ok(())
}

/// Hard-delete the ledger rows for the cascade set, one statement.
pub async fn remove_completions(db: &Db, enrollment_id: Uuid, lesson_ids: &[Uuid]) -> AppResult<()> {
    sqlx::query("DELETE FROM progress_records WHERE enrollment_id = $1 AND lesson_id = ANY($2)")
        .bind(enrollment_id)
        .bind(lesson_ids)
        .execute(db)
        .await?;
    tracing::debug!(%enrollment_id, count = lesson_ids.len(), "completions reset");
    Ok(())
}

// --- enrollment store ---

pub async fn get_enrollment(db: &Db, enrollment_id: Uuid) -> AppResult<Enrollment> {
    sqlx::query_as::<Postgres, Enrollment>("SELECT * FROM enrollments WHERE id = $1")
        .bind(enrollment_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("enrollment not found"))
}

/// Register a participant on a course. One enrollment per (course,
/// participant): re-registering returns the existing row unchanged.
pub async fn create_enrollment(db: &Db, req: CreateEnrollmentReq) -> AppResult<Enrollment> {
    let exists = sqlx::query_scalar::<Postgres, i64>("SELECT count(*) FROM courses WHERE id = $1")
        .bind(req.course_id)
        .fetch_one(db)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound("course not found"));
    }
    sqlx::query(
        r#"
        INSERT INTO enrollments (id, course_id, participant_id, status)
        VALUES ($1, $2, $3, 'active')
        ON CONFLICT (course_id, participant_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.course_id)
    .bind(req.participant_id)
    .execute(db)
    .await?;
    let enrollment = sqlx::query_as::<Postgres, Enrollment>(
        "SELECT * FROM enrollments WHERE course_id = $1 AND participant_id = $2",
    )
    .bind(req.course_id)
    .bind(req.participant_id)
    .fetch_one(db)
    .await?;
    Ok(enrollment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unlock::unlocked_index;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    // In-memory mirror of complete/uncomplete against a ledger set, used to
    // exercise the state-machine properties without a database.
    fn complete(seq: &[Uuid], ledger: &mut HashSet<Uuid>, id: Uuid) -> Result<(), AppError> {
        check_complete(seq, ledger, id)?;
        ledger.insert(id);
        Ok(())
    }

    fn uncomplete(seq: &[Uuid], ledger: &mut HashSet<Uuid>, id: Uuid) -> Result<(), AppError> {
        for gone in cascade_ids(seq, id)? {
            ledger.remove(&gone);
        }
        Ok(())
    }

    fn is_contiguous_prefix(seq: &[Uuid], ledger: &HashSet<Uuid>) -> bool {
        let positions: Vec<usize> = seq
            .iter()
            .enumerate()
            .filter(|(_, id)| ledger.contains(id))
            .map(|(i, _)| i)
            .collect();
        positions.iter().copied().eq(0..positions.len())
    }

    #[test]
    fn completing_out_of_order_is_forbidden() {
        let seq = ids(3);
        let ledger = HashSet::new();
        assert!(matches!(
            check_complete(&seq, &ledger, seq[1]),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_complete(&seq, &ledger, seq[0]).is_ok());
    }

    #[test]
    fn completing_unknown_lesson_is_not_found() {
        let seq = ids(2);
        let ledger = HashSet::new();
        assert!(matches!(
            check_complete(&seq, &ledger, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            cascade_ids(&seq, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn recompleting_is_idempotent() {
        let seq = ids(2);
        let mut ledger = HashSet::new();
        complete(&seq, &mut ledger, seq[0]).unwrap();
        let before = unlocked_index(&seq, &ledger);
        complete(&seq, &mut ledger, seq[0]).unwrap();
        assert_eq!(unlocked_index(&seq, &ledger), before);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn cascade_removes_at_and_after_only() {
        let seq = ids(5);
        let gone = cascade_ids(&seq, seq[2]).unwrap();
        assert_eq!(gone, seq[2..].to_vec());

        let mut ledger: HashSet<_> = seq.iter().copied().collect();
        uncomplete(&seq, &mut ledger, seq[2]).unwrap();
        assert!(ledger.contains(&seq[0]));
        assert!(ledger.contains(&seq[1]));
        assert!(!ledger.contains(&seq[2]));
        assert!(!ledger.contains(&seq[4]));
    }

    #[test]
    fn uncompleting_an_incomplete_lesson_is_idempotent() {
        let seq = ids(3);
        let mut ledger = HashSet::new();
        complete(&seq, &mut ledger, seq[0]).unwrap();
        uncomplete(&seq, &mut ledger, seq[2]).unwrap();
        assert!(ledger.contains(&seq[0]));
        uncomplete(&seq, &mut ledger, seq[2]).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn ledger_stays_a_contiguous_prefix_under_any_op_sequence() {
        let seq = ids(4);
        let mut ledger = HashSet::new();
        let ops: Vec<(bool, Uuid)> = vec![
            (true, seq[0]),
            (true, seq[1]),
            (true, seq[3]), // forbidden, ignored
            (true, seq[2]),
            (false, seq[1]),
            (true, seq[1]),
            (false, seq[0]),
            (true, seq[0]),
        ];
        for (is_complete, id) in ops {
            let _ = if is_complete {
                complete(&seq, &mut ledger, id)
            } else {
                uncomplete(&seq, &mut ledger, id)
            };
            assert!(is_contiguous_prefix(&seq, &ledger));
        }
    }

    #[test]
    fn worked_example_scenario() {
        use crate::curriculum::test_support::*;
        let c = course();
        let m1 = module(c.id, 1);
        let m2 = module(c.id, 2);
        let l1 = lesson(m1.id, 1, true);
        let l2 = lesson(m1.id, 2, true);
        let l3 = lesson(m1.id, 3, false);
        let l4 = lesson(m2.id, 1, true);
        let t = tree(
            c,
            vec![
                (m1, vec![l1.clone(), l2.clone(), l3.clone()]),
                (m2, vec![l4.clone()]),
            ],
        );
        let seq = t.flat_ids();
        assert_eq!(seq, vec![l1.id, l2.id, l4.id]);

        let mut ledger = HashSet::new();
        assert_eq!(unlocked_index(&seq, &ledger), 0);

        complete(&seq, &mut ledger, l1.id).unwrap();
        assert_eq!(unlocked_index(&seq, &ledger), 1);
        assert!(!crate::unlock::is_accessible(&seq, &ledger, l4.id));

        complete(&seq, &mut ledger, l2.id).unwrap();
        assert_eq!(unlocked_index(&seq, &ledger), 2);

        // unpublished lesson is invisible to the state machine
        assert!(matches!(
            check_complete(&seq, &ledger, l3.id),
            Err(AppError::NotFound(_))
        ));

        uncomplete(&seq, &mut ledger, l1.id).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(unlocked_index(&seq, &ledger), 0);
    }
}
