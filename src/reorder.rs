//! Bulk sibling reorder: one algorithm for modules-in-course,
//! lessons-in-module and content-items-in-lesson.
//!
//! Input ids are deduplicated first (first occurrence wins), then validated
//! against the store by counting rows under the parent; any mismatch aborts
//! the transaction before a single order value is touched. Callers are
//! expected to submit the complete sibling set — omitted siblings keep their
//! stale order values.

use sqlx::Postgres;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingLevel {
    ModulesInCourse,
    LessonsInModule,
    ContentItemsInLesson,
}

impl SiblingLevel {
    fn table(self) -> &'static str {
        match self {
            SiblingLevel::ModulesInCourse => "modules",
            SiblingLevel::LessonsInModule => "lessons",
            SiblingLevel::ContentItemsInLesson => "content_items",
        }
    }

    fn parent_column(self) -> &'static str {
        match self {
            SiblingLevel::ModulesInCourse => "course_id",
            SiblingLevel::LessonsInModule => "module_id",
            SiblingLevel::ContentItemsInLesson => "lesson_id",
        }
    }
}

pub fn dedupe(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Position-based order values, 1-based.
pub fn order_assignments(ids: &[Uuid]) -> Vec<(Uuid, i32)> {
    ids.iter()
        .enumerate()
        .map(|(pos, id)| (*id, pos as i32 + 1))
        .collect()
}

pub fn check_membership(submitted: usize, matched: i64) -> Result<(), AppError> {
    if matched != submitted as i64 {
        return Err(AppError::Validation(format!(
            "{matched} of {submitted} ids belong to this parent"
        )));
    }
    Ok(())
}

/// Reassign `"order"` for the given children of `parent_id`, all or nothing.
pub async fn reorder(
    db: &Db,
    level: SiblingLevel,
    parent_id: Uuid,
    ordered_ids: &[Uuid],
) -> AppResult<()> {
    let ids = dedupe(ordered_ids);
    if ids.is_empty() {
        return Err(AppError::Validation("ordered_ids is empty".into()));
    }
    let table = level.table();
    let parent_col = level.parent_column();

    let mut tx = db.begin().await?;

    let matched = sqlx::query_scalar::<Postgres, i64>(&format!(
        "SELECT count(*) FROM {table} WHERE {parent_col} = $1 AND id = ANY($2)"
    ))
    .bind(parent_id)
    .bind(&ids)
    .fetch_one(&mut *tx)
    .await?;
    check_membership(ids.len(), matched)?;

    for (id, order) in order_assignments(&ids) {
        sqlx::query(&format!(
            r#"UPDATE {table} SET "order" = $3 WHERE id = $1 AND {parent_col} = $2"#
        ))
        .bind(id)
        .bind(parent_id)
        .bind(order)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(%parent_id, table, count = ids.len(), "siblings reordered");
    Ok(())
}
