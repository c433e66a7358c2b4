use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::{curriculum, progress, reorder, unlock};

pub fn router(db: Db) -> Router {
    Router::new()
        // curriculum
        .route("/api/courses", post(create_course))
        .route("/api/courses/:course_id/modules", post(create_module))
        .route("/api/modules/:module_id/lessons", post(create_lesson))
        .route("/api/lessons/:lesson_id/content", post(create_content))
        .route("/api/content/:content_id", put(update_content))
        .route("/api/lessons/:lesson_id/published", put(set_published))
        // reordering
        .route("/api/courses/:course_id/modules/order", put(reorder_modules))
        .route("/api/modules/:module_id/lessons/order", put(reorder_lessons))
        .route("/api/lessons/:lesson_id/content/order", put(reorder_content))
        // enrollment + player
        .route("/api/enrollments", post(create_enrollment))
        .route("/api/enrollments/:enrollment_id/progress", get(list_progress))
        .route("/api/courses/:course_id/player", get(player_view))
        .route("/api/enrollments/:enrollment_id/complete", post(complete_lesson))
        .route("/api/enrollments/:enrollment_id/uncomplete", post(uncomplete_lesson))
        .with_state(db)
}

// --- curriculum ---

async fn create_course(
    State(db): State<Db>,
    Json(req): Json<CreateCourseReq>,
) -> AppResult<Json<Course>> {
    Ok(Json(curriculum::create_course(&db, req).await?))
}

async fn create_module(
    State(db): State<Db>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<CreateModuleReq>,
) -> AppResult<Json<Module>> {
    Ok(Json(curriculum::create_module(&db, course_id, req).await?))
}

async fn create_lesson(
    State(db): State<Db>,
    Path(module_id): Path<Uuid>,
    Json(req): Json<CreateLessonReq>,
) -> AppResult<Json<Lesson>> {
    Ok(Json(curriculum::create_lesson(&db, module_id, req).await?))
}

async fn create_content(
    State(db): State<Db>,
    Path(lesson_id): Path<Uuid>,
    Json(req): Json<ContentPayloadReq>,
) -> AppResult<Json<ContentItem>> {
    Ok(Json(curriculum::create_content_item(&db, lesson_id, req).await?))
}

async fn update_content(
    State(db): State<Db>,
    Path(content_id): Path<Uuid>,
    Json(req): Json<ContentPayloadReq>,
) -> AppResult<Json<ContentItem>> {
    Ok(Json(curriculum::update_content_item(&db, content_id, req).await?))
}

async fn set_published(
    State(db): State<Db>,
    Path(lesson_id): Path<Uuid>,
    Json(req): Json<SetPublishedReq>,
) -> AppResult<Json<Lesson>> {
    Ok(Json(
        curriculum::set_lesson_published(&db, lesson_id, req.published).await?,
    ))
}

// --- reordering ---

async fn reorder_modules(
    State(db): State<Db>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<ReorderReq>,
) -> AppResult<Json<serde_json::Value>> {
    reorder::reorder(
        &db,
        reorder::SiblingLevel::ModulesInCourse,
        course_id,
        &req.ordered_ids,
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn reorder_lessons(
    State(db): State<Db>,
    Path(module_id): Path<Uuid>,
    Json(req): Json<ReorderReq>,
) -> AppResult<Json<serde_json::Value>> {
    reorder::reorder(
        &db,
        reorder::SiblingLevel::LessonsInModule,
        module_id,
        &req.ordered_ids,
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn reorder_content(
    State(db): State<Db>,
    Path(lesson_id): Path<Uuid>,
    Json(req): Json<ReorderReq>,
) -> AppResult<Json<serde_json::Value>> {
    reorder::reorder(
        &db,
        reorder::SiblingLevel::ContentItemsInLesson,
        lesson_id,
        &req.ordered_ids,
    )
    .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// --- enrollment + player ---

async fn create_enrollment(
    State(db): State<Db>,
    Json(req): Json<CreateEnrollmentReq>,
) -> AppResult<Json<Enrollment>> {
    Ok(Json(progress::create_enrollment(&db, req).await?))
}

async fn list_progress(
    State(db): State<Db>,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProgressRecord>>> {
    progress::get_enrollment(&db, enrollment_id).await?;
    Ok(Json(progress::ledger(&db, enrollment_id).await?))
}

#[derive(Deserialize, Debug)]
struct PlayerQuery {
    enrollment_id: Option<Uuid>,
    lesson_id: Option<Uuid>,
}

/// Where the player lands in the sequence. A locked or unknown requested
/// lesson is substituted with the lesson at the unlocked index; locked
/// content is never served.
fn current_position(
    sequence: &[Uuid],
    completed: &HashSet<Uuid>,
    requested: Option<Uuid>,
) -> Option<usize> {
    if sequence.is_empty() {
        return None;
    }
    let unlocked = unlock::unlocked_index(sequence, completed);
    match requested {
        Some(id) if unlock::is_accessible(sequence, completed, id) => {
            sequence.iter().position(|x| *x == id)
        }
        _ => Some(unlocked),
    }
}

async fn player_view(
    State(db): State<Db>,
    Path(course_id): Path<Uuid>,
    Query(q): Query<PlayerQuery>,
) -> AppResult<Json<PlayerView>> {
    let tree = curriculum::load_course_tree(&db, course_id).await?;
    let flat = tree.flatten();
    let sequence: Vec<Uuid> = flat.iter().map(|l| l.id).collect();

    let (completed, unlocked_index, current) = match q.enrollment_id {
        Some(enrollment_id) => {
            let enrollment = progress::get_enrollment(&db, enrollment_id).await?;
            if enrollment.course_id != course_id {
                return Err(AppError::NotFound("enrollment not found"));
            }
            let completed = progress::completed_ids(&db, enrollment_id).await?;
            let unlocked = unlock::unlocked_index(&sequence, &completed);
            let current = current_position(&sequence, &completed, q.lesson_id);
            (completed, unlocked, current)
        }
        // preview: the whole sequence is open, no ledger involved
        None => {
            let last = sequence.len().saturating_sub(1);
            let current = q
                .lesson_id
                .and_then(|id| sequence.iter().position(|x| *x == id))
                .or(if sequence.is_empty() { None } else { Some(0) });
            (HashSet::new(), last, current)
        }
    };

    let preview = q.enrollment_id.is_none();
    let entries: Vec<SequenceEntry> = flat
        .iter()
        .enumerate()
        .map(|(position, l)| SequenceEntry {
            lesson_id: l.id,
            module_id: l.module_id,
            title: l.title.clone(),
            position,
            completed: completed.contains(&l.id),
            accessible: preview || position <= unlocked_index,
        })
        .collect();

    let current_lesson = current.map(|pos| flat[pos].clone());
    let current_content = current_lesson
        .as_ref()
        .map(|l| tree.content_for(l.id).to_vec())
        .unwrap_or_default();
    let mut completed_ids: Vec<Uuid> = completed.into_iter().collect();
    completed_ids.sort();

    Ok(Json(PlayerView {
        course_id: tree.course.id,
        sequence: entries,
        unlocked_index,
        completed_ids,
        current_lesson,
        current_content,
    }))
}

async fn complete_lesson(
    State(db): State<Db>,
    Path(enrollment_id): Path<Uuid>,
    Json(req): Json<LessonRef>,
) -> AppResult<Json<serde_json::Value>> {
    let enrollment = progress::get_enrollment(&db, enrollment_id).await?;
    let tree = curriculum::load_course_tree(&db, enrollment.course_id).await?;
    let sequence = tree.flat_ids();
    let completed = progress::completed_ids(&db, enrollment_id).await?;

    progress::check_complete(&sequence, &completed, req.lesson_id)?;
    progress::record_completion(&db, enrollment_id, req.lesson_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn uncomplete_lesson(
    State(db): State<Db>,
    Path(enrollment_id): Path<Uuid>,
    Json(req): Json<LessonRef>,
) -> AppResult<Json<serde_json::Value>> {
    let enrollment = progress::get_enrollment(&db, enrollment_id).await?;
    let tree = curriculum::load_course_tree(&db, enrollment.course_id).await?;
    let sequence = tree.flat_ids();

    let cascade = progress::cascade_ids(&sequence, req.lesson_id)?;
    progress::remove_completions(&db, enrollment_id, &cascade).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn locked_request_substitutes_the_unlocked_lesson() {
        let seq = ids(3);
        let completed: HashSet<_> = [seq[0]].into_iter().collect();
        // seq[2] is locked; the player falls back to position 1
        assert_eq!(current_position(&seq, &completed, Some(seq[2])), Some(1));
        assert_eq!(current_position(&seq, &completed, Some(seq[1])), Some(1));
        assert_eq!(current_position(&seq, &completed, Some(seq[0])), Some(0));
    }

    #[test]
    fn unknown_request_falls_back_to_unlocked_index() {
        let seq = ids(2);
        let completed = HashSet::new();
        assert_eq!(
            current_position(&seq, &completed, Some(Uuid::new_v4())),
            Some(0)
        );
        assert_eq!(current_position(&seq, &completed, None), Some(0));
    }

    #[test]
    fn empty_sequence_has_no_current_lesson() {
        let completed = HashSet::new();
        assert_eq!(current_position(&[], &completed, None), None);
        assert_eq!(current_position(&[], &completed, Some(Uuid::new_v4())), None);
    }
}
