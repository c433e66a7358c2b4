//! Curriculum store: course → module → lesson → content item.
//!
//! Reads materialize the whole course subtree up front (three queries, no
//! per-row traversal) and all ordering comes from the explicit `"order"`
//! column; `id` appears in ORDER BY only as a stable tiebreak.

use sqlx::Postgres;
use uuid::Uuid;

use crate::db::Db;
use crate::error::{AppError, AppResult};
use crate::models::*;

#[derive(Debug, Clone)]
pub struct LessonNode {
    pub lesson: Lesson,
    pub content: Vec<ContentItem>,
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub module: Module,
    pub lessons: Vec<LessonNode>,
}

#[derive(Debug, Clone)]
pub struct CourseTree {
    pub course: Course,
    pub modules: Vec<ModuleNode>,
}

impl CourseTree {
    /// The learner-facing flattened sequence: published lessons only,
    /// modules by ascending order, lessons by ascending order within each.
    /// Unpublished lessons do not exist as far as progress logic goes.
    pub fn flatten(&self) -> Vec<&Lesson> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .map(|l| &l.lesson)
            .filter(|l| l.published)
            .collect()
    }

    pub fn flat_ids(&self) -> Vec<Uuid> {
        self.flatten().iter().map(|l| l.id).collect()
    }

    pub fn find_lesson(&self, lesson_id: Uuid) -> Option<&Lesson> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .map(|l| &l.lesson)
            .find(|l| l.id == lesson_id)
    }

    pub fn content_for(&self, lesson_id: Uuid) -> &[ContentItem] {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .find(|l| l.lesson.id == lesson_id)
            .map(|l| l.content.as_slice())
            .unwrap_or(&[])
    }
}

/// Load a full course subtree, fresh. Never cached across requests: unlock
/// decisions must see the latest order and publish state.
pub async fn load_course_tree(db: &Db, course_id: Uuid) -> AppResult<CourseTree> {
    let course = sqlx::query_as::<Postgres, Course>("SELECT * FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("course not found"))?;

    let modules = sqlx::query_as::<Postgres, Module>(
        r#"SELECT * FROM modules WHERE course_id = $1 ORDER BY "order", id"#,
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    let lessons = sqlx::query_as::<Postgres, Lesson>(
        r#"
        SELECT l.* FROM lessons l
        JOIN modules m ON m.id = l.module_id
        WHERE m.course_id = $1
        ORDER BY l."order", l.id
        "#,
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    let content = sqlx::query_as::<Postgres, ContentItem>(
        r#"
        SELECT c.* FROM content_items c
        JOIN lessons l ON l.id = c.lesson_id
        JOIN modules m ON m.id = l.module_id
        WHERE m.course_id = $1
        ORDER BY c."order", c.id
        "#,
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    Ok(assemble_tree(course, modules, lessons, content))
}

fn assemble_tree(
    course: Course,
    modules: Vec<Module>,
    lessons: Vec<Lesson>,
    content: Vec<ContentItem>,
) -> CourseTree {
    let mut nodes: Vec<ModuleNode> = modules
        .into_iter()
        .map(|module| ModuleNode {
            module,
            lessons: Vec::new(),
        })
        .collect();
    for lesson in lessons {
        if let Some(m) = nodes.iter_mut().find(|n| n.module.id == lesson.module_id) {
            m.lessons.push(LessonNode {
                lesson,
                content: Vec::new(),
            });
        }
    }
    for item in content {
        if let Some(l) = nodes
            .iter_mut()
            .flat_map(|n| n.lessons.iter_mut())
            .find(|l| l.lesson.id == item.lesson_id)
        {
            l.content.push(item);
        }
    }
    CourseTree {
        course,
        modules: nodes,
    }
}

// --- CRUD ---

pub async fn create_course(db: &Db, req: CreateCourseReq) -> AppResult<Course> {
    let course = sqlx::query_as::<Postgres, Course>(
        r#"
        INSERT INTO courses (id, title, description, total_hours)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.title)
    .bind(req.description)
    .bind(req.total_hours)
    .fetch_one(db)
    .await?;
    Ok(course)
}

pub async fn create_module(db: &Db, course_id: Uuid, req: CreateModuleReq) -> AppResult<Module> {
    let exists = sqlx::query_scalar::<Postgres, i64>("SELECT count(*) FROM courses WHERE id = $1")
        .bind(course_id)
        .fetch_one(db)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound("course not found"));
    }
    // New siblings always append; the reorder transaction is the only thing
    // that rewrites existing order values.
    let module = sqlx::query_as::<Postgres, Module>(
        r#"
        INSERT INTO modules (id, course_id, name, description, starts_on, ends_on, "order", has_exam)
        VALUES ($1, $2, $3, $4, $5, $6,
                (SELECT coalesce(max("order"), 0) + 1 FROM modules WHERE course_id = $2),
                $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(course_id)
    .bind(req.name)
    .bind(req.description)
    .bind(req.starts_on)
    .bind(req.ends_on)
    .bind(req.has_exam)
    .fetch_one(db)
    .await?;
    Ok(module)
}

pub async fn create_lesson(db: &Db, module_id: Uuid, req: CreateLessonReq) -> AppResult<Lesson> {
    let exists = sqlx::query_scalar::<Postgres, i64>("SELECT count(*) FROM modules WHERE id = $1")
        .bind(module_id)
        .fetch_one(db)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound("module not found"));
    }
    let lesson = sqlx::query_as::<Postgres, Lesson>(
        r#"
        INSERT INTO lessons (id, module_id, title, description, "order", published)
        VALUES ($1, $2, $3, $4,
                (SELECT coalesce(max("order"), 0) + 1 FROM lessons WHERE module_id = $2),
                $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(module_id)
    .bind(req.title)
    .bind(req.description)
    .bind(req.published)
    .fetch_one(db)
    .await?;
    Ok(lesson)
}

/// Payload columns after applying the one-payload-per-kind rule. Fields not
/// belonging to the requested kind come out as None, which is also how a
/// kind switch clears stale payloads on update.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPayload {
    pub kind: ContentKind,
    pub video_ref: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
}

pub fn normalize_payload(req: &ContentPayloadReq) -> Result<ContentPayload, AppError> {
    let mut p = ContentPayload {
        kind: req.kind,
        video_ref: None,
        body: None,
        url: None,
        file_name: None,
        file_path: None,
    };
    match req.kind {
        ContentKind::Video => {
            p.video_ref = Some(
                req.video_ref
                    .clone()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AppError::Validation("video_ref is required".into()))?,
            );
        }
        ContentKind::Text => {
            p.body = Some(
                req.body
                    .clone()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AppError::Validation("body is required".into()))?,
            );
        }
        ContentKind::Link => {
            p.url = Some(
                req.url
                    .clone()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AppError::Validation("url is required".into()))?,
            );
        }
        ContentKind::Attachment => {
            p.file_name = Some(
                req.file_name
                    .clone()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AppError::Validation("file_name is required".into()))?,
            );
            p.file_path = Some(
                req.file_path
                    .clone()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AppError::Validation("file_path is required".into()))?,
            );
        }
    }
    Ok(p)
}

pub async fn create_content_item(
    db: &Db,
    lesson_id: Uuid,
    req: ContentPayloadReq,
) -> AppResult<ContentItem> {
    let exists = sqlx::query_scalar::<Postgres, i64>("SELECT count(*) FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .fetch_one(db)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound("lesson not found"));
    }
    let p = normalize_payload(&req)?;
    let item = sqlx::query_as::<Postgres, ContentItem>(
        r#"
        INSERT INTO content_items
            (id, lesson_id, kind, video_ref, body, url, file_name, file_path, "order")
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                (SELECT coalesce(max("order"), 0) + 1 FROM content_items WHERE lesson_id = $2))
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(lesson_id)
    .bind(p.kind)
    .bind(p.video_ref)
    .bind(p.body)
    .bind(p.url)
    .bind(p.file_name)
    .bind(p.file_path)
    .fetch_one(db)
    .await?;
    Ok(item)
}

pub async fn update_content_item(
    db: &Db,
    content_id: Uuid,
    req: ContentPayloadReq,
) -> AppResult<ContentItem> {
    let p = normalize_payload(&req)?;
    let item = sqlx::query_as::<Postgres, ContentItem>(
        r#"
        UPDATE content_items
        SET kind = $2, video_ref = $3, body = $4, url = $5, file_name = $6, file_path = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(content_id)
    .bind(p.kind)
    .bind(p.video_ref)
    .bind(p.body)
    .bind(p.url)
    .bind(p.file_name)
    .bind(p.file_path)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::NotFound("content item not found"))?;
    Ok(item)
}

pub async fn set_lesson_published(db: &Db, lesson_id: Uuid, published: bool) -> AppResult<Lesson> {
    let lesson = sqlx::query_as::<Postgres, Lesson>(
        "UPDATE lessons SET published = $2 WHERE id = $1 RETURNING *",
    )
    .bind(lesson_id)
    .bind(published)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::NotFound("lesson not found"))?;
    Ok(lesson)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::Utc;

    pub fn course() -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "course".into(),
            description: None,
            total_hours: None,
            created_at: Utc::now(),
        }
    }

    pub fn module(course_id: Uuid, order: i32) -> Module {
        Module {
            id: Uuid::new_v4(),
            course_id,
            name: format!("module {order}"),
            description: None,
            starts_on: None,
            ends_on: None,
            order,
            has_exam: false,
            created_at: Utc::now(),
        }
    }

    pub fn lesson(module_id: Uuid, order: i32, published: bool) -> Lesson {
        Lesson {
            id: Uuid::new_v4(),
            module_id,
            title: format!("lesson {order}"),
            description: None,
            order,
            published,
            created_at: Utc::now(),
        }
    }

    pub fn tree(course: Course, modules: Vec<(Module, Vec<Lesson>)>) -> CourseTree {
        CourseTree {
            course,
            modules: modules
                .into_iter()
                .map(|(module, lessons)| ModuleNode {
                    module,
                    lessons: lessons
                        .into_iter()
                        .map(|lesson| LessonNode {
                            lesson,
                            content: Vec::new(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
