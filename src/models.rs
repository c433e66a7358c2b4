use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub total_hours: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub order: i32,
    pub has_exam: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "content_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Text,
    Link,
    Attachment,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct ContentItem {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub kind: ContentKind,
    pub video_ref: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Enrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub participant_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct ProgressRecord {
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

// --- request/response DTOs ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateCourseReq {
    pub title: String,
    pub description: Option<String>,
    pub total_hours: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateModuleReq {
    pub name: String,
    pub description: Option<String>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    #[serde(default)]
    pub has_exam: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateLessonReq {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContentPayloadReq {
    pub kind: ContentKind,
    pub video_ref: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetPublishedReq {
    pub published: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateEnrollmentReq {
    pub course_id: Uuid,
    pub participant_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LessonRef {
    pub lesson_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReorderReq {
    pub ordered_ids: Vec<Uuid>,
}

/// One entry of the learner-facing flattened sequence.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SequenceEntry {
    pub lesson_id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub position: usize,
    pub completed: bool,
    pub accessible: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlayerView {
    pub course_id: Uuid,
    pub sequence: Vec<SequenceEntry>,
    pub unlocked_index: usize,
    pub completed_ids: Vec<Uuid>,
    pub current_lesson: Option<Lesson>,
    pub current_content: Vec<ContentItem>,
}
