//! Row models for the per-lesson association tables.

use serde::Serialize;
use sqlx::FromRow;

use lessonmgmt_core::error::CoreError;
use lessonmgmt_core::lesson::{AttendStatus, LessonLearner};
use lessonmgmt_core::types::Timestamp;

/// A row from the `lesson_teachers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonTeacherRow {
    pub lesson_id: String,
    pub teacher_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Teacher row joined with the user directory for display names.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonTeacherName {
    pub lesson_id: String,
    pub teacher_id: String,
    pub name: String,
}

/// A row from the `lesson_classrooms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonClassroomRow {
    pub lesson_id: String,
    pub classroom_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `lesson_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonMemberRow {
    pub lesson_id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    pub attendance_status: String,
    pub attendance_notice: Option<String>,
    pub attendance_reason: Option<String>,
    pub attendance_note: Option<String>,
}

impl LessonMemberRow {
    pub fn from_learner(lesson_id: &str, learner: &LessonLearner) -> Self {
        Self {
            lesson_id: lesson_id.to_string(),
            user_id: learner.learner_id.clone(),
            course_id: if learner.course_id.is_empty() {
                None
            } else {
                Some(learner.course_id.clone())
            },
            attendance_status: learner.attend_status.as_str().to_string(),
            attendance_notice: learner.attendance_notice.clone(),
            attendance_reason: learner.attendance_reason.clone(),
            attendance_note: learner.attendance_note.clone(),
        }
    }

    /// Convert to a roster entry. `reallocate_from` decoration is applied by
    /// the caller from the reallocation tracker.
    pub fn into_learner(self) -> Result<LessonLearner, CoreError> {
        Ok(LessonLearner {
            learner_id: self.user_id,
            course_id: self.course_id.unwrap_or_default(),
            attend_status: AttendStatus::parse(&self.attendance_status)?,
            attendance_notice: self.attendance_notice,
            attendance_reason: self.attendance_reason,
            attendance_note: self.attendance_note,
            reallocate_from: None,
            name: String::new(),
        })
    }
}

/// Member row joined with the user directory for display names.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonMemberName {
    pub lesson_id: String,
    pub user_id: String,
    pub course_id: Option<String>,
    pub attendance_status: String,
    pub attendance_notice: Option<String>,
    pub attendance_reason: Option<String>,
    pub attendance_note: Option<String>,
    pub name: String,
}
