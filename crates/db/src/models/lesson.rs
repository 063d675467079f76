//! Lesson and lesson-group row models.

use chrono::Utc;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use lessonmgmt_core::error::CoreError;
use lessonmgmt_core::legacy::{legacy_lesson_type, legacy_status};
use lessonmgmt_core::lesson::{Lesson, SchedulingStatus, TeachingMedium, TeachingMethod};
use lessonmgmt_core::types::Timestamp;

/// A row from the `lessons` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonRow {
    pub lesson_id: String,
    pub name: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub teaching_medium: Option<String>,
    pub teaching_method: Option<String>,
    pub scheduling_status: String,
    pub location_id: String,
    pub course_id: Option<String>,
    pub class_id: Option<String>,
    pub scheduler_id: Option<String>,
    pub lesson_group_id: Option<String>,
    pub status: Option<String>,
    pub lesson_type: Option<String>,
    pub is_locked: bool,
    pub preparation_time: i32,
    pub break_time: i32,
    pub zoom_link: Option<String>,
    pub zoom_id: Option<String>,
    pub zoom_owner_id: Option<String>,
    pub zoom_occurrence_id: Option<String>,
    pub classdo_link: Option<String>,
    pub classdo_owner_id: Option<String>,
    pub classdo_room_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LessonRow {
    /// Build a row from the domain entity: validates it, mints a lesson ID
    /// when the caller left it empty, and fills the legacy code columns from
    /// their canonical counterparts only when unset.
    pub fn from_entity(lesson: &Lesson) -> Result<Self, CoreError> {
        lesson.validate()?;
        // validate() guarantees both timestamps are present.
        let (Some(start_time), Some(end_time)) = (lesson.start_time, lesson.end_time) else {
            return Err(CoreError::Validation(
                "lesson requires start_time and end_time".into(),
            ));
        };
        let lesson_id = if lesson.lesson_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            lesson.lesson_id.clone()
        };
        let status = lesson
            .status
            .clone()
            .or_else(|| Some(legacy_status(lesson.scheduling_status).to_string()));
        let lesson_type = lesson.lesson_type.clone().or_else(|| {
            lesson
                .teaching_medium
                .map(|m| legacy_lesson_type(m).to_string())
        });
        let now = Utc::now();
        Ok(Self {
            lesson_id,
            name: lesson.name.clone(),
            start_time,
            end_time,
            teaching_medium: lesson.teaching_medium.map(|m| m.as_str().to_string()),
            teaching_method: lesson.teaching_method.map(|m| m.as_str().to_string()),
            scheduling_status: lesson.scheduling_status.as_str().to_string(),
            location_id: lesson.location_id.clone(),
            course_id: lesson.course_id.clone(),
            class_id: lesson.class_id.clone(),
            scheduler_id: lesson.scheduler_id.clone(),
            lesson_group_id: lesson.lesson_group_id.clone(),
            status,
            lesson_type,
            is_locked: lesson.is_locked,
            preparation_time: lesson.preparation_time,
            break_time: lesson.break_time,
            zoom_link: lesson.zoom_link.clone(),
            zoom_id: lesson.zoom_id.clone(),
            zoom_owner_id: lesson.zoom_owner_id.clone(),
            zoom_occurrence_id: lesson.zoom_occurrence_id.clone(),
            classdo_link: lesson.classdo_link.clone(),
            classdo_owner_id: lesson.classdo_owner_id.clone(),
            classdo_room_id: lesson.classdo_room_id.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Convert back to the domain entity (relations left empty; callers
    /// hydrate teachers/classrooms/learners separately).
    pub fn into_entity(self) -> Result<Lesson, CoreError> {
        let teaching_medium = self
            .teaching_medium
            .as_deref()
            .map(TeachingMedium::parse)
            .transpose()?;
        let teaching_method = self
            .teaching_method
            .as_deref()
            .map(TeachingMethod::parse)
            .transpose()?;
        let scheduling_status = SchedulingStatus::parse(&self.scheduling_status)?;
        Ok(Lesson {
            lesson_id: self.lesson_id,
            name: self.name,
            start_time: Some(self.start_time),
            end_time: Some(self.end_time),
            teaching_medium,
            teaching_method,
            scheduling_status,
            location_id: self.location_id,
            course_id: self.course_id,
            class_id: self.class_id,
            scheduler_id: self.scheduler_id,
            lesson_group_id: self.lesson_group_id,
            status: self.status,
            lesson_type: self.lesson_type,
            is_locked: self.is_locked,
            preparation_time: self.preparation_time,
            break_time: self.break_time,
            material_ids: Vec::new(),
            zoom_link: self.zoom_link,
            zoom_id: self.zoom_id,
            zoom_owner_id: self.zoom_owner_id,
            zoom_occurrence_id: self.zoom_occurrence_id,
            classdo_link: self.classdo_link,
            classdo_owner_id: self.classdo_owner_id,
            classdo_room_id: self.classdo_room_id,
            teachers: Vec::new(),
            classrooms: Vec::new(),
            learners: Vec::new(),
        })
    }
}

/// A row from the `lesson_groups` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonGroupRow {
    pub lesson_group_id: String,
    pub course_id: String,
    pub media_ids: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
