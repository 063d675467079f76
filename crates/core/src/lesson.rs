//! Lesson domain entities: the Lesson occurrence, its roster/teacher/classroom
//! relations, the recurring-lesson aggregate, and the reallocation edge
//! derivation applied on every roster write.
//!
//! This module lives in `core` (zero internal deps) so it can be used by the
//! repository layer and any future worker or CLI tooling without pulling in
//! sqlx.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{LessonId, Timestamp, UNSET_MINUTES};

// ---------------------------------------------------------------------------
// Classification enums
// ---------------------------------------------------------------------------
//
// All enums persist as their canonical TEXT codes. Conversion is explicit
// (`as_str` / `parse`) because the columns are plain TEXT shared with older
// writers, not Postgres enum types.

/// How a lesson is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeachingMedium {
    Offline,
    Online,
    Zoom,
    ClassDo,
}

impl TeachingMedium {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "LESSON_TEACHING_MEDIUM_OFFLINE",
            Self::Online => "LESSON_TEACHING_MEDIUM_ONLINE",
            Self::Zoom => "LESSON_TEACHING_MEDIUM_ZOOM",
            Self::ClassDo => "LESSON_TEACHING_MEDIUM_CLASS_DO",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "LESSON_TEACHING_MEDIUM_OFFLINE" => Ok(Self::Offline),
            "LESSON_TEACHING_MEDIUM_ONLINE" => Ok(Self::Online),
            "LESSON_TEACHING_MEDIUM_ZOOM" => Ok(Self::Zoom),
            "LESSON_TEACHING_MEDIUM_CLASS_DO" => Ok(Self::ClassDo),
            other => Err(CoreError::Validation(format!(
                "unknown teaching medium: {other}"
            ))),
        }
    }
}

/// Whether learners attend individually or as a course/class group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeachingMethod {
    Individual,
    Group,
}

impl TeachingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "LESSON_TEACHING_METHOD_INDIVIDUAL",
            Self::Group => "LESSON_TEACHING_METHOD_GROUP",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "LESSON_TEACHING_METHOD_INDIVIDUAL" => Ok(Self::Individual),
            "LESSON_TEACHING_METHOD_GROUP" => Ok(Self::Group),
            other => Err(CoreError::Validation(format!(
                "unknown teaching method: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a lesson occurrence. Transitions are governed by
/// [`crate::scheduling::TransitionPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulingStatus {
    Draft,
    Published,
    Completed,
    Canceled,
}

impl SchedulingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "LESSON_SCHEDULING_STATUS_DRAFT",
            Self::Published => "LESSON_SCHEDULING_STATUS_PUBLISHED",
            Self::Completed => "LESSON_SCHEDULING_STATUS_COMPLETED",
            Self::Canceled => "LESSON_SCHEDULING_STATUS_CANCELED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "LESSON_SCHEDULING_STATUS_DRAFT" => Ok(Self::Draft),
            "LESSON_SCHEDULING_STATUS_PUBLISHED" => Ok(Self::Published),
            "LESSON_SCHEDULING_STATUS_COMPLETED" => Ok(Self::Completed),
            "LESSON_SCHEDULING_STATUS_CANCELED" => Ok(Self::Canceled),
            other => Err(CoreError::Validation(format!(
                "unknown scheduling status: {other}"
            ))),
        }
    }
}

impl Default for SchedulingStatus {
    fn default() -> Self {
        Self::Published
    }
}

/// A learner's attendance state on one occurrence. `Reallocate` on write is
/// the signal that the student was displaced from this occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendStatus {
    Empty,
    Attend,
    Absent,
    Reallocate,
}

impl AttendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "STUDENT_ATTEND_STATUS_EMPTY",
            Self::Attend => "STUDENT_ATTEND_STATUS_ATTEND",
            Self::Absent => "STUDENT_ATTEND_STATUS_ABSENT",
            Self::Reallocate => "STUDENT_ATTEND_STATUS_REALLOCATE",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "STUDENT_ATTEND_STATUS_EMPTY" => Ok(Self::Empty),
            "STUDENT_ATTEND_STATUS_ATTEND" => Ok(Self::Attend),
            "STUDENT_ATTEND_STATUS_ABSENT" => Ok(Self::Absent),
            "STUDENT_ATTEND_STATUS_REALLOCATE" => Ok(Self::Reallocate),
            other => Err(CoreError::Validation(format!(
                "unknown attend status: {other}"
            ))),
        }
    }
}

impl Default for AttendStatus {
    fn default() -> Self {
        Self::Empty
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// A teacher assigned to a lesson. `name` is filled from the user directory
/// on read paths that need display names; it is never written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonTeacher {
    pub teacher_id: String,
    #[serde(default)]
    pub name: String,
}

impl LessonTeacher {
    pub fn new(teacher_id: impl Into<String>) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            name: String::new(),
        }
    }
}

/// A physical/virtual classroom assigned to a lesson.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonClassroom {
    pub classroom_id: String,
}

impl LessonClassroom {
    pub fn new(classroom_id: impl Into<String>) -> Self {
        Self {
            classroom_id: classroom_id.into(),
        }
    }
}

/// One roster entry: a learner attached to a lesson occurrence with their
/// attendance sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonLearner {
    pub learner_id: String,
    pub course_id: String,
    #[serde(default)]
    pub attend_status: AttendStatus,
    pub attendance_notice: Option<String>,
    pub attendance_reason: Option<String>,
    pub attendance_note: Option<String>,
    /// Original lesson this learner was reallocated out of. Populated by a
    /// join against the reallocation tracker on reads; on writes a non-empty
    /// value records that this lesson is the learner's new placement.
    pub reallocate_from: Option<String>,
    /// Display name from the user directory, read paths only.
    #[serde(default)]
    pub name: String,
}

// ---------------------------------------------------------------------------
// Reallocation edge
// ---------------------------------------------------------------------------

/// A directed displacement edge: the student left `original_lesson_id` and,
/// when `new_lesson_id` is set, has been placed into that lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReallocationEdge {
    pub student_id: String,
    pub course_id: String,
    pub original_lesson_id: String,
    pub new_lesson_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Lesson
// ---------------------------------------------------------------------------

/// One scheduled teaching occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    /// Opaque ID; empty means "generate one on insert".
    pub lesson_id: LessonId,
    pub name: String,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub teaching_medium: Option<TeachingMedium>,
    pub teaching_method: Option<TeachingMethod>,
    #[serde(default)]
    pub scheduling_status: SchedulingStatus,
    pub location_id: String,
    pub course_id: Option<String>,
    pub class_id: Option<String>,
    /// Groups occurrences of one recurrence.
    pub scheduler_id: Option<String>,
    pub lesson_group_id: Option<String>,
    /// Legacy `LESSON_STATUS_*` code. Filled from `scheduling_status` when
    /// unset, never overwritten when explicitly set.
    pub status: Option<String>,
    /// Legacy `LESSON_TYPE_*` code, same fill rule from `teaching_medium`.
    pub lesson_type: Option<String>,
    /// Once true the occurrence is immutable to bulk recurrence edits.
    #[serde(default)]
    pub is_locked: bool,
    /// Minutes; -1 means unset.
    pub preparation_time: i32,
    pub break_time: i32,
    /// Material/media references stored on the lesson group.
    #[serde(default)]
    pub material_ids: Vec<String>,
    pub zoom_link: Option<String>,
    pub zoom_id: Option<String>,
    pub zoom_owner_id: Option<String>,
    pub zoom_occurrence_id: Option<String>,
    pub classdo_link: Option<String>,
    pub classdo_owner_id: Option<String>,
    pub classdo_room_id: Option<String>,
    #[serde(default)]
    pub teachers: Vec<LessonTeacher>,
    #[serde(default)]
    pub classrooms: Vec<LessonClassroom>,
    #[serde(default)]
    pub learners: Vec<LessonLearner>,
}

impl Default for Lesson {
    fn default() -> Self {
        Self {
            lesson_id: String::new(),
            name: String::new(),
            start_time: None,
            end_time: None,
            teaching_medium: None,
            teaching_method: None,
            scheduling_status: SchedulingStatus::default(),
            location_id: String::new(),
            course_id: None,
            class_id: None,
            scheduler_id: None,
            lesson_group_id: None,
            status: None,
            lesson_type: None,
            is_locked: false,
            preparation_time: UNSET_MINUTES,
            break_time: UNSET_MINUTES,
            material_ids: Vec::new(),
            zoom_link: None,
            zoom_id: None,
            zoom_owner_id: None,
            zoom_occurrence_id: None,
            classdo_link: None,
            classdo_owner_id: None,
            classdo_room_id: None,
            teachers: Vec::new(),
            classrooms: Vec::new(),
            learners: Vec::new(),
        }
    }
}

impl Lesson {
    /// Structural checks applied before any write.
    pub fn validate(&self) -> Result<(), CoreError> {
        let (Some(start), Some(end)) = (self.start_time, self.end_time) else {
            return Err(CoreError::Validation(
                "lesson requires start_time and end_time".into(),
            ));
        };
        if end <= start {
            return Err(CoreError::Validation(format!(
                "end_time must be after start_time ({end} <= {start})"
            )));
        }
        if self.location_id.is_empty() {
            return Err(CoreError::Validation("lesson requires location_id".into()));
        }
        if self.teaching_method == Some(TeachingMethod::Group) && self.course_id.is_none() {
            return Err(CoreError::Validation(
                "a GROUP lesson must carry course_id".into(),
            ));
        }
        Ok(())
    }

    /// Course IDs this lesson links to. A GROUP lesson carries its course
    /// directly; an INDIVIDUAL lesson derives linkage per learner.
    pub fn course_ids(&self) -> Vec<String> {
        match self.teaching_method {
            Some(TeachingMethod::Group) => self.course_id.iter().cloned().collect(),
            _ => {
                let mut ids: Vec<String> = self
                    .learners
                    .iter()
                    .filter(|l| !l.course_id.is_empty())
                    .map(|l| l.course_id.clone())
                    .collect();
                ids.sort();
                ids.dedup();
                ids
            }
        }
    }

    pub fn teacher_ids(&self) -> Vec<String> {
        self.teachers.iter().map(|t| t.teacher_id.clone()).collect()
    }

    pub fn classroom_ids(&self) -> Vec<String> {
        self.classrooms
            .iter()
            .map(|c| c.classroom_id.clone())
            .collect()
    }

    /// Derives the reallocation edges implied by this lesson's roster:
    /// - `AttendStatus::Reallocate` => the learner was displaced out of this
    ///   lesson and has no placement yet.
    /// - a non-empty `reallocate_from` => this lesson is the learner's new
    ///   placement for that original lesson.
    pub fn reallocation_edges(&self) -> Vec<ReallocationEdge> {
        let mut edges = Vec::new();
        for learner in &self.learners {
            if learner.attend_status == AttendStatus::Reallocate {
                edges.push(ReallocationEdge {
                    student_id: learner.learner_id.clone(),
                    course_id: learner.course_id.clone(),
                    original_lesson_id: self.lesson_id.clone(),
                    new_lesson_id: None,
                });
            }
            if let Some(original) = learner
                .reallocate_from
                .as_ref()
                .filter(|id| !id.is_empty())
            {
                edges.push(ReallocationEdge {
                    student_id: learner.learner_id.clone(),
                    course_id: learner.course_id.clone(),
                    original_lesson_id: original.clone(),
                    new_lesson_id: Some(self.lesson_id.clone()),
                });
            }
        }
        edges
    }
}

// ---------------------------------------------------------------------------
// RecurringLesson aggregate
// ---------------------------------------------------------------------------

/// An ordered batch of occurrences sharing one scheduler. The first element
/// (the "base lesson") supplies the canonical teacher/classroom/course set
/// that every other occurrence inherits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringLesson {
    pub lessons: Vec<Lesson>,
}

impl RecurringLesson {
    pub fn new(lessons: Vec<Lesson>) -> Self {
        Self { lessons }
    }

    pub fn base_lesson(&self) -> Option<&Lesson> {
        self.lessons.first()
    }

    pub fn lesson_ids(&self) -> Vec<String> {
        self.lessons.iter().map(|l| l.lesson_id.clone()).collect()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.lessons.is_empty() {
            return Err(CoreError::Validation(
                "recurring lesson batch is empty".into(),
            ));
        }
        for lesson in &self.lessons {
            lesson.validate()?;
        }
        Ok(())
    }
}
