//! Query DTOs for the filtered, keyset-paginated lesson listing.

use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use lessonmgmt_core::lesson::{Lesson, SchedulingStatus};
use lessonmgmt_core::types::Timestamp;

/// Report-status filter value matching lessons with no submitted report.
pub const REPORT_STATUS_NONE: &str = "LESSON_REPORT_SUBMITTING_STATUS_NONE";

/// Which side of `current_time` a listing covers, and therefore the sort
/// direction: future pages ascend, past pages descend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonTime {
    Future,
    Past,
}

/// Arguments for [`crate::repositories::LessonListRepo::retrieve`]. Every
/// collection filter is optional: an empty set means "no constraint".
#[derive(Debug, Clone, Deserialize)]
pub struct LessonListArgs {
    pub lesson_time: LessonTime,
    /// Boundary separating future from past pages.
    #[serde(default = "Utc::now")]
    pub current_time: Timestamp,
    pub limit: i64,
    /// Keyset cursor: page starts strictly after (future) / before (past)
    /// this lesson. Empty or absent means "from the boundary".
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(default)]
    pub from_date: Option<Timestamp>,
    #[serde(default)]
    pub to_date: Option<Timestamp>,
    /// IANA timezone used for weekday and time-of-day filters.
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub from_time: Option<NaiveTime>,
    #[serde(default)]
    pub to_time: Option<NaiveTime>,
    /// Postgres DOW values: 0 = Sunday .. 6 = Saturday.
    #[serde(default)]
    pub days_of_week: Vec<i32>,
    /// Matched against student display names, space-insensitive.
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub location_ids: Vec<String>,
    #[serde(default)]
    pub class_ids: Vec<String>,
    #[serde(default)]
    pub course_ids: Vec<String>,
    #[serde(default)]
    pub teacher_ids: Vec<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub grade_ids: Vec<String>,
    #[serde(default)]
    pub course_type_ids: Vec<String>,
    #[serde(default)]
    pub scheduling_statuses: Vec<SchedulingStatus>,
    /// `LESSON_REPORT_SUBMITTING_STATUS_*` codes; may include
    /// [`REPORT_STATUS_NONE`] to match lessons without a report.
    #[serde(default)]
    pub report_statuses: Vec<String>,
}

impl LessonListArgs {
    pub fn new(lesson_time: LessonTime, current_time: Timestamp, limit: i64) -> Self {
        Self {
            lesson_time,
            current_time,
            limit,
            lesson_id: None,
            from_date: None,
            to_date: None,
            time_zone: None,
            from_time: None,
            to_time: None,
            days_of_week: Vec::new(),
            keyword: None,
            location_ids: Vec::new(),
            class_ids: Vec::new(),
            course_ids: Vec::new(),
            teacher_ids: Vec::new(),
            student_ids: Vec::new(),
            grade_ids: Vec::new(),
            course_type_ids: Vec::new(),
            scheduling_statuses: Vec::new(),
            report_statuses: Vec::new(),
        }
    }
}

/// One page of a lesson listing plus the previous-page pointer.
#[derive(Debug, Serialize)]
pub struct LessonPage {
    pub lessons: Vec<Lesson>,
    /// Rows matching the filter, ignoring the cursor.
    pub total: i64,
    /// Cursor that yields exactly the preceding page; empty when the
    /// preceding page is the unanchored first page.
    pub prev_cursor: String,
    /// Rows strictly on the preceding side of this page.
    pub prev_total: i64,
}
