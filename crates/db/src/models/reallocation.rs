//! Reallocation edge row model.

use serde::Serialize;
use sqlx::FromRow;

use lessonmgmt_core::lesson::ReallocationEdge;
use lessonmgmt_core::types::Timestamp;

/// A row from the `reallocation` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReallocationRow {
    pub student_id: String,
    pub original_lesson_id: String,
    pub new_lesson_id: Option<String>,
    pub course_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ReallocationRow {
    pub fn into_edge(self) -> ReallocationEdge {
        ReallocationEdge {
            student_id: self.student_id,
            course_id: self.course_id,
            original_lesson_id: self.original_lesson_id,
            new_lesson_id: self.new_lesson_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn row_converts_to_edge() {
        let now = Utc::now();
        let row = ReallocationRow {
            student_id: "s1".into(),
            original_lesson_id: "L1".into(),
            new_lesson_id: Some("L2".into()),
            course_id: "c1".into(),
            created_at: now,
            updated_at: now,
        };
        let edge = row.into_edge();
        assert_eq!(edge.student_id, "s1");
        assert_eq!(edge.original_lesson_id, "L1");
        assert_eq!(edge.new_lesson_id.as_deref(), Some("L2"));
    }
}
