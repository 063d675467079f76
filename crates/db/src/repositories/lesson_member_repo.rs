//! Repository for the `lesson_members` table (per-lesson learner rosters).
//!
//! Unlike teachers and classrooms, rosters are replaced per occurrence: two
//! occurrences of one recurrence may legitimately differ (a student can be
//! reallocated out of a single date).

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::RepoResult;
use crate::models::associations::{LessonMemberName, LessonMemberRow};
use crate::repositories::soft_delete_children;

const COLUMNS: &str = "\
    lesson_id, user_id, course_id, attendance_status, \
    attendance_notice, attendance_reason, attendance_note";

pub struct LessonMemberRepo;

impl LessonMemberRepo {
    /// Replace one lesson's roster with `members`.
    pub async fn replace_roster(
        tx: &mut Transaction<'_, Postgres>,
        lesson_id: &str,
        members: &[LessonMemberRow],
    ) -> RepoResult<()> {
        let ids = [lesson_id.to_string()];
        soft_delete_children(tx, "lesson_members", &ids).await?;
        for (position, member) in members.iter().enumerate() {
            sqlx::query(
                "INSERT INTO lesson_members \
                    (lesson_id, user_id, course_id, attendance_status, \
                     attendance_notice, attendance_reason, attendance_note, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (lesson_id, user_id) \
                 DO UPDATE SET \
                    course_id = EXCLUDED.course_id, \
                    attendance_status = EXCLUDED.attendance_status, \
                    attendance_notice = EXCLUDED.attendance_notice, \
                    attendance_reason = EXCLUDED.attendance_reason, \
                    attendance_note = EXCLUDED.attendance_note, \
                    position = EXCLUDED.position, \
                    deleted_at = NULL, \
                    updated_at = now()",
            )
            .bind(lesson_id)
            .bind(&member.user_id)
            .bind(&member.course_id)
            .bind(&member.attendance_status)
            .bind(&member.attendance_notice)
            .bind(&member.attendance_reason)
            .bind(&member.attendance_note)
            .bind(position as i32)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Active roster rows for one lesson.
    pub async fn get_by_lesson_id(
        pool: &PgPool,
        lesson_id: &str,
    ) -> RepoResult<Vec<LessonMemberRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lesson_members \
             WHERE lesson_id = $1 AND deleted_at IS NULL \
             ORDER BY position, user_id"
        );
        let rows = sqlx::query_as::<_, LessonMemberRow>(&query)
            .bind(lesson_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Active roster rows for a set of lessons.
    pub async fn get_by_lesson_ids(
        pool: &PgPool,
        lesson_ids: &[String],
    ) -> RepoResult<Vec<LessonMemberRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lesson_members \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL \
             ORDER BY lesson_id, position, user_id"
        );
        let rows = sqlx::query_as::<_, LessonMemberRow>(&query)
            .bind(lesson_ids)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Roster rows joined with the user directory for display names.
    pub async fn get_learners_with_names_by_lesson_ids(
        pool: &PgPool,
        lesson_ids: &[String],
    ) -> RepoResult<Vec<LessonMemberName>> {
        let rows = sqlx::query_as::<_, LessonMemberName>(
            "SELECT lm.lesson_id, lm.user_id, lm.course_id, lm.attendance_status, \
                    lm.attendance_notice, lm.attendance_reason, lm.attendance_note, \
                    COALESCE(ubi.name, '') AS name \
             FROM lesson_members lm \
             LEFT JOIN user_basic_info ubi \
               ON ubi.user_id = lm.user_id AND ubi.deleted_at IS NULL \
             WHERE lm.lesson_id = ANY($1) AND lm.deleted_at IS NULL \
             ORDER BY lm.lesson_id, lm.position, lm.user_id",
        )
        .bind(lesson_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
