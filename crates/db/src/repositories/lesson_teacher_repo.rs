//! Repository for the `lesson_teachers` table.
//!
//! Writes are replace-in-place: the teacher set for a lesson always equals
//! exactly the set passed in the most recent write.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::RepoResult;
use crate::models::associations::{LessonTeacherName, LessonTeacherRow};
use crate::repositories::soft_delete_children;

const COLUMNS: &str = "lesson_id, teacher_id, created_at, updated_at";

pub struct LessonTeacherRepo;

impl LessonTeacherRepo {
    /// Replace the teacher set for every lesson in `lesson_ids` with
    /// `teacher_ids` (a recurrence shares one teacher set across all of its
    /// occurrences). Runs inside the caller's transaction.
    pub async fn replace_for_lessons(
        tx: &mut Transaction<'_, Postgres>,
        lesson_ids: &[String],
        teacher_ids: &[String],
    ) -> RepoResult<()> {
        soft_delete_children(tx, "lesson_teachers", lesson_ids).await?;
        for lesson_id in lesson_ids {
            for (position, teacher_id) in teacher_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO lesson_teachers (lesson_id, teacher_id, position) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (lesson_id, teacher_id) \
                     DO UPDATE SET position = EXCLUDED.position, \
                                   deleted_at = NULL, updated_at = now()",
                )
                .bind(lesson_id)
                .bind(teacher_id)
                .bind(position as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    /// Active teacher IDs for one lesson, in the order they were written.
    pub async fn get_teacher_ids_by_lesson_id(
        pool: &PgPool,
        lesson_id: &str,
    ) -> RepoResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT teacher_id FROM lesson_teachers \
             WHERE lesson_id = $1 AND deleted_at IS NULL \
             ORDER BY position, teacher_id",
        )
        .bind(lesson_id)
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// Active teacher rows for a set of lessons.
    pub async fn get_by_lesson_ids(
        pool: &PgPool,
        lesson_ids: &[String],
    ) -> RepoResult<Vec<LessonTeacherRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lesson_teachers \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL \
             ORDER BY lesson_id, position, teacher_id"
        );
        let rows = sqlx::query_as::<_, LessonTeacherRow>(&query)
            .bind(lesson_ids)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Teacher rows joined with the user directory for display names.
    pub async fn get_teachers_with_names_by_lesson_ids(
        pool: &PgPool,
        lesson_ids: &[String],
    ) -> RepoResult<Vec<LessonTeacherName>> {
        let rows = sqlx::query_as::<_, LessonTeacherName>(
            "SELECT lt.lesson_id, lt.teacher_id, COALESCE(ubi.name, '') AS name \
             FROM lesson_teachers lt \
             LEFT JOIN user_basic_info ubi \
               ON ubi.user_id = lt.teacher_id AND ubi.deleted_at IS NULL \
             WHERE lt.lesson_id = ANY($1) AND lt.deleted_at IS NULL \
             ORDER BY lt.lesson_id, lt.position, lt.teacher_id",
        )
        .bind(lesson_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
