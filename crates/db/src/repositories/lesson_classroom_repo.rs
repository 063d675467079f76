//! Repository for the `lesson_classrooms` table. Same replace-in-place
//! protocol as the teacher set.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::RepoResult;
use crate::models::associations::LessonClassroomRow;
use crate::repositories::soft_delete_children;

const COLUMNS: &str = "lesson_id, classroom_id, created_at, updated_at";

pub struct LessonClassroomRepo;

impl LessonClassroomRepo {
    /// Replace the classroom set for every lesson in `lesson_ids`.
    pub async fn replace_for_lessons(
        tx: &mut Transaction<'_, Postgres>,
        lesson_ids: &[String],
        classroom_ids: &[String],
    ) -> RepoResult<()> {
        soft_delete_children(tx, "lesson_classrooms", lesson_ids).await?;
        for lesson_id in lesson_ids {
            for (position, classroom_id) in classroom_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO lesson_classrooms (lesson_id, classroom_id, position) \
                     VALUES ($1, $2, $3) \
                     ON CONFLICT (lesson_id, classroom_id) \
                     DO UPDATE SET position = EXCLUDED.position, \
                                   deleted_at = NULL, updated_at = now()",
                )
                .bind(lesson_id)
                .bind(classroom_id)
                .bind(position as i32)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    /// Active classroom IDs for one lesson.
    pub async fn get_classroom_ids_by_lesson_id(
        pool: &PgPool,
        lesson_id: &str,
    ) -> RepoResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT classroom_id FROM lesson_classrooms \
             WHERE lesson_id = $1 AND deleted_at IS NULL \
             ORDER BY position, classroom_id",
        )
        .bind(lesson_id)
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// Active classroom rows for a set of lessons.
    pub async fn get_by_lesson_ids(
        pool: &PgPool,
        lesson_ids: &[String],
    ) -> RepoResult<Vec<LessonClassroomRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lesson_classrooms \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL \
             ORDER BY lesson_id, position, classroom_id"
        );
        let rows = sqlx::query_as::<_, LessonClassroomRow>(&query)
            .bind(lesson_ids)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}
