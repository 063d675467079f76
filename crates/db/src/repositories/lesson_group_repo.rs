//! Repository for the `lesson_groups` table: per-course material references
//! shared by all occurrences of a recurrence linked to that course.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::RepoResult;
use crate::models::lesson::LessonGroupRow;

const COLUMNS: &str = "lesson_group_id, course_id, media_ids, created_at, updated_at";

pub struct LessonGroupRepo;

impl LessonGroupRepo {
    /// Insert or reactivate a group, replacing its media list.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        lesson_group_id: &str,
        course_id: &str,
        media_ids: &[String],
    ) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO lesson_groups (lesson_group_id, course_id, media_ids) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (lesson_group_id, course_id) \
             DO UPDATE SET media_ids = EXCLUDED.media_ids, deleted_at = NULL, updated_at = now()",
        )
        .bind(lesson_group_id)
        .bind(course_id)
        .bind(media_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Update the media list of an existing group in place (lesson kept its
    /// course, so the group is reused).
    pub async fn update_media(
        tx: &mut Transaction<'_, Postgres>,
        lesson_group_id: &str,
        course_id: &str,
        media_ids: &[String],
    ) -> RepoResult<()> {
        sqlx::query(
            "UPDATE lesson_groups SET media_ids = $3, updated_at = now() \
             WHERE lesson_group_id = $1 AND course_id = $2 AND deleted_at IS NULL",
        )
        .bind(lesson_group_id)
        .bind(course_id)
        .bind(media_ids)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Batch lookup by composite keys, used when hydrating many lessons.
    pub async fn find_by_keys(
        pool: &PgPool,
        keys: &[(String, String)],
    ) -> RepoResult<Vec<LessonGroupRow>> {
        let group_ids: Vec<String> = keys.iter().map(|(g, _)| g.clone()).collect();
        let course_ids: Vec<String> = keys.iter().map(|(_, c)| c.clone()).collect();
        let query = format!(
            "SELECT {COLUMNS} FROM lesson_groups \
             WHERE (lesson_group_id, course_id) IN \
                   (SELECT unnest($1::text[]), unnest($2::text[])) \
               AND deleted_at IS NULL"
        );
        let rows = sqlx::query_as::<_, LessonGroupRow>(&query)
            .bind(&group_ids)
            .bind(&course_ids)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Find an active group by its composite key.
    pub async fn find(
        pool: &PgPool,
        lesson_group_id: &str,
        course_id: &str,
    ) -> RepoResult<Option<LessonGroupRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lesson_groups \
             WHERE lesson_group_id = $1 AND course_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, LessonGroupRow>(&query)
            .bind(lesson_group_id)
            .bind(course_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }
}
