//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument. Multi-statement writes take place inside
//! one transaction; the coordinator methods on `LessonRepo` compose the
//! association and reallocation repos through `&mut Transaction`.

use sqlx::{Postgres, Transaction};

pub mod lesson_classroom_repo;
pub mod lesson_group_repo;
pub mod lesson_list_repo;
pub mod lesson_member_repo;
pub mod lesson_repo;
pub mod lesson_teacher_repo;
pub mod reallocation_repo;

pub use lesson_classroom_repo::LessonClassroomRepo;
pub use lesson_group_repo::LessonGroupRepo;
pub use lesson_list_repo::LessonListRepo;
pub use lesson_member_repo::LessonMemberRepo;
pub use lesson_repo::LessonRepo;
pub use lesson_teacher_repo::LessonTeacherRepo;
pub use reallocation_repo::ReallocationRepo;

/// First half of every replace-in-place child-set write: soft-delete all
/// active rows of `table` belonging to the given lessons. The second half
/// (upsert-on-conflict clearing `deleted_at`) is table-specific.
pub(crate) async fn soft_delete_children(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    lesson_ids: &[String],
) -> Result<(), sqlx::Error> {
    let query = format!(
        "UPDATE {table} SET deleted_at = now(), updated_at = now() \
         WHERE lesson_id = ANY($1) AND deleted_at IS NULL"
    );
    sqlx::query(&query)
        .bind(lesson_ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
