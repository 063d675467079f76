//! Repository for the `reallocation` table: directed displacement edges
//! `(student, course, original_lesson) -> new_lesson?`.
//!
//! Chain terminology: edges link when one edge's `new_lesson_id` equals the
//! next edge's `original_lesson_id` for the same student. Only the tail of a
//! chain (an edge whose `new_lesson_id` is not another edge's
//! `original_lesson_id`) may be retracted; retracting a middle link would
//! orphan the tail.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use lessonmgmt_core::lesson::ReallocationEdge;

use crate::error::{RepoError, RepoResult};
use crate::models::reallocation::ReallocationRow;

const COLUMNS: &str = "\
    student_id, original_lesson_id, new_lesson_id, course_id, created_at, updated_at";

pub struct ReallocationRepo;

impl ReallocationRepo {
    // =======================================================================
    // Writes
    // =======================================================================

    /// Upsert edges keyed by `(student_id, original_lesson_id)`, clearing
    /// the delete marker and replacing the placement on conflict.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        edges: &[ReallocationEdge],
    ) -> RepoResult<()> {
        for edge in edges {
            sqlx::query(
                "INSERT INTO reallocation \
                    (student_id, original_lesson_id, new_lesson_id, course_id) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (student_id, original_lesson_id) \
                 DO UPDATE SET \
                    new_lesson_id = EXCLUDED.new_lesson_id, \
                    course_id = EXCLUDED.course_id, \
                    deleted_at = NULL, \
                    updated_at = now()",
            )
            .bind(&edge.student_id)
            .bind(&edge.original_lesson_id)
            .bind(&edge.new_lesson_id)
            .bind(&edge.course_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Bulk-retract edges for flat `(student_id, original_lesson_id)` pairs.
    /// With `is_reallocated = false` only dangling edges (`new_lesson_id IS
    /// NULL`) are removed, so a live reallocation is never silently
    /// discarded. Returns the number of edges retracted.
    pub async fn soft_delete(
        pool: &PgPool,
        student_and_original_pairs: &[String],
        is_reallocated: bool,
    ) -> RepoResult<u64> {
        let (student_ids, original_ids) =
            split_pairs(student_and_original_pairs, "student/original lesson")?;
        let guard = if is_reallocated {
            ""
        } else {
            " AND new_lesson_id IS NULL"
        };
        let query = format!(
            "UPDATE reallocation SET deleted_at = now(), updated_at = now() \
             WHERE (student_id, original_lesson_id) IN \
                   (SELECT unnest($1::text[]), unnest($2::text[])) \
               AND deleted_at IS NULL{guard}"
        );
        let result = sqlx::query(&query)
            .bind(&student_ids)
            .bind(&original_ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// For each flat `(student_id, new_lesson_id)` pair, clear the placement
    /// back to null. A pair whose edge has a downstream link (its new lesson
    /// is another edge's original lesson for the same student) is rejected
    /// with [`RepoError::InvalidReallocationRetraction`]; pairs with no
    /// matching edge are skipped. Returns the number of edges retracted.
    pub async fn cancel_if_student_reallocated(
        pool: &PgPool,
        student_and_new_lesson_pairs: &[String],
    ) -> RepoResult<u64> {
        let (student_ids, new_lesson_ids) =
            split_pairs(student_and_new_lesson_pairs, "student/new lesson")?;

        let mut tx = pool.begin().await?;
        let mut retracted = 0u64;
        for (student_id, new_lesson_id) in student_ids.iter().zip(&new_lesson_ids) {
            let has_downstream = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (\
                    SELECT 1 FROM reallocation \
                    WHERE student_id = $1 AND original_lesson_id = $2 \
                      AND deleted_at IS NULL)",
            )
            .bind(student_id)
            .bind(new_lesson_id)
            .fetch_one(&mut *tx)
            .await?;
            if has_downstream {
                return Err(RepoError::InvalidReallocationRetraction {
                    student_id: student_id.clone(),
                    lesson_id: new_lesson_id.clone(),
                });
            }

            let result = sqlx::query(
                "UPDATE reallocation SET new_lesson_id = NULL, updated_at = now() \
                 WHERE student_id = $1 AND new_lesson_id = $2 AND deleted_at IS NULL",
            )
            .bind(student_id)
            .bind(new_lesson_id)
            .execute(&mut *tx)
            .await?;
            retracted += result.rows_affected();
        }
        tx.commit().await?;

        debug!(retracted, "cancelled student reallocations");
        Ok(retracted)
    }

    /// Soft-delete all edges rooted at the given (deleted) lessons.
    pub async fn delete_by_original_lesson_id(
        tx: &mut Transaction<'_, Postgres>,
        lesson_ids: &[String],
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE reallocation SET deleted_at = now(), updated_at = now() \
             WHERE original_lesson_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(lesson_ids)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Retract (not delete) edges whose placement is one of the given
    /// (deleted) lessons. Tail-only: an edge with a downstream link for the
    /// same student is left untouched.
    pub async fn cancel_reallocation_by_lesson_id(
        tx: &mut Transaction<'_, Postgres>,
        new_lesson_ids: &[String],
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE reallocation r SET new_lesson_id = NULL, updated_at = now() \
             WHERE r.new_lesson_id = ANY($1) AND r.deleted_at IS NULL \
               AND NOT EXISTS (\
                    SELECT 1 FROM reallocation d \
                    WHERE d.student_id = r.student_id \
                      AND d.original_lesson_id = r.new_lesson_id \
                      AND d.deleted_at IS NULL)",
        )
        .bind(new_lesson_ids)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    // =======================================================================
    // Reads
    // =======================================================================

    /// Transitive closure of reallocation for the given students, starting
    /// from edges rooted at `original_lesson_id` and following
    /// `new_lesson_id -> original_lesson_id` links. The recursion depth is
    /// bounded by the active edge count, so a corrupt cyclic edge set
    /// terminates instead of looping.
    pub async fn get_following(
        pool: &PgPool,
        original_lesson_id: &str,
        student_ids: &[String],
    ) -> RepoResult<Vec<ReallocationRow>> {
        if student_ids.is_empty() {
            return Err(RepoError::InconsistentInputShape(
                "get_following requires at least one student id".into(),
            ));
        }
        let rows = sqlx::query_as::<_, ReallocationRow>(
            "WITH RECURSIVE chain AS (\
                SELECT student_id, original_lesson_id, new_lesson_id, course_id, \
                       created_at, updated_at, 1 AS depth \
                FROM reallocation \
                WHERE original_lesson_id = $1 AND student_id = ANY($2) \
                  AND deleted_at IS NULL \
                UNION ALL \
                SELECT r.student_id, r.original_lesson_id, r.new_lesson_id, r.course_id, \
                       r.created_at, r.updated_at, c.depth + 1 \
                FROM reallocation r \
                JOIN chain c \
                  ON r.original_lesson_id = c.new_lesson_id \
                 AND r.student_id = c.student_id \
                WHERE r.deleted_at IS NULL \
                  AND c.depth <= (SELECT count(*) FROM reallocation WHERE deleted_at IS NULL)\
             ) \
             SELECT student_id, original_lesson_id, new_lesson_id, course_id, \
                    created_at, updated_at \
             FROM chain \
             ORDER BY student_id, depth",
        )
        .bind(original_lesson_id)
        .bind(student_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Point lookups for flat `(new_lesson_id, student_id)` pairs, used to
    /// decorate a roster with `reallocate_from` at read time.
    pub async fn get_by_new_lesson_id_and_student_id(
        pool: &PgPool,
        new_lesson_and_student_pairs: &[String],
    ) -> RepoResult<Vec<ReallocationRow>> {
        let (new_lesson_ids, student_ids) =
            split_pairs(new_lesson_and_student_pairs, "new lesson/student")?;
        let query = format!(
            "SELECT {COLUMNS} FROM reallocation \
             WHERE (new_lesson_id, student_id) IN \
                   (SELECT unnest($1::text[]), unnest($2::text[])) \
               AND deleted_at IS NULL"
        );
        let rows = sqlx::query_as::<_, ReallocationRow>(&query)
            .bind(&new_lesson_ids)
            .bind(&student_ids)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Active edges rooted at the given lessons (students displaced out of
    /// them).
    pub async fn get_reallocated_lesson(
        pool: &PgPool,
        original_lesson_ids: &[String],
    ) -> RepoResult<Vec<ReallocationRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM reallocation \
             WHERE original_lesson_id = ANY($1) AND deleted_at IS NULL \
             ORDER BY original_lesson_id, student_id"
        );
        let rows = sqlx::query_as::<_, ReallocationRow>(&query)
            .bind(original_lesson_ids)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Batch variant of [`Self::get_by_new_lesson_id`] for roster hydration
    /// across many lessons.
    pub async fn get_by_new_lesson_ids(
        pool: &PgPool,
        new_lesson_ids: &[String],
    ) -> RepoResult<Vec<ReallocationRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM reallocation \
             WHERE new_lesson_id = ANY($1) AND deleted_at IS NULL \
             ORDER BY new_lesson_id, student_id"
        );
        let rows = sqlx::query_as::<_, ReallocationRow>(&query)
            .bind(new_lesson_ids)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Active edges whose placement is the given lesson (students
    /// reallocated into it).
    pub async fn get_by_new_lesson_id(
        pool: &PgPool,
        new_lesson_id: &str,
    ) -> RepoResult<Vec<ReallocationRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM reallocation \
             WHERE new_lesson_id = $1 AND deleted_at IS NULL \
             ORDER BY student_id"
        );
        let rows = sqlx::query_as::<_, ReallocationRow>(&query)
            .bind(new_lesson_id)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}

/// Split a flat alternating pair list into its two columns, rejecting
/// odd-length input before any database call.
fn split_pairs(pairs: &[String], what: &str) -> RepoResult<(Vec<String>, Vec<String>)> {
    if pairs.len() % 2 != 0 {
        return Err(RepoError::InconsistentInputShape(format!(
            "{what} pair list has odd length {}",
            pairs.len()
        )));
    }
    let mut firsts = Vec::with_capacity(pairs.len() / 2);
    let mut seconds = Vec::with_capacity(pairs.len() / 2);
    for chunk in pairs.chunks_exact(2) {
        firsts.push(chunk[0].clone());
        seconds.push(chunk[1].clone());
    }
    Ok((firsts, seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn split_pairs_even() {
        let pairs = vec!["a".to_string(), "b".into(), "c".into(), "d".into()];
        let (firsts, seconds) = split_pairs(&pairs, "test").unwrap();
        assert_eq!(firsts, vec!["a", "c"]);
        assert_eq!(seconds, vec!["b", "d"]);
    }

    #[test]
    fn split_pairs_odd_rejected() {
        let pairs = vec!["a".to_string(), "b".into(), "c".into()];
        assert_matches!(
            split_pairs(&pairs, "test"),
            Err(RepoError::InconsistentInputShape(_))
        );
    }

    #[test]
    fn split_pairs_empty_ok() {
        let (firsts, seconds) = split_pairs(&[], "test").unwrap();
        assert!(firsts.is_empty());
        assert!(seconds.is_empty());
    }
}
