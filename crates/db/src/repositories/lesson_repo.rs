//! Repository for the `lessons` table, plus the recurrence coordinator that
//! realizes a whole batch of occurrences as one transaction.
//!
//! Write ordering inside a recurrence upsert is fixed: lesson groups ->
//! lesson rows -> teacher set -> classroom set -> per-occurrence rosters and
//! course index -> reallocation edges. Later steps reference IDs produced or
//! reused by earlier ones.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use lessonmgmt_core::lesson::{
    Lesson, LessonClassroom, LessonTeacher, RecurringLesson, SchedulingStatus,
};
use lessonmgmt_core::scheduling::TransitionPolicy;

use crate::error::{RepoError, RepoResult};
use crate::models::associations::LessonMemberRow;
use crate::models::lesson::LessonRow;
use crate::repositories::{
    soft_delete_children, LessonClassroomRepo, LessonGroupRepo, LessonMemberRepo,
    LessonTeacherRepo, ReallocationRepo,
};

const COLUMNS: &str = "\
    lesson_id, name, start_time, end_time, teaching_medium, teaching_method, \
    scheduling_status, location_id, course_id, class_id, scheduler_id, \
    lesson_group_id, status, lesson_type, is_locked, preparation_time, \
    break_time, zoom_link, zoom_id, zoom_owner_id, zoom_occurrence_id, \
    classdo_link, classdo_owner_id, classdo_room_id, created_at, updated_at";

pub struct LessonRepo;

impl LessonRepo {
    // =======================================================================
    // Reads
    // =======================================================================

    /// Fetch one lesson with its teachers, classrooms, roster (names and
    /// reallocation back-references included) and material list.
    pub async fn get_by_id(pool: &PgPool, lesson_id: &str) -> RepoResult<Lesson> {
        let row = Self::find_row(pool, lesson_id).await?;
        let Some(row) = row else {
            return Err(RepoError::NotFound {
                entity: "lesson",
                id: lesson_id.to_string(),
            });
        };
        let mut lessons = Self::hydrate(pool, vec![row]).await?;
        // hydrate() preserves row count.
        lessons.pop().ok_or(RepoError::NotFound {
            entity: "lesson",
            id: lesson_id.to_string(),
        })
    }

    /// Fetch a set of lessons by ID, hydrated. Missing IDs are absent from
    /// the result rather than an error.
    pub async fn get_by_ids(pool: &PgPool, lesson_ids: &[String]) -> RepoResult<Vec<Lesson>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lessons \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL \
             ORDER BY start_time, end_time, lesson_id"
        );
        let rows = sqlx::query_as::<_, LessonRow>(&query)
            .bind(lesson_ids)
            .fetch_all(pool)
            .await?;
        Self::hydrate(pool, rows).await
    }

    /// All active occurrences of one recurrence, hydrated, in start order.
    pub async fn get_by_scheduler_id(
        pool: &PgPool,
        scheduler_id: &str,
    ) -> RepoResult<Vec<Lesson>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lessons \
             WHERE scheduler_id = $1 AND deleted_at IS NULL \
             ORDER BY start_time, end_time, lesson_id"
        );
        let rows = sqlx::query_as::<_, LessonRow>(&query)
            .bind(scheduler_id)
            .fetch_all(pool)
            .await?;
        Self::hydrate(pool, rows).await
    }

    /// IDs of all not-yet-locked occurrences on the same scheduler as
    /// `lesson_id` starting at or after it. Locked occurrences are excluded
    /// so recurrence-wide edits skip lessons that already took place.
    pub async fn get_future_recurring_lesson_ids(
        pool: &PgPool,
        lesson_id: &str,
    ) -> RepoResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT lesson_id FROM lessons \
             WHERE scheduler_id IS NOT NULL \
               AND scheduler_id = (SELECT scheduler_id FROM lessons WHERE lesson_id = $1) \
               AND start_time >= (SELECT start_time FROM lessons WHERE lesson_id = $1) \
               AND is_locked = FALSE \
               AND deleted_at IS NULL \
             ORDER BY start_time, end_time, lesson_id",
        )
        .bind(lesson_id)
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// Scheduler-repair scan: active lessons missing a scheduler ID.
    pub async fn get_lessons_with_null_scheduler(
        pool: &PgPool,
        limit: i64,
    ) -> RepoResult<Vec<LessonRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lessons \
             WHERE scheduler_id IS NULL AND deleted_at IS NULL \
             ORDER BY created_at, lesson_id \
             LIMIT $1"
        );
        let rows = sqlx::query_as::<_, LessonRow>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    // =======================================================================
    // Single-occurrence writes
    // =======================================================================

    /// Insert one lesson with its associations; the single-occurrence
    /// specialization of [`Self::upsert_lessons`]. Returns the realized
    /// lesson ID (minted when the input left it empty).
    pub async fn insert_lesson(pool: &PgPool, lesson: &Lesson) -> RepoResult<String> {
        let mut row = LessonRow::from_entity(lesson)?;
        let mut tx = pool.begin().await?;

        if let Some(course_id) = row.course_id.clone() {
            let group_id = row
                .lesson_group_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            LessonGroupRepo::upsert(&mut tx, &group_id, &course_id, &lesson.material_ids).await?;
            row.lesson_group_id = Some(group_id);
        }

        let query = format!(
            "INSERT INTO lessons ({COLUMNS}) VALUES \
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                 $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, now(), now())"
        );
        Self::bind_row(sqlx::query(&query), &row)
            .execute(&mut *tx)
            .await?;

        Self::write_associations(&mut tx, lesson, &row).await?;
        tx.commit().await?;

        debug!(lesson_id = %row.lesson_id, "inserted lesson");
        Ok(row.lesson_id)
    }

    /// Full-field replace of one lesson and its associations. Reads the
    /// current row first: if the course is unchanged the existing lesson
    /// group keeps its ID and gets its media updated in place; a changed
    /// course gets a fresh group, leaving the old one untouched for history.
    pub async fn update_lesson(pool: &PgPool, lesson: &Lesson) -> RepoResult<String> {
        if lesson.lesson_id.is_empty() {
            return Err(RepoError::InconsistentInputShape(
                "update_lesson requires a lesson_id".into(),
            ));
        }
        let current = Self::find_row(pool, &lesson.lesson_id).await?;
        let Some(current) = current else {
            return Err(RepoError::NotFound {
                entity: "lesson",
                id: lesson.lesson_id.clone(),
            });
        };

        let mut row = LessonRow::from_entity(lesson)?;
        let mut tx = pool.begin().await?;

        if let Some(course_id) = row.course_id.clone() {
            let same_course = current.course_id.as_deref() == Some(course_id.as_str());
            match (same_course, current.lesson_group_id.clone()) {
                (true, Some(group_id)) => {
                    LessonGroupRepo::update_media(&mut tx, &group_id, &course_id, &lesson.material_ids)
                        .await?;
                    row.lesson_group_id = Some(group_id);
                }
                _ => {
                    let group_id = Uuid::new_v4().to_string();
                    LessonGroupRepo::upsert(&mut tx, &group_id, &course_id, &lesson.material_ids)
                        .await?;
                    row.lesson_group_id = Some(group_id);
                }
            }
        } else {
            row.lesson_group_id = current.lesson_group_id.clone();
        }

        let result = Self::bind_row(sqlx::query(UPDATE_LESSON_SQL), &row)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound {
                entity: "lesson",
                id: lesson.lesson_id.clone(),
            });
        }

        Self::write_associations(&mut tx, lesson, &row).await?;
        tx.commit().await?;

        debug!(lesson_id = %row.lesson_id, "updated lesson");
        Ok(row.lesson_id)
    }

    // =======================================================================
    // Recurrence coordinator
    // =======================================================================

    /// Upsert a whole recurrence as one transaction: all occurrences, the
    /// shared teacher/classroom sets from the base lesson, per-occurrence
    /// rosters and course index, and the reallocation edges implied by the
    /// base lesson's roster. Returns the realized lesson IDs; any failure
    /// rolls the entire batch back.
    pub async fn upsert_lessons(
        pool: &PgPool,
        recurring: &RecurringLesson,
    ) -> RepoResult<Vec<String>> {
        recurring.validate()?;
        let base = recurring
            .base_lesson()
            .ok_or_else(|| RepoError::InconsistentInputShape("empty recurrence batch".into()))?;

        // Build all rows up front, reusing one group ID per course across
        // the batch. Each group's media come from the first occurrence that
        // carries the course.
        let mut groups: HashMap<String, (String, Vec<String>)> = HashMap::new();
        let mut rows = Vec::with_capacity(recurring.lessons.len());
        for lesson in &recurring.lessons {
            let mut row = LessonRow::from_entity(lesson)?;
            if let Some(course_id) = row.course_id.clone() {
                let (group_id, _) = groups.entry(course_id).or_insert_with(|| {
                    let group_id = row
                        .lesson_group_id
                        .clone()
                        .unwrap_or_else(|| Uuid::new_v4().to_string());
                    (group_id, lesson.material_ids.clone())
                });
                row.lesson_group_id = Some(group_id.clone());
            }
            rows.push(row);
        }

        let mut tx = pool.begin().await?;

        for (course_id, (group_id, media_ids)) in &groups {
            LessonGroupRepo::upsert(&mut tx, group_id, course_id, media_ids).await?;
        }

        // Batch-upsert lesson rows; any statement that does not land exactly
        // one row fails the whole batch with its index.
        for (index, row) in rows.iter().enumerate() {
            let result = Self::bind_row(sqlx::query(UPSERT_LESSON_SQL), row)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() != 1 {
                return Err(RepoError::PartialBatchFailure {
                    index,
                    affected: result.rows_affected(),
                    expected: 1,
                });
            }
        }

        let ids: Vec<String> = rows.iter().map(|r| r.lesson_id.clone()).collect();

        // The base lesson's teacher and classroom sets apply to every
        // occurrence of the recurrence.
        LessonTeacherRepo::replace_for_lessons(&mut tx, &ids, &base.teacher_ids()).await?;
        LessonClassroomRepo::replace_for_lessons(&mut tx, &ids, &base.classroom_ids()).await?;

        // Rosters are per occurrence.
        for (lesson, row) in recurring.lessons.iter().zip(&rows) {
            let members: Vec<LessonMemberRow> = lesson
                .learners
                .iter()
                .map(|l| LessonMemberRow::from_learner(&row.lesson_id, l))
                .collect();
            LessonMemberRepo::replace_roster(&mut tx, &row.lesson_id, &members).await?;
            Self::register_courses(&mut tx, &row.lesson_id, &lesson.course_ids()).await?;
        }

        // Reallocation edges derive from the base lesson's roster, using the
        // realized (possibly minted) base lesson ID.
        let mut base_realized = base.clone();
        base_realized.lesson_id = ids[0].clone();
        ReallocationRepo::upsert(&mut tx, &base_realized.reallocation_edges()).await?;

        tx.commit().await?;

        debug!(count = ids.len(), "upserted recurring lessons");
        Ok(ids)
    }

    // =======================================================================
    // Batched field updates
    // =======================================================================

    /// Batched status update. Every requested transition is validated
    /// against `policy` before any statement executes; the write itself
    /// fails whole on the first statement that misses its target row.
    pub async fn update_scheduling_status(
        pool: &PgPool,
        updates: &[(String, SchedulingStatus)],
        policy: &TransitionPolicy,
    ) -> RepoResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = updates.iter().map(|(id, _)| id.clone()).collect();
        let current: Vec<(String, String)> = sqlx::query_as(
            "SELECT lesson_id, scheduling_status FROM lessons \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(&ids)
        .fetch_all(pool)
        .await?;
        let current: HashMap<String, String> = current.into_iter().collect();

        for (lesson_id, to) in updates {
            let Some(from) = current.get(lesson_id) else {
                return Err(RepoError::NotFound {
                    entity: "lesson",
                    id: lesson_id.clone(),
                });
            };
            let from = SchedulingStatus::parse(from).map_err(RepoError::Core)?;
            policy.validate_transition(from, *to).map_err(RepoError::Core)?;
        }

        let mut tx = pool.begin().await?;
        for (index, (lesson_id, to)) in updates.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE lessons SET scheduling_status = $2, updated_at = now() \
                 WHERE lesson_id = $1 AND deleted_at IS NULL",
            )
            .bind(lesson_id)
            .bind(to.as_str())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() != 1 {
                return Err(RepoError::PartialBatchFailure {
                    index,
                    affected: result.rows_affected(),
                    expected: 1,
                });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Point every given lesson at `scheduler_id`.
    pub async fn update_scheduler_id(
        pool: &PgPool,
        lesson_ids: &[String],
        scheduler_id: &str,
    ) -> RepoResult<()> {
        let mut tx = pool.begin().await?;
        for (index, lesson_id) in lesson_ids.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE lessons SET scheduler_id = $2, updated_at = now() \
                 WHERE lesson_id = $1 AND deleted_at IS NULL",
            )
            .bind(lesson_id)
            .bind(scheduler_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() != 1 {
                return Err(RepoError::PartialBatchFailure {
                    index,
                    affected: result.rows_affected(),
                    expected: 1,
                });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Repair backfill: assign scheduler IDs to lessons that have none.
    /// Lessons that already carry a scheduler are skipped, not failed.
    /// Returns how many rows were filled.
    pub async fn fill_scheduler_to_lessons(
        pool: &PgPool,
        assignments: &[(String, String)],
    ) -> RepoResult<u64> {
        let mut tx = pool.begin().await?;
        let mut filled = 0u64;
        for (lesson_id, scheduler_id) in assignments {
            let result = sqlx::query(
                "UPDATE lessons SET scheduler_id = $2, updated_at = now() \
                 WHERE lesson_id = $1 AND scheduler_id IS NULL AND deleted_at IS NULL",
            )
            .bind(lesson_id)
            .bind(scheduler_id)
            .execute(&mut *tx)
            .await?;
            filled += result.rows_affected();
        }
        tx.commit().await?;
        Ok(filled)
    }

    /// Mark lessons immutable to bulk recurrence edits.
    pub async fn lock_lessons(pool: &PgPool, lesson_ids: &[String]) -> RepoResult<()> {
        let mut tx = pool.begin().await?;
        for (index, lesson_id) in lesson_ids.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE lessons SET is_locked = TRUE, updated_at = now() \
                 WHERE lesson_id = $1 AND deleted_at IS NULL",
            )
            .bind(lesson_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() != 1 {
                return Err(RepoError::PartialBatchFailure {
                    index,
                    affected: result.rows_affected(),
                    expected: 1,
                });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Batched update of preparation/break minutes only.
    pub async fn update_teaching_time(
        pool: &PgPool,
        updates: &[(String, i32, i32)],
    ) -> RepoResult<()> {
        let mut tx = pool.begin().await?;
        for (index, (lesson_id, preparation_time, break_time)) in updates.iter().enumerate() {
            let result = sqlx::query(
                "UPDATE lessons \
                 SET preparation_time = $2, break_time = $3, updated_at = now() \
                 WHERE lesson_id = $1 AND deleted_at IS NULL",
            )
            .bind(lesson_id)
            .bind(preparation_time)
            .bind(break_time)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() != 1 {
                return Err(RepoError::PartialBatchFailure {
                    index,
                    affected: result.rows_affected(),
                    expected: 1,
                });
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Clear Zoom bindings in bulk (the external meetings were torn down).
    pub async fn remove_zoom_links(pool: &PgPool, lesson_ids: &[String]) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE lessons \
             SET zoom_link = NULL, zoom_id = NULL, zoom_owner_id = NULL, \
                 zoom_occurrence_id = NULL, updated_at = now() \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(lesson_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clear ClassDo bindings in bulk.
    pub async fn remove_classdo_links(pool: &PgPool, lesson_ids: &[String]) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE lessons \
             SET classdo_link = NULL, classdo_owner_id = NULL, classdo_room_id = NULL, \
                 updated_at = now() \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(lesson_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Batched soft-delete. Also removes reallocation edges rooted at the
    /// deleted lessons and retracts edges pointing at them; rooted edges go
    /// first so the tail-only retraction rule cannot block cleanup.
    pub async fn delete(pool: &PgPool, lesson_ids: &[String]) -> RepoResult<u64> {
        let mut tx = pool.begin().await?;
        let result = sqlx::query(
            "UPDATE lessons SET deleted_at = now(), updated_at = now() \
             WHERE lesson_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(lesson_ids)
        .execute(&mut *tx)
        .await?;
        ReallocationRepo::delete_by_original_lesson_id(&mut tx, lesson_ids).await?;
        ReallocationRepo::cancel_reallocation_by_lesson_id(&mut tx, lesson_ids).await?;
        tx.commit().await?;

        debug!(deleted = result.rows_affected(), "soft-deleted lessons");
        Ok(result.rows_affected())
    }

    // =======================================================================
    // Internals
    // =======================================================================

    async fn find_row(pool: &PgPool, lesson_id: &str) -> RepoResult<Option<LessonRow>> {
        let query = format!(
            "SELECT {COLUMNS} FROM lessons WHERE lesson_id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, LessonRow>(&query)
            .bind(lesson_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// Bind the 24 writable columns of a lesson row in `COLUMNS` order.
    fn bind_row<'q>(
        query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
        row: &'q LessonRow,
    ) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
        query
            .bind(&row.lesson_id)
            .bind(&row.name)
            .bind(row.start_time)
            .bind(row.end_time)
            .bind(&row.teaching_medium)
            .bind(&row.teaching_method)
            .bind(&row.scheduling_status)
            .bind(&row.location_id)
            .bind(&row.course_id)
            .bind(&row.class_id)
            .bind(&row.scheduler_id)
            .bind(&row.lesson_group_id)
            .bind(&row.status)
            .bind(&row.lesson_type)
            .bind(row.is_locked)
            .bind(row.preparation_time)
            .bind(row.break_time)
            .bind(&row.zoom_link)
            .bind(&row.zoom_id)
            .bind(&row.zoom_owner_id)
            .bind(&row.zoom_occurrence_id)
            .bind(&row.classdo_link)
            .bind(&row.classdo_owner_id)
            .bind(&row.classdo_room_id)
    }

    /// Replace teachers, classrooms, roster, course index and reallocation
    /// edges for one lesson (single-occurrence write path).
    async fn write_associations(
        tx: &mut Transaction<'_, Postgres>,
        lesson: &Lesson,
        row: &LessonRow,
    ) -> RepoResult<()> {
        let ids = [row.lesson_id.clone()];
        LessonTeacherRepo::replace_for_lessons(tx, &ids, &lesson.teacher_ids()).await?;
        LessonClassroomRepo::replace_for_lessons(tx, &ids, &lesson.classroom_ids()).await?;

        let members: Vec<LessonMemberRow> = lesson
            .learners
            .iter()
            .map(|l| LessonMemberRow::from_learner(&row.lesson_id, l))
            .collect();
        LessonMemberRepo::replace_roster(tx, &row.lesson_id, &members).await?;
        Self::register_courses(tx, &row.lesson_id, &lesson.course_ids()).await?;

        let mut realized = lesson.clone();
        realized.lesson_id = row.lesson_id.clone();
        ReallocationRepo::upsert(tx, &realized.reallocation_edges()).await?;
        Ok(())
    }

    /// Replace the course-index rows for one lesson.
    async fn register_courses(
        tx: &mut Transaction<'_, Postgres>,
        lesson_id: &str,
        course_ids: &[String],
    ) -> RepoResult<()> {
        let ids = [lesson_id.to_string()];
        soft_delete_children(tx, "lessons_courses", &ids).await?;
        for course_id in course_ids {
            sqlx::query(
                "INSERT INTO lessons_courses (lesson_id, course_id) \
                 VALUES ($1, $2) \
                 ON CONFLICT (lesson_id, course_id) \
                 DO UPDATE SET deleted_at = NULL, updated_at = now()",
            )
            .bind(lesson_id)
            .bind(course_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Attach associations, names, reallocation back-references and material
    /// lists to a set of lesson rows.
    async fn hydrate(pool: &PgPool, rows: Vec<LessonRow>) -> RepoResult<Vec<Lesson>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.lesson_id.clone()).collect();

        let teacher_rows =
            LessonTeacherRepo::get_teachers_with_names_by_lesson_ids(pool, &ids).await?;
        let classroom_rows = LessonClassroomRepo::get_by_lesson_ids(pool, &ids).await?;
        let member_rows =
            LessonMemberRepo::get_learners_with_names_by_lesson_ids(pool, &ids).await?;
        let realloc_rows = ReallocationRepo::get_by_new_lesson_ids(pool, &ids).await?;

        let group_keys: Vec<(String, String)> = rows
            .iter()
            .filter_map(|r| match (&r.lesson_group_id, &r.course_id) {
                (Some(g), Some(c)) => Some((g.clone(), c.clone())),
                _ => None,
            })
            .collect();
        let group_rows = if group_keys.is_empty() {
            Vec::new()
        } else {
            LessonGroupRepo::find_by_keys(pool, &group_keys).await?
        };
        let media: HashMap<(String, String), Vec<String>> = group_rows
            .into_iter()
            .map(|g| ((g.lesson_group_id, g.course_id), g.media_ids))
            .collect();

        // (new_lesson_id, student_id) -> original_lesson_id
        let mut realloc_from: HashMap<(String, String), String> = HashMap::new();
        for r in realloc_rows {
            if let Some(new_id) = r.new_lesson_id {
                realloc_from.insert((new_id, r.student_id), r.original_lesson_id);
            }
        }

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            let lesson_id = row.lesson_id.clone();
            let group_key = match (&row.lesson_group_id, &row.course_id) {
                (Some(g), Some(c)) => Some((g.clone(), c.clone())),
                _ => None,
            };
            let mut lesson = row.into_entity().map_err(RepoError::Core)?;

            lesson.teachers = teacher_rows
                .iter()
                .filter(|t| t.lesson_id == lesson_id)
                .map(|t| LessonTeacher {
                    teacher_id: t.teacher_id.clone(),
                    name: t.name.clone(),
                })
                .collect();
            lesson.classrooms = classroom_rows
                .iter()
                .filter(|c| c.lesson_id == lesson_id)
                .map(|c| LessonClassroom {
                    classroom_id: c.classroom_id.clone(),
                })
                .collect();

            let mut learners = Vec::new();
            for m in member_rows.iter().filter(|m| m.lesson_id == lesson_id) {
                let mut learner = LessonMemberRow {
                    lesson_id: m.lesson_id.clone(),
                    user_id: m.user_id.clone(),
                    course_id: m.course_id.clone(),
                    attendance_status: m.attendance_status.clone(),
                    attendance_notice: m.attendance_notice.clone(),
                    attendance_reason: m.attendance_reason.clone(),
                    attendance_note: m.attendance_note.clone(),
                }
                .into_learner()
                .map_err(RepoError::Core)?;
                learner.name = m.name.clone();
                learner.reallocate_from = realloc_from
                    .get(&(lesson_id.clone(), learner.learner_id.clone()))
                    .cloned();
                learners.push(learner);
            }
            lesson.learners = learners;

            if let Some(key) = group_key {
                if let Some(media_ids) = media.get(&key) {
                    lesson.material_ids = media_ids.clone();
                }
            }
            lessons.push(lesson);
        }
        Ok(lessons)
    }
}

const UPSERT_LESSON_SQL: &str = "\
    INSERT INTO lessons \
        (lesson_id, name, start_time, end_time, teaching_medium, teaching_method, \
         scheduling_status, location_id, course_id, class_id, scheduler_id, \
         lesson_group_id, status, lesson_type, is_locked, preparation_time, \
         break_time, zoom_link, zoom_id, zoom_owner_id, zoom_occurrence_id, \
         classdo_link, classdo_owner_id, classdo_room_id) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
            $16, $17, $18, $19, $20, $21, $22, $23, $24) \
    ON CONFLICT (lesson_id) DO UPDATE SET \
        name = EXCLUDED.name, \
        start_time = EXCLUDED.start_time, \
        end_time = EXCLUDED.end_time, \
        teaching_medium = EXCLUDED.teaching_medium, \
        teaching_method = EXCLUDED.teaching_method, \
        scheduling_status = EXCLUDED.scheduling_status, \
        location_id = EXCLUDED.location_id, \
        course_id = EXCLUDED.course_id, \
        class_id = EXCLUDED.class_id, \
        scheduler_id = EXCLUDED.scheduler_id, \
        lesson_group_id = EXCLUDED.lesson_group_id, \
        status = EXCLUDED.status, \
        lesson_type = EXCLUDED.lesson_type, \
        is_locked = EXCLUDED.is_locked, \
        preparation_time = EXCLUDED.preparation_time, \
        break_time = EXCLUDED.break_time, \
        zoom_link = EXCLUDED.zoom_link, \
        zoom_id = EXCLUDED.zoom_id, \
        zoom_owner_id = EXCLUDED.zoom_owner_id, \
        zoom_occurrence_id = EXCLUDED.zoom_occurrence_id, \
        classdo_link = EXCLUDED.classdo_link, \
        classdo_owner_id = EXCLUDED.classdo_owner_id, \
        classdo_room_id = EXCLUDED.classdo_room_id, \
        deleted_at = NULL, \
        updated_at = now()";

const UPDATE_LESSON_SQL: &str = "\
    UPDATE lessons SET \
        name = $2, \
        start_time = $3, \
        end_time = $4, \
        teaching_medium = $5, \
        teaching_method = $6, \
        scheduling_status = $7, \
        location_id = $8, \
        course_id = $9, \
        class_id = $10, \
        scheduler_id = $11, \
        lesson_group_id = $12, \
        status = $13, \
        lesson_type = $14, \
        is_locked = $15, \
        preparation_time = $16, \
        break_time = $17, \
        zoom_link = $18, \
        zoom_id = $19, \
        zoom_owner_id = $20, \
        zoom_occurrence_id = $21, \
        classdo_link = $22, \
        classdo_owner_id = $23, \
        classdo_room_id = $24, \
        updated_at = now() \
    WHERE lesson_id = $1 AND deleted_at IS NULL";
