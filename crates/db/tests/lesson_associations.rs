//! Integration tests for the replace-in-place association writes: every
//! replacement soft-deletes the previous child set and reinserts, reviving
//! rows on primary-key conflict so the tables never accumulate duplicate
//! keys and repeated identical writes converge on the same state.

use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use lessonmgmt_core::lesson::{AttendStatus, LessonLearner};
use lessonmgmt_core::types::Timestamp;
use lessonmgmt_db::models::associations::LessonMemberRow;
use lessonmgmt_db::repositories::{LessonClassroomRepo, LessonMemberRepo, LessonTeacherRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ts(hour: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
}

async fn seed_lesson(pool: &PgPool, lesson_id: &str) {
    sqlx::query(
        "INSERT INTO lessons (lesson_id, start_time, end_time, location_id) \
         VALUES ($1, $2, $3, 'loc-1')",
    )
    .bind(lesson_id)
    .bind(ts(9))
    .bind(ts(10))
    .execute(pool)
    .await
    .unwrap();
}

async fn replace_teachers(pool: &PgPool, lesson_id: &str, teacher_ids: &[&str]) {
    let ids = [lesson_id.to_string()];
    let teachers: Vec<String> = teacher_ids.iter().map(|t| t.to_string()).collect();
    let mut tx = pool.begin().await.unwrap();
    LessonTeacherRepo::replace_for_lessons(&mut tx, &ids, &teachers)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

async fn replace_roster(pool: &PgPool, lesson_id: &str, members: &[LessonMemberRow]) {
    let mut tx = pool.begin().await.unwrap();
    LessonMemberRepo::replace_roster(&mut tx, lesson_id, members)
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

fn member(lesson_id: &str, user_id: &str, course_id: &str, status: AttendStatus) -> LessonMemberRow {
    LessonMemberRow::from_learner(
        lesson_id,
        &LessonLearner {
            learner_id: user_id.to_string(),
            course_id: course_id.to_string(),
            attend_status: status,
            ..LessonLearner::default()
        },
    )
}

async fn physical_rows(pool: &PgPool, table: &str, lesson_id: &str) -> i64 {
    let count: (i64,) =
        sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE lesson_id = $1"))
            .bind(lesson_id)
            .fetch_one(pool)
            .await
            .unwrap();
    count.0
}

// ---------------------------------------------------------------------------
// Test: Teacher set replacement yields exactly the new set
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_teacher_set_replaced(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;

    replace_teachers(&pool, "lesson-1", &["t1", "t2"]).await;
    let active = LessonTeacherRepo::get_teacher_ids_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(active, vec!["t1", "t2"]);

    replace_teachers(&pool, "lesson-1", &["t2", "t3"]).await;
    let active = LessonTeacherRepo::get_teacher_ids_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(active, vec!["t2", "t3"], "t1 should be gone, t3 added");
}

// ---------------------------------------------------------------------------
// Test: Reads preserve the caller's ordering
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_teacher_order_follows_write_order(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;

    // Main teacher first, regardless of how the IDs sort.
    replace_teachers(&pool, "lesson-1", &["t9", "t1", "t5"]).await;
    let active = LessonTeacherRepo::get_teacher_ids_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(active, vec!["t9", "t1", "t5"]);

    // Reordering the same set in a later write sticks.
    replace_teachers(&pool, "lesson-1", &["t1", "t9", "t5"]).await;
    let active = LessonTeacherRepo::get_teacher_ids_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(active, vec!["t1", "t9", "t5"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_roster_order_follows_write_order(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;

    replace_roster(
        &pool,
        "lesson-1",
        &[
            member("lesson-1", "s9", "c1", AttendStatus::Empty),
            member("lesson-1", "s1", "c1", AttendStatus::Empty),
        ],
    )
    .await;

    let roster = LessonMemberRepo::get_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    let users: Vec<&str> = roster.iter().map(|m| m.user_id.as_str()).collect();
    assert_eq!(users, vec!["s9", "s1"]);
}

// ---------------------------------------------------------------------------
// Test: Reapplying an identical set is idempotent
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_identical_replacement_idempotent(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;

    replace_teachers(&pool, "lesson-1", &["t1", "t2"]).await;
    replace_teachers(&pool, "lesson-1", &["t1", "t2"]).await;
    replace_teachers(&pool, "lesson-1", &["t1", "t2"]).await;

    let active = LessonTeacherRepo::get_teacher_ids_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(active, vec!["t1", "t2"]);
    assert_eq!(
        physical_rows(&pool, "lesson_teachers", "lesson-1").await,
        2,
        "repeated identical writes must not grow the table"
    );
}

// ---------------------------------------------------------------------------
// Test: A removed then re-added teacher revives the same row
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_removed_teacher_revived_on_readd(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;

    replace_teachers(&pool, "lesson-1", &["t1"]).await;
    replace_teachers(&pool, "lesson-1", &["t2"]).await;
    replace_teachers(&pool, "lesson-1", &["t1", "t2"]).await;

    let active = LessonTeacherRepo::get_teacher_ids_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(active, vec!["t1", "t2"]);
    assert_eq!(
        physical_rows(&pool, "lesson_teachers", "lesson-1").await,
        2,
        "re-adding t1 should revive its soft-deleted row, not duplicate it"
    );
}

// ---------------------------------------------------------------------------
// Test: Classrooms follow the same replacement discipline
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_classroom_set_replaced(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;
    let ids = ["lesson-1".to_string()];

    let mut tx = pool.begin().await.unwrap();
    LessonClassroomRepo::replace_for_lessons(&mut tx, &ids, &["r1".into(), "r2".into()])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    LessonClassroomRepo::replace_for_lessons(&mut tx, &ids, &["r2".into()])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let active = LessonClassroomRepo::get_classroom_ids_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(active, vec!["r2"]);
    assert_eq!(physical_rows(&pool, "lesson_classrooms", "lesson-1").await, 2);
}

// ---------------------------------------------------------------------------
// Test: Roster replacement updates attendance in place
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_roster_attendance_updated_in_place(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;

    replace_roster(
        &pool,
        "lesson-1",
        &[
            member("lesson-1", "s1", "c1", AttendStatus::Empty),
            member("lesson-1", "s2", "c1", AttendStatus::Empty),
        ],
    )
    .await;

    replace_roster(
        &pool,
        "lesson-1",
        &[
            member("lesson-1", "s1", "c1", AttendStatus::Attend),
            member("lesson-1", "s2", "c1", AttendStatus::Absent),
        ],
    )
    .await;

    let roster = LessonMemberRepo::get_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].attendance_status, AttendStatus::Attend.as_str());
    assert_eq!(roster[1].attendance_status, AttendStatus::Absent.as_str());
    assert_eq!(physical_rows(&pool, "lesson_members", "lesson-1").await, 2);
}

// ---------------------------------------------------------------------------
// Test: A re-added learner may come back under a different course
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_readded_learner_takes_new_course(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;

    replace_roster(
        &pool,
        "lesson-1",
        &[member("lesson-1", "s1", "c1", AttendStatus::Empty)],
    )
    .await;
    replace_roster(&pool, "lesson-1", &[]).await;
    replace_roster(
        &pool,
        "lesson-1",
        &[member("lesson-1", "s1", "c2", AttendStatus::Empty)],
    )
    .await;

    let roster = LessonMemberRepo::get_by_lesson_id(&pool, "lesson-1")
        .await
        .unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].course_id.as_deref(), Some("c2"));
    assert_eq!(physical_rows(&pool, "lesson_members", "lesson-1").await, 1);
}

// ---------------------------------------------------------------------------
// Test: Replacement is scoped to the given lessons only
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_replacement_scoped_to_lessons(pool: PgPool) {
    seed_lesson(&pool, "lesson-1").await;
    seed_lesson(&pool, "lesson-2").await;

    replace_teachers(&pool, "lesson-1", &["t1"]).await;
    replace_teachers(&pool, "lesson-2", &["t9"]).await;
    replace_teachers(&pool, "lesson-1", &["t2"]).await;

    let other = LessonTeacherRepo::get_teacher_ids_by_lesson_id(&pool, "lesson-2")
        .await
        .unwrap();
    assert_eq!(other, vec!["t9"], "lesson-2's teachers must be untouched");
}
