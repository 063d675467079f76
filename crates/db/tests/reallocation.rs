//! Integration tests for the reallocation tracker:
//! - Edge derivation from roster writes (REALLOCATE, then placement)
//! - Transitive chain resolution
//! - Tail-only retraction
//! - Retraction guards on bulk soft delete
//! - Cleanup ordering when lessons are deleted

use chrono::{TimeZone, Utc};
use sqlx::PgPool;

use assert_matches::assert_matches;
use lessonmgmt_core::lesson::{
    AttendStatus, Lesson, LessonLearner, ReallocationEdge, TeachingMedium, TeachingMethod,
};
use lessonmgmt_core::types::Timestamp;
use lessonmgmt_db::error::RepoError;
use lessonmgmt_db::repositories::{LessonRepo, ReallocationRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ts(day: u32, hour: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
}

fn new_lesson(id: &str, day: u32) -> Lesson {
    Lesson {
        lesson_id: id.to_string(),
        name: format!("Lesson {id}"),
        start_time: Some(ts(day, 9)),
        end_time: Some(ts(day, 10)),
        teaching_medium: Some(TeachingMedium::Offline),
        teaching_method: Some(TeachingMethod::Individual),
        location_id: "loc-1".into(),
        preparation_time: -1,
        break_time: -1,
        ..Lesson::default()
    }
}

fn edge(student: &str, original: &str, new: Option<&str>) -> ReallocationEdge {
    ReallocationEdge {
        student_id: student.to_string(),
        course_id: "course-1".to_string(),
        original_lesson_id: original.to_string(),
        new_lesson_id: new.map(str::to_string),
    }
}

async fn upsert_edges(pool: &PgPool, edges: &[ReallocationEdge]) {
    let mut tx = pool.begin().await.unwrap();
    ReallocationRepo::upsert(&mut tx, edges).await.unwrap();
    tx.commit().await.unwrap();
}

// ---------------------------------------------------------------------------
// Test: REALLOCATE status then placement write wires a full edge
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_reallocate_then_placement(pool: PgPool) {
    // s1 is displaced out of L1: dangling edge.
    let mut l1 = new_lesson("L1", 1);
    l1.learners = vec![LessonLearner {
        learner_id: "s1".into(),
        course_id: "course-1".into(),
        attend_status: AttendStatus::Reallocate,
        ..LessonLearner::default()
    }];
    LessonRepo::insert_lesson(&pool, &l1).await.unwrap();

    let rooted = ReallocationRepo::get_reallocated_lesson(&pool, &["L1".into()])
        .await
        .unwrap();
    assert_eq!(rooted.len(), 1);
    assert_eq!(rooted[0].new_lesson_id, None, "no placement yet");

    // s1 lands in L2: the same edge gains its placement.
    let mut l2 = new_lesson("L2", 2);
    l2.learners = vec![LessonLearner {
        learner_id: "s1".into(),
        course_id: "course-1".into(),
        attend_status: AttendStatus::Attend,
        reallocate_from: Some("L1".into()),
        ..LessonLearner::default()
    }];
    LessonRepo::insert_lesson(&pool, &l2).await.unwrap();

    let rooted = ReallocationRepo::get_reallocated_lesson(&pool, &["L1".into()])
        .await
        .unwrap();
    assert_eq!(rooted.len(), 1, "placement must update the edge, not add one");
    assert_eq!(rooted[0].new_lesson_id.as_deref(), Some("L2"));

    // The hydrated L2 roster carries the back-reference.
    let got = LessonRepo::get_by_id(&pool, "L2").await.unwrap();
    assert_eq!(got.learners[0].reallocate_from.as_deref(), Some("L1"));
}

// ---------------------------------------------------------------------------
// Test: Transitive chain resolution
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_chain_followed_transitively(pool: PgPool) {
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s1", "B", Some("C"))],
    )
    .await;

    let chain = ReallocationRepo::get_following(&pool, "A", &["s1".into()])
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].original_lesson_id, "A");
    assert_eq!(chain[0].new_lesson_id.as_deref(), Some("B"));
    assert_eq!(chain[1].original_lesson_id, "B");
    assert_eq!(chain[1].new_lesson_id.as_deref(), Some("C"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unplaced_edge_is_a_chain_of_one(pool: PgPool) {
    // Displaced but not yet placed anywhere: A -> null.
    upsert_edges(&pool, &[edge("s1", "A", None)]).await;

    let chain = ReallocationRepo::get_following(&pool, "A", &["s1".into()])
        .await
        .unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].original_lesson_id, "A");
    assert_eq!(chain[0].new_lesson_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_chain_scoped_to_requested_students(pool: PgPool) {
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s2", "A", Some("D"))],
    )
    .await;

    let chain = ReallocationRepo::get_following(&pool, "A", &["s1".into()])
        .await
        .unwrap();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].student_id, "s1");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_chain_requires_students(pool: PgPool) {
    let result = ReallocationRepo::get_following(&pool, "A", &[]).await;
    assert_matches!(result, Err(RepoError::InconsistentInputShape(_)));
}

// ---------------------------------------------------------------------------
// Test: Only the tail of a chain may be retracted
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_middle_link_retraction_rejected(pool: PgPool) {
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s1", "B", Some("C"))],
    )
    .await;

    // Retracting the placement into B would orphan the B -> C link.
    let result =
        ReallocationRepo::cancel_if_student_reallocated(&pool, &["s1".into(), "B".into()]).await;
    assert_matches!(
        result,
        Err(RepoError::InvalidReallocationRetraction { .. })
    );

    // Nothing changed.
    let chain = ReallocationRepo::get_following(&pool, "A", &["s1".into()])
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tail_retraction_succeeds(pool: PgPool) {
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s1", "B", Some("C"))],
    )
    .await;

    let retracted =
        ReallocationRepo::cancel_if_student_reallocated(&pool, &["s1".into(), "C".into()])
            .await
            .unwrap();
    assert_eq!(retracted, 1);

    let chain = ReallocationRepo::get_following(&pool, "A", &["s1".into()])
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(
        chain[1].new_lesson_id, None,
        "the tail edge should be retracted to unplaced, not deleted"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retraction_skips_missing_pairs(pool: PgPool) {
    upsert_edges(&pool, &[edge("s1", "A", Some("B"))]).await;
    let retracted =
        ReallocationRepo::cancel_if_student_reallocated(&pool, &["s9".into(), "B".into()])
            .await
            .unwrap();
    assert_eq!(retracted, 0, "pairs with no matching edge are a no-op");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_odd_pair_list_rejected(pool: PgPool) {
    let result =
        ReallocationRepo::cancel_if_student_reallocated(&pool, &["s1".into()]).await;
    assert_matches!(result, Err(RepoError::InconsistentInputShape(_)));

    let result = ReallocationRepo::soft_delete(&pool, &["s1".into()], true).await;
    assert_matches!(result, Err(RepoError::InconsistentInputShape(_)));
}

// ---------------------------------------------------------------------------
// Test: soft_delete guards live placements unless told otherwise
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_soft_delete_guards_live_placement(pool: PgPool) {
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s2", "A", None)],
    )
    .await;

    // Without the flag only the dangling s2 edge goes.
    let removed = ReallocationRepo::soft_delete(
        &pool,
        &["s1".into(), "A".into(), "s2".into(), "A".into()],
        false,
    )
    .await
    .unwrap();
    assert_eq!(removed, 1, "the placed s1 edge must survive");

    // With the flag the placed edge goes too.
    let removed =
        ReallocationRepo::soft_delete(&pool, &["s1".into(), "A".into()], true)
            .await
            .unwrap();
    assert_eq!(removed, 1);

    let remaining = ReallocationRepo::get_reallocated_lesson(&pool, &["A".into()])
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

// ---------------------------------------------------------------------------
// Test: Deleting a lesson cleans up both edge directions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_lesson_cleans_edges(pool: PgPool) {
    LessonRepo::insert_lesson(&pool, &new_lesson("A", 1)).await.unwrap();
    LessonRepo::insert_lesson(&pool, &new_lesson("B", 2)).await.unwrap();
    LessonRepo::insert_lesson(&pool, &new_lesson("C", 3)).await.unwrap();
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s1", "B", Some("C"))],
    )
    .await;

    // Deleting B removes the edge rooted at B and retracts the placement
    // into B. Rooted edges go first, so the retraction is not blocked by a
    // downstream link that is itself being deleted.
    LessonRepo::delete(&pool, &["B".into()]).await.unwrap();

    let rooted_at_b = ReallocationRepo::get_reallocated_lesson(&pool, &["B".into()])
        .await
        .unwrap();
    assert!(rooted_at_b.is_empty(), "edges rooted at B are deleted");

    let rooted_at_a = ReallocationRepo::get_reallocated_lesson(&pool, &["A".into()])
        .await
        .unwrap();
    assert_eq!(rooted_at_a.len(), 1);
    assert_eq!(
        rooted_at_a[0].new_lesson_id, None,
        "the placement into deleted B is retracted, leaving s1 unplaced"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_placement_with_live_downstream_keeps_edge(pool: PgPool) {
    LessonRepo::insert_lesson(&pool, &new_lesson("A", 1)).await.unwrap();
    LessonRepo::insert_lesson(&pool, &new_lesson("B", 2)).await.unwrap();
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s1", "B", Some("C"))],
    )
    .await;

    // Deleting only A: the A -> B edge is rooted at A and goes away; the
    // B -> C edge is untouched.
    LessonRepo::delete(&pool, &["A".into()]).await.unwrap();

    let rooted_at_a = ReallocationRepo::get_reallocated_lesson(&pool, &["A".into()])
        .await
        .unwrap();
    assert!(rooted_at_a.is_empty());
    let rooted_at_b = ReallocationRepo::get_reallocated_lesson(&pool, &["B".into()])
        .await
        .unwrap();
    assert_eq!(rooted_at_b.len(), 1);
    assert_eq!(rooted_at_b[0].new_lesson_id.as_deref(), Some("C"));
}

// ---------------------------------------------------------------------------
// Test: Placement lookups
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_placement_lookups(pool: PgPool) {
    upsert_edges(
        &pool,
        &[edge("s1", "A", Some("B")), edge("s2", "A", Some("B"))],
    )
    .await;

    let into_b = ReallocationRepo::get_by_new_lesson_id(&pool, "B").await.unwrap();
    assert_eq!(into_b.len(), 2);

    let pairs = ReallocationRepo::get_by_new_lesson_id_and_student_id(
        &pool,
        &["B".into(), "s1".into()],
    )
    .await
    .unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].student_id, "s1");
    assert_eq!(pairs[0].original_lesson_id, "A");
}
