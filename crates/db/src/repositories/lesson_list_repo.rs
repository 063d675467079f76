//! Filtered, keyset-paginated lesson listings.
//!
//! One filter-building function is shared by the page query, the total-count
//! query and the previous-page lookahead so the filter logic cannot drift
//! between them. Pagination compares the `(start_time, end_time, lesson_id)`
//! tuple against the cursor row's tuple: strictly greater (ascending) for
//! future pages, strictly less (descending) for past pages.

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::{RepoError, RepoResult};
use crate::models::lesson::LessonRow;
use crate::models::lesson_list::{LessonListArgs, LessonPage, LessonTime, REPORT_STATUS_NONE};

const LIST_COLUMNS: &str = "\
    l.lesson_id, l.name, l.start_time, l.end_time, l.teaching_medium, \
    l.teaching_method, l.scheduling_status, l.location_id, l.course_id, \
    l.class_id, l.scheduler_id, l.lesson_group_id, l.status, l.lesson_type, \
    l.is_locked, l.preparation_time, l.break_time, l.zoom_link, l.zoom_id, \
    l.zoom_owner_id, l.zoom_occurrence_id, l.classdo_link, l.classdo_owner_id, \
    l.classdo_room_id, l.created_at, l.updated_at";

pub struct LessonListRepo;

impl LessonListRepo {
    /// Compute one page plus the previous-page pointer.
    ///
    /// The lookahead reverses the sort direction against the first row of
    /// the computed page and fetches `limit + 1` rows: exactly `limit + 1`
    /// present means the furthest row back is the cursor that reproduces the
    /// preceding page; fewer means the preceding page is the unanchored
    /// first page (empty cursor). The lookahead's window count gives the
    /// total on the preceding side. An absent preceding side is a valid
    /// "none" outcome, never an error.
    pub async fn retrieve(pool: &PgPool, args: &LessonListArgs) -> RepoResult<LessonPage> {
        if args.limit <= 0 {
            return Err(RepoError::InconsistentInputShape(format!(
                "page limit must be positive, got {}",
                args.limit
            )));
        }

        // Page query.
        let mut page_query = QueryBuilder::<Postgres>::new("SELECT ");
        if needs_distinct(args) {
            page_query.push("DISTINCT ");
        }
        page_query.push(LIST_COLUMNS);
        push_from_and_filters(&mut page_query, args);
        if let Some(cursor) = active_cursor(args) {
            push_cursor_predicate(&mut page_query, args.lesson_time, cursor);
        }
        push_order(&mut page_query, "l", args.lesson_time, false);
        page_query.push(" LIMIT ");
        page_query.push_bind(args.limit);
        let rows: Vec<LessonRow> = page_query.build_query_as().fetch_all(pool).await?;

        // Total matching the filter, ignoring the cursor.
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT count(DISTINCT l.lesson_id)");
        push_from_and_filters(&mut count_query, args);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        // Previous-page lookahead, anchored at the first row of the page.
        let mut prev_cursor = String::new();
        let mut prev_total = 0i64;
        if active_cursor(args).is_some() {
            if let Some(first) = rows.first() {
                let mut prev_query = QueryBuilder::<Postgres>::new(
                    "SELECT prev.lesson_id, count(*) OVER () AS total FROM (SELECT ",
                );
                if needs_distinct(args) {
                    prev_query.push("DISTINCT ");
                }
                prev_query.push("l.lesson_id, l.start_time, l.end_time");
                push_from_and_filters(&mut prev_query, args);
                prev_query.push(" AND (l.start_time, l.end_time, l.lesson_id) ");
                prev_query.push(match args.lesson_time {
                    LessonTime::Future => "< (",
                    LessonTime::Past => "> (",
                });
                prev_query.push_bind(first.start_time);
                prev_query.push(", ");
                prev_query.push_bind(first.end_time);
                prev_query.push(", ");
                prev_query.push_bind(first.lesson_id.clone());
                prev_query.push(")) AS prev");
                push_order(&mut prev_query, "prev", args.lesson_time, true);
                prev_query.push(" LIMIT ");
                prev_query.push_bind(args.limit + 1);

                let preceding: Vec<(String, i64)> =
                    prev_query.build_query_as().fetch_all(pool).await?;
                if let Some((_, count)) = preceding.first() {
                    prev_total = *count;
                }
                if preceding.len() as i64 == args.limit + 1 {
                    // Reversed order: the last fetched row is the furthest
                    // back, i.e. the row the preceding page starts after.
                    if let Some((id, _)) = preceding.last() {
                        prev_cursor = id.clone();
                    }
                }
            }
        }

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(row.into_entity().map_err(RepoError::Core)?);
        }
        Ok(LessonPage {
            lessons,
            total,
            prev_cursor,
            prev_total,
        })
    }
}

fn active_cursor(args: &LessonListArgs) -> Option<&str> {
    args.lesson_id.as_deref().filter(|id| !id.is_empty())
}

fn member_join(args: &LessonListArgs) -> bool {
    !args.student_ids.is_empty()
        || !args.grade_ids.is_empty()
        || !args.course_ids.is_empty()
        || keyword(args).is_some()
}

fn directory_join(args: &LessonListArgs) -> bool {
    !args.grade_ids.is_empty() || keyword(args).is_some()
}

fn teacher_join(args: &LessonListArgs) -> bool {
    !args.teacher_ids.is_empty()
}

/// Multi-valued joins duplicate lesson rows, so any of them switches the
/// select to DISTINCT.
fn needs_distinct(args: &LessonListArgs) -> bool {
    member_join(args) || teacher_join(args)
}

fn keyword(args: &LessonListArgs) -> Option<&str> {
    args.keyword.as_deref().filter(|k| !k.is_empty())
}

fn time_zone(args: &LessonListArgs) -> String {
    args.time_zone.clone().unwrap_or_else(|| "UTC".to_string())
}

fn push_order(
    qb: &mut QueryBuilder<'_, Postgres>,
    alias: &str,
    lesson_time: LessonTime,
    reversed: bool,
) {
    let ascending = matches!(lesson_time, LessonTime::Future) != reversed;
    let dir = if ascending { "ASC" } else { "DESC" };
    qb.push(format!(
        " ORDER BY {alias}.start_time {dir}, {alias}.end_time {dir}, {alias}.lesson_id {dir}"
    ));
}

/// Tuple comparison against the cursor row, looked up by ID so callers only
/// carry an opaque cursor. A vanished cursor row yields an empty page.
fn push_cursor_predicate(
    qb: &mut QueryBuilder<'_, Postgres>,
    lesson_time: LessonTime,
    cursor: &str,
) {
    qb.push(" AND (l.start_time, l.end_time, l.lesson_id) ");
    qb.push(match lesson_time {
        LessonTime::Future => "> (",
        LessonTime::Past => "< (",
    });
    qb.push("(SELECT start_time FROM lessons WHERE lesson_id = ");
    qb.push_bind(cursor.to_string());
    qb.push("), (SELECT end_time FROM lessons WHERE lesson_id = ");
    qb.push_bind(cursor.to_string());
    qb.push("), ");
    qb.push_bind(cursor.to_string());
    qb.push(")");
}

/// FROM clause, joins and every optional predicate. Shared verbatim by the
/// page, count and previous-page queries.
fn push_from_and_filters(qb: &mut QueryBuilder<'_, Postgres>, args: &LessonListArgs) {
    qb.push(" FROM lessons l");
    if member_join(args) {
        qb.push(" JOIN lesson_members lm ON lm.lesson_id = l.lesson_id AND lm.deleted_at IS NULL");
    }
    if directory_join(args) {
        qb.push(" JOIN user_basic_info ubi ON ubi.user_id = lm.user_id AND ubi.deleted_at IS NULL");
    }
    if teacher_join(args) {
        qb.push(" JOIN lesson_teachers lt ON lt.lesson_id = l.lesson_id AND lt.deleted_at IS NULL");
    }
    if !args.report_statuses.is_empty() {
        qb.push(" LEFT JOIN lesson_reports lr ON lr.lesson_id = l.lesson_id AND lr.deleted_at IS NULL");
    }

    qb.push(" WHERE l.deleted_at IS NULL");

    match args.lesson_time {
        LessonTime::Future => {
            qb.push(" AND l.end_time >= ");
            qb.push_bind(args.current_time);
        }
        LessonTime::Past => {
            qb.push(" AND l.end_time < ");
            qb.push_bind(args.current_time);
        }
    }
    if let Some(from_date) = args.from_date {
        qb.push(" AND l.end_time >= ");
        qb.push_bind(from_date);
    }
    if let Some(to_date) = args.to_date {
        qb.push(" AND l.start_time <= ");
        qb.push_bind(to_date);
    }
    if !args.days_of_week.is_empty() {
        qb.push(" AND EXTRACT(DOW FROM l.start_time AT TIME ZONE ");
        qb.push_bind(time_zone(args));
        qb.push(")::int = ANY(");
        qb.push_bind(args.days_of_week.clone());
        qb.push(")");
    }
    if let Some(from_time) = args.from_time {
        qb.push(" AND (l.start_time AT TIME ZONE ");
        qb.push_bind(time_zone(args));
        qb.push(")::time >= ");
        qb.push_bind(from_time);
    }
    if let Some(to_time) = args.to_time {
        qb.push(" AND (l.end_time AT TIME ZONE ");
        qb.push_bind(time_zone(args));
        qb.push(")::time <= ");
        qb.push_bind(to_time);
    }
    if !args.location_ids.is_empty() {
        qb.push(" AND l.location_id = ANY(");
        qb.push_bind(args.location_ids.clone());
        qb.push(")");
    }
    if !args.class_ids.is_empty() {
        qb.push(" AND l.class_id = ANY(");
        qb.push_bind(args.class_ids.clone());
        qb.push(")");
    }
    if !args.scheduling_statuses.is_empty() {
        let codes: Vec<String> = args
            .scheduling_statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        qb.push(" AND l.scheduling_status = ANY(");
        qb.push_bind(codes);
        qb.push(")");
    }
    if !args.course_ids.is_empty() {
        // A GROUP lesson carries its course directly; an INDIVIDUAL one
        // links through its roster.
        qb.push(" AND (l.course_id = ANY(");
        qb.push_bind(args.course_ids.clone());
        qb.push(") OR lm.course_id = ANY(");
        qb.push_bind(args.course_ids.clone());
        qb.push("))");
    }
    if !args.student_ids.is_empty() {
        qb.push(" AND lm.user_id = ANY(");
        qb.push_bind(args.student_ids.clone());
        qb.push(")");
    }
    if !args.teacher_ids.is_empty() {
        qb.push(" AND lt.teacher_id = ANY(");
        qb.push_bind(args.teacher_ids.clone());
        qb.push(")");
    }
    if !args.grade_ids.is_empty() {
        qb.push(" AND ubi.grade_id = ANY(");
        qb.push_bind(args.grade_ids.clone());
        qb.push(")");
    }
    if let Some(kw) = keyword(args) {
        // Space-insensitive match against student display names.
        let needle = format!("%{}%", kw.replace([' ', '\u{3000}'], ""));
        qb.push(" AND replace(replace(COALESCE(ubi.name, ''), ' ', ''), '\u{3000}', '') ILIKE ");
        qb.push_bind(needle);
    }
    if !args.course_type_ids.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM courses c WHERE c.deleted_at IS NULL \
              AND c.course_type_id = ANY(",
        );
        qb.push_bind(args.course_type_ids.clone());
        qb.push(
            ") AND (c.course_id = l.course_id OR c.course_id IN \
              (SELECT lm2.course_id FROM lesson_members lm2 \
               WHERE lm2.lesson_id = l.lesson_id AND lm2.deleted_at IS NULL)))",
        );
    }
    if !args.report_statuses.is_empty() {
        let include_none = args
            .report_statuses
            .iter()
            .any(|s| s == REPORT_STATUS_NONE);
        let statuses: Vec<String> = args
            .report_statuses
            .iter()
            .filter(|s| *s != REPORT_STATUS_NONE)
            .cloned()
            .collect();
        match (include_none, statuses.is_empty()) {
            (true, true) => {
                qb.push(" AND lr.lesson_report_id IS NULL");
            }
            (true, false) => {
                qb.push(" AND (lr.report_submitting_status = ANY(");
                qb.push_bind(statuses);
                qb.push(") OR lr.lesson_report_id IS NULL)");
            }
            (false, _) => {
                qb.push(" AND lr.report_submitting_status = ANY(");
                qb.push_bind(statuses);
                qb.push(")");
            }
        }
    }
}
