/// Lesson-domain primary keys are opaque strings minted by the caller or the
/// store (UUID v4 when the store generates them).
pub type LessonId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Sentinel for "unset, use the default" on minute-valued fields
/// (`preparation_time`, `break_time`).
pub const UNSET_MINUTES: i32 = -1;
