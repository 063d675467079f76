//! Storage-layer error taxonomy.
//!
//! Repositories never swallow failures: storage errors bubble up wrapped in
//! [`RepoError::Database`], and "no rows" is converted to an empty result only
//! where the operation's contract explicitly allows a "none found" outcome
//! (optional point reads, the previous-page lookahead). Everywhere else a
//! missing single-row target is [`RepoError::NotFound`].

use lessonmgmt_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Single-row get target missing or already soft-deleted.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A batched write had N statements and the statement at `index`
    /// affected an unexpected row count; the whole call failed.
    #[error("batch statement {index} affected {affected} rows, expected {expected}")]
    PartialBatchFailure {
        index: usize,
        affected: u64,
        expected: u64,
    },

    /// Attempt to retract a reallocation edge that is not the tail of its
    /// chain. A validation failure, not a database error.
    #[error("cannot retract reallocation for student {student_id} into lesson {lesson_id}: a downstream edge exists")]
    InvalidReallocationRetraction {
        student_id: String,
        lesson_id: String,
    },

    /// Malformed caller input (odd-length pair lists, empty required sets),
    /// rejected before any database call.
    #[error("inconsistent input: {0}")]
    InconsistentInputShape(String),

    /// Domain validation or illegal status transition, detected before any
    /// statement executes.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
