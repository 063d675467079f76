//! Table-driven maps from the canonical classification enums to the legacy
//! code columns (`status`, `lesson_type`) still read by older consumers.
//!
//! The fill rule lives in the storage layer: a legacy field is populated from
//! its canonical counterpart only when it is not already explicitly set.

use crate::lesson::{SchedulingStatus, TeachingMedium};

/// Legacy `LESSON_STATUS_*` code for a canonical scheduling status.
pub fn legacy_status(status: SchedulingStatus) -> &'static str {
    match status {
        SchedulingStatus::Draft => "LESSON_STATUS_DRAFT",
        SchedulingStatus::Published => "LESSON_STATUS_NOT_STARTED",
        SchedulingStatus::Completed => "LESSON_STATUS_COMPLETED",
        SchedulingStatus::Canceled => "LESSON_STATUS_CANCELED",
    }
}

/// Legacy `LESSON_TYPE_*` code for a canonical teaching medium. Zoom and
/// ClassDo deliveries are online lessons to legacy readers.
pub fn legacy_lesson_type(medium: TeachingMedium) -> &'static str {
    match medium {
        TeachingMedium::Offline => "LESSON_TYPE_OFFLINE",
        TeachingMedium::Online | TeachingMedium::Zoom | TeachingMedium::ClassDo => {
            "LESSON_TYPE_ONLINE"
        }
    }
}
