//! Row structs and query DTOs.
//!
//! Each submodule contains:
//! - `FromRow` + `Serialize` row structs matching the database tables
//! - Conversions to/from the `lessonmgmt-core` domain entities
//! - Query-argument DTOs for the read paths that need them

pub mod associations;
pub mod lesson;
pub mod lesson_list;
pub mod reallocation;
