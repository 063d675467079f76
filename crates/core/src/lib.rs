pub mod error;
pub mod legacy;
pub mod lesson;
pub mod scheduling;
pub mod types;
