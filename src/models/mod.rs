//! Core data models for the photo collection service.
//!
//! These entities map to the `projects` and `photos` tables via
//! `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod photo;
pub mod project;
