//! Domain models for SoftDesk.
//!
//! These are the core types shared across all crates.

pub mod comment;
pub mod contributor;
pub mod issue;
pub mod project;
pub mod tenant;
pub mod user;
