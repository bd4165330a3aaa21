//! SoftDesk Database: SurrealDB connection management, schema
//! migrations and repository implementations.
//!
//! Every tenant-scoped query in [`repository`] filters on `tenant_id`
//! explicitly, and every read path that can see deactivated projects
//! takes a `visible_only` flag.

mod connection;
mod error;
pub mod maintenance;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::run_migrations;
