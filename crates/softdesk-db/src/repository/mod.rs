//! SurrealDB repository implementations.

mod comment;
mod contributor;
mod issue;
mod project;
mod tenant;
mod user;

pub use comment::SurrealCommentRepository;
pub use contributor::SurrealContributorRepository;
pub use issue::SurrealIssueRepository;
pub use project::SurrealProjectRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;

use std::future::Future;

use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

/// Attempts made for a write whose transaction keeps losing conflicts.
const MAX_WRITE_ATTEMPTS: u32 = 8;

/// Restricts a statement on `issue` or `comment` to rows whose project
/// is still active.
pub(crate) const ACTIVE_PROJECT_CLAUSE: &str = "project_id IN (SELECT VALUE meta::id(id) \
     FROM project WHERE tenant_id = $tenant_id AND is_active = true)";

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// Parse a UUID stored as a string column.
pub(crate) fn parse_uuid(entity: &'static str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::invalid(entity, format!("invalid UUID '{raw}': {e}")))
}

/// Read the first `total` of a count statement, `0` when the statement
/// matched nothing.
pub(crate) fn first_total(rows: &[CountRow]) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

/// Condition that bumps the `revision` of the user bound to `$<param>` in
/// `$tenant_id` and is truthy only while that user exists.
///
/// Statements that start referencing a user evaluate it first, so a
/// concurrent delete of the user and the new reference write the same row
/// and one of the two transactions is aborted.
pub(crate) fn claim_user(param: &str) -> String {
    format!(
        "(UPDATE type::record('user', ${param}) SET revision += 1 \
         WHERE tenant_id = $tenant_id RETURN VALUE meta::id(id))"
    )
}

/// [`claim_user`] for every parameter, joined with `AND`; `true` when the
/// write references no user.
pub(crate) fn claim_users(params: &[&str]) -> String {
    if params.is_empty() {
        return "true".into();
    }
    params
        .iter()
        .map(|param| claim_user(param))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Run `attempt` until it does not fail with
/// [`DbError::TransactionConflict`]. The retry re-reads committed state,
/// so the losing side of a race sees the winner's write.
pub(crate) async fn retry_on_conflict<T, F, Fut>(mut attempt: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(DbError::TransactionConflict { entity, reason }) if tries < MAX_WRITE_ATTEMPTS => {
                debug!(%entity, %reason, tries, "Retrying write after transaction conflict");
                tries += 1;
            }
            other => return other,
        }
    }
}
