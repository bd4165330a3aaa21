//! SurrealDB implementation of [`ContributorRepository`].
//!
//! A membership is a `contributes_to` edge from a user to a project.
//! Every membership change also rewrites `project.contributor_count` in
//! the same statement. Removal only deletes the edge after decrementing a
//! count above one, and two removals racing on the same project write the
//! same row, so one of them is aborted and retried against the committed
//! count.

use chrono::{DateTime, Utc};
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::contributor::MembershipRecord;
use softdesk_core::repository::{ContributorRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, claim_user, first_total, parse_uuid, retry_on_conflict};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct MembershipRow {
    project_id: String,
    contributor_id: String,
    created_at: DateTime<Utc>,
}

impl MembershipRow {
    fn try_into_record(self) -> Result<MembershipRecord, DbError> {
        Ok(MembershipRecord {
            project_id: parse_uuid("contributes_to", &self.project_id)?,
            contributor_id: parse_uuid("contributes_to", &self.contributor_id)?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Contributor repository.
#[derive(Clone)]
pub struct SurrealContributorRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealContributorRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// One attempt at writing the edge; `None` when the user is gone.
    async fn try_add(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MembershipRow>, DbError> {
        let project_str = project_id.to_string();
        let user_str = user_id.to_string();

        let query = format!(
            "IF {claim} {{ \
                 UPDATE type::record('project', $project_id) \
                 SET contributor_count += 1 WHERE tenant_id = $tenant_id; \
                 RELATE user:`{user_str}` -> contributes_to -> project:`{project_str}` \
                 SET tenant_id = $tenant_id; \
             }}; \
             SELECT meta::id(out) AS project_id, meta::id(in) AS contributor_id, \
             created_at FROM contributes_to \
             WHERE in = type::record('user', $user_id) \
             AND out = type::record('project', $project_id);",
            claim = claim_user("user_id"),
        );

        let mut result = self
            .db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_str))
            .bind(("project_id", project_str))
            .await
            .map_err(|e| DbError::from_statement(e, "contributes_to"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "contributes_to"))?;

        let rows: Vec<MembershipRow> = result.take(1)?;
        Ok(rows.into_iter().next())
    }

    /// One attempt at the guarded removal; `true` when the edge was deleted.
    async fn try_remove(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "IF (UPDATE type::record('project', $project_id) \
                     SET contributor_count -= 1 \
                     WHERE tenant_id = $tenant_id AND contributor_count > 1 \
                     AND array::len((SELECT VALUE id FROM contributes_to \
                         WHERE in = type::record('user', $user_id) \
                         AND out = type::record('project', $project_id))) > 0 \
                     RETURN VALUE meta::id(id)) { \
                     DELETE contributes_to \
                     WHERE tenant_id = $tenant_id \
                     AND in = type::record('user', $user_id) \
                     AND out = type::record('project', $project_id) \
                     RETURN BEFORE \
                 } ELSE { [] };",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("project_id", project_id.to_string()))
            .await
            .map_err(|e| DbError::from_statement(e, "contributes_to"))?
            .check()
            .map_err(|e| DbError::from_statement(e, "contributes_to"))?;

        let deleted: Vec<surrealdb_types::Value> = result.take(0)?;
        Ok(!deleted.is_empty())
    }
}

impl<C: Connection> ContributorRepository for SurrealContributorRepository<C> {
    async fn add(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> SoftdeskResult<MembershipRecord> {
        if self.is_member(tenant_id, project_id, user_id).await? {
            return Err(SoftdeskError::DuplicateContributor {
                user_id: user_id.to_string(),
            });
        }

        // The unique (in, out) index catches a concurrent duplicate.
        let attempt = retry_on_conflict(move || self.try_add(tenant_id, project_id, user_id)).await;
        let row = match attempt {
            Ok(row) => row,
            Err(DbError::Conflict { .. }) => {
                return Err(SoftdeskError::DuplicateContributor {
                    user_id: user_id.to_string(),
                });
            }
            Err(other) => return Err(other.into()),
        };

        let row = row.ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: user_id.to_string(),
        })?;
        Ok(row.try_into_record()?)
    }

    async fn remove(&self, tenant_id: Uuid, project_id: Uuid, user_id: Uuid) -> SoftdeskResult<()> {
        if retry_on_conflict(move || self.try_remove(tenant_id, project_id, user_id)).await? {
            return Ok(());
        }

        if self.is_member(tenant_id, project_id, user_id).await? {
            Err(SoftdeskError::LastContributor {
                project_id: project_id.to_string(),
            })
        } else {
            Err(SoftdeskError::NotAMember {
                user_id: user_id.to_string(),
            })
        }
    }

    async fn is_member(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> SoftdeskResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM contributes_to \
                 WHERE tenant_id = $tenant_id \
                 AND in = type::record('user', $user_id) \
                 AND out = type::record('project', $project_id) GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("project_id", project_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_total(&rows) > 0)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<MembershipRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM contributes_to \
                 WHERE tenant_id = $tenant_id \
                 AND out = type::record('project', $project_id) GROUP ALL; \
                 SELECT meta::id(out) AS project_id, meta::id(in) AS contributor_id, \
                 created_at FROM contributes_to \
                 WHERE tenant_id = $tenant_id \
                 AND out = type::record('project', $project_id) \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("project_id", project_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = first_total(&count_rows);

        let rows: Vec<MembershipRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
