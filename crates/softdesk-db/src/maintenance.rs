//! Bulk data maintenance used by the local development fixtures.

use surrealdb::{Connection, Surreal};
use tracing::info;
use uuid::Uuid;

use crate::error::DbError;

/// Delete every project, issue, comment and membership of `tenant_id`,
/// and every user of the tenant except `keep_user`.
///
/// Tenants themselves and the schema are left in place.
pub async fn erase_tenant<C: Connection>(
    db: &Surreal<C>,
    tenant_id: Uuid,
    keep_user: Option<Uuid>,
) -> Result<(), DbError> {
    db.query(
        "BEGIN TRANSACTION; \
         DELETE comment WHERE tenant_id = $tenant_id; \
         DELETE issue WHERE tenant_id = $tenant_id; \
         DELETE contributes_to WHERE tenant_id = $tenant_id; \
         DELETE project WHERE tenant_id = $tenant_id; \
         DELETE user WHERE tenant_id = $tenant_id AND meta::id(id) != $keep; \
         COMMIT TRANSACTION;",
    )
    .bind(("tenant_id", tenant_id.to_string()))
    .bind(("keep", keep_user.map(|id| id.to_string()).unwrap_or_default()))
    .await?
    .check()
    .map_err(|e| DbError::Query(e.to_string()))?;

    info!(%tenant_id, keep_user = ?keep_user, "Tenant data erased");
    Ok(())
}
