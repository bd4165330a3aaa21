//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs and dates are stored as strings. Enums are stored as their wire
//! names with ASSERT constraints. Identity columns that must never change
//! (`tenant_id`, an issue's `project_id`) are READONLY.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "write_guards",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD description ON TABLE tenant TYPE string DEFAULT '';
DEFINE FIELD domain ON TABLE tenant TYPE string \
    ASSERT $value = string::lowercase($value) AND $value != '';
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_domain ON TABLE tenant \
    COLUMNS domain UNIQUE;

-- =======================================================================
-- Users (tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string READONLY;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD is_staff ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD is_superuser ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD date_birth ON TABLE user TYPE string;
DEFINE FIELD can_be_contacted ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD can_data_be_collected ON TABLE user TYPE bool \
    DEFAULT false;
DEFINE FIELD can_data_be_shared ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_username ON TABLE user \
    COLUMNS tenant_id, username UNIQUE;
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;

-- =======================================================================
-- Projects (tenant scope, soft-deleted through is_active)
-- =======================================================================
DEFINE TABLE project SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE project TYPE string READONLY;
DEFINE FIELD name ON TABLE project TYPE string;
DEFINE FIELD description ON TABLE project TYPE string DEFAULT '';
DEFINE FIELD kind ON TABLE project TYPE string \
    ASSERT $value IN ['Back-end', 'Front-end', 'iOS', 'Android'];
DEFINE FIELD author_id ON TABLE project TYPE string;
DEFINE FIELD is_active ON TABLE project TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE project TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_project_tenant_name ON TABLE project \
    COLUMNS tenant_id, name UNIQUE;
DEFINE INDEX idx_project_tenant_author ON TABLE project \
    COLUMNS tenant_id, author_id;

-- =======================================================================
-- Issues (tenant scope, owned by a project)
-- =======================================================================
DEFINE TABLE issue SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE issue TYPE string READONLY;
DEFINE FIELD project_id ON TABLE issue TYPE string READONLY;
DEFINE FIELD name ON TABLE issue TYPE string;
DEFINE FIELD description ON TABLE issue TYPE string DEFAULT '';
DEFINE FIELD priority ON TABLE issue TYPE string \
    ASSERT $value IN ['Low', 'Medium', 'High'];
DEFINE FIELD balise ON TABLE issue TYPE string \
    ASSERT $value IN ['Bug', 'Task', 'Feature'];
DEFINE FIELD progression ON TABLE issue TYPE string \
    DEFAULT 'To Do' \
    ASSERT $value IN ['To Do', 'In Progress', 'Finished'];
DEFINE FIELD author_id ON TABLE issue TYPE string;
DEFINE FIELD attribution_id ON TABLE issue TYPE string;
DEFINE FIELD created_at ON TABLE issue TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE issue TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_issue_project_name ON TABLE issue \
    COLUMNS project_id, name UNIQUE;
DEFINE INDEX idx_issue_tenant_author ON TABLE issue \
    COLUMNS tenant_id, author_id;

-- =======================================================================
-- Comments (tenant scope, owned by an issue)
-- =======================================================================
DEFINE TABLE comment SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE comment TYPE string READONLY;
DEFINE FIELD project_id ON TABLE comment TYPE string READONLY;
DEFINE FIELD issue_id ON TABLE comment TYPE string READONLY;
DEFINE FIELD description ON TABLE comment TYPE string DEFAULT '';
DEFINE FIELD author_id ON TABLE comment TYPE string;
DEFINE FIELD created_at ON TABLE comment TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE comment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_comment_issue ON TABLE comment \
    COLUMNS tenant_id, issue_id;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- User -> Project contributor membership
DEFINE TABLE contributes_to TYPE RELATION SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE contributes_to TYPE string;
DEFINE FIELD created_at ON TABLE contributes_to TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_contributes_to_pair ON TABLE contributes_to \
    COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2: guard rows for concurrent membership and reference writes
// -----------------------------------------------------------------------

/// `project.contributor_count` mirrors the project's `contributes_to`
/// edges; every membership change rewrites it, so two removals racing for
/// the last seats conflict on the project row. `user.revision` is bumped
/// by every write that starts referencing the user and conflicts with a
/// concurrent delete of that user.
const SCHEMA_V2: &str = "\
DEFINE FIELD contributor_count ON TABLE project TYPE int DEFAULT 0 \
    ASSERT $value >= 0;
DEFINE FIELD revision ON TABLE user TYPE int DEFAULT 0;
UPDATE project SET contributor_count = count(<-contributes_to);
UPDATE user SET revision = 0;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Highest applied migration version, `0` on a fresh database.
async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

/// Run all pending migrations against the given SurrealDB client and
/// return how many were applied.
///
/// The `_migration` tracking table is created on first run; each
/// migration whose version exceeds the recorded maximum is applied and
/// then recorded. Running twice is a no-op.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<usize, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current = current_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(version = current, "Schema is up to date");
        return Ok(0);
    }

    for migration in &pending {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "could not record v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    info!(applied = pending.len(), "Migrations applied");
    Ok(pending.len())
}
