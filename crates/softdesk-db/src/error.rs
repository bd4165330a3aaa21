//! Database-specific error types and conversions.

use softdesk_core::error::SoftdeskError;

/// Field each unique index of the schema is keyed on.
const UNIQUE_INDEX_FIELDS: &[(&str, &str)] = &[
    ("idx_tenant_domain", "domain"),
    ("idx_user_tenant_username", "username"),
    ("idx_user_tenant_email", "email"),
    ("idx_project_tenant_name", "name"),
    ("idx_issue_project_name", "name"),
];

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Malformed {entity} record: {reason}")]
    InvalidRecord { entity: &'static str, reason: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    Conflict {
        entity: String,
        field: Option<&'static str>,
    },

    #[error("Transaction on {entity} lost a write conflict: {reason}")]
    TransactionConflict { entity: String, reason: String },
}

impl DbError {
    /// Classify a failed statement: unique index violations become
    /// [`DbError::Conflict`], transactions aborted by a concurrent write
    /// become [`DbError::TransactionConflict`], everything else
    /// [`DbError::Query`].
    pub(crate) fn from_statement(err: surrealdb::Error, entity: &str) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if message.contains("already contains") {
            let field = UNIQUE_INDEX_FIELDS
                .iter()
                .find(|(index, _)| message.contains(index))
                .map(|(_, field)| *field);
            DbError::Conflict {
                entity: entity.into(),
                field,
            }
        } else if lowered.contains("conflict") || lowered.contains("can be retried") {
            DbError::TransactionConflict {
                entity: entity.into(),
                reason: message,
            }
        } else {
            DbError::Query(message)
        }
    }

    pub(crate) fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        DbError::InvalidRecord {
            entity,
            reason: reason.into(),
        }
    }
}

impl From<DbError> for SoftdeskError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SoftdeskError::NotFound { entity, id },
            DbError::Conflict { entity, field } => SoftdeskError::AlreadyExists {
                entity,
                field: field.map(String::from),
            },
            other => SoftdeskError::Database(other.to_string()),
        }
    }
}
