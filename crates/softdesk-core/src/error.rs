//! Error types for the SoftDesk system.
//!
//! Every failure that reaches a caller is one of these variants. Each
//! variant maps to a status category via [`SoftdeskError::status`] and to
//! a payload key via [`SoftdeskError::field`].

use std::fmt;

use thiserror::Error;

/// Kinds of records that keep a user from being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependentKind {
    AuthoredComments,
    AuthoredIssues,
    AssignedIssues,
    AuthoredProjects,
    ContributorMemberships,
}

impl fmt::Display for DependentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DependentKind::AuthoredComments => "authored comments",
            DependentKind::AuthoredIssues => "authored issues",
            DependentKind::AssignedIssues => "assigned issues",
            DependentKind::AuthoredProjects => "authored projects",
            DependentKind::ContributorMemberships => "contributor memberships",
        };
        f.write_str(label)
    }
}

/// Status category a collaborator should use when rendering an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum SoftdeskError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A uniqueness rule rejected the write. `field` names the request
    /// field the rule is keyed on, when known.
    #[error("Entity already exists: {entity}")]
    AlreadyExists {
        entity: String,
        field: Option<String>,
    },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("No tenant is registered for email domain '{domain}'")]
    UnknownDomain { domain: String },

    /// The project does not exist in the caller's tenant.
    #[error("Invalid project reference: {project_id}")]
    InvalidProjectReference { project_id: String },

    /// The candidate is not a user of the project's tenant.
    #[error("Invalid contributor reference: {user_id}")]
    InvalidContributorReference { user_id: String },

    #[error("User {user_id} is already a contributor of this project")]
    DuplicateContributor { user_id: String },

    #[error("User {user_id} is not a contributor of this project")]
    NotAMember { user_id: String },

    #[error("The last contributor of a project cannot be removed")]
    LastContributor { project_id: String },

    #[error("User still has {0}")]
    HasDependentRecords(DependentKind),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SoftdeskError {
    /// Shorthand for a field-keyed validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SoftdeskError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        SoftdeskError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn status(&self) -> ErrorStatus {
        match self {
            SoftdeskError::Validation { .. }
            | SoftdeskError::UnknownDomain { .. }
            | SoftdeskError::InvalidContributorReference { .. }
            | SoftdeskError::DuplicateContributor { .. }
            | SoftdeskError::NotAMember { .. }
            | SoftdeskError::LastContributor { .. }
            | SoftdeskError::HasDependentRecords(_) => ErrorStatus::BadRequest,
            SoftdeskError::AuthenticationFailed { .. }
            | SoftdeskError::AuthorizationDenied { .. } => ErrorStatus::Forbidden,
            SoftdeskError::NotFound { .. } | SoftdeskError::InvalidProjectReference { .. } => {
                ErrorStatus::NotFound
            }
            SoftdeskError::AlreadyExists { .. } => ErrorStatus::Conflict,
            SoftdeskError::Database(_) | SoftdeskError::Crypto(_) | SoftdeskError::Internal(_) => {
                ErrorStatus::Internal
            }
        }
    }

    /// Key under which the message is reported: a field name for
    /// field-level failures, `detail` otherwise.
    pub fn field(&self) -> &str {
        match self {
            SoftdeskError::Validation { field, .. } => field,
            SoftdeskError::AlreadyExists {
                field: Some(field), ..
            } => field,
            SoftdeskError::UnknownDomain { .. } => "email",
            SoftdeskError::InvalidContributorReference { .. }
            | SoftdeskError::DuplicateContributor { .. }
            | SoftdeskError::NotAMember { .. } => "contributor",
            _ => "detail",
        }
    }
}

pub type SoftdeskResult<T> = Result<T, SoftdeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_keyed_by_field() {
        let err = SoftdeskError::validation("name", "Project already exists");
        assert_eq!(err.field(), "name");
        assert_eq!(err.status(), ErrorStatus::BadRequest);
    }

    #[test]
    fn uniqueness_conflict_is_keyed_by_its_field() {
        let err = SoftdeskError::AlreadyExists {
            entity: "user".into(),
            field: Some("username".into()),
        };
        assert_eq!(err.field(), "username");
        assert_eq!(err.status(), ErrorStatus::Conflict);

        let err = SoftdeskError::AlreadyExists {
            entity: "contributes_to".into(),
            field: None,
        };
        assert_eq!(err.field(), "detail");
    }

    #[test]
    fn out_of_tenant_project_presents_as_not_found() {
        let err = SoftdeskError::InvalidProjectReference {
            project_id: "p".into(),
        };
        assert_eq!(err.status(), ErrorStatus::NotFound);
        assert_eq!(err.field(), "detail");
    }

    #[test]
    fn dependent_kind_is_named_in_message() {
        let err = SoftdeskError::HasDependentRecords(DependentKind::AssignedIssues);
        assert_eq!(err.to_string(), "User still has assigned issues");
    }
}
