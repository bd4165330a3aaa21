//! User domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Assigned once at creation from the email domain; never updated.
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_birth: NaiveDate,
    pub can_be_contacted: bool,
    pub can_data_be_collected: bool,
    pub can_data_be_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    /// Raw password (will be hashed with Argon2id before storage).
    pub password: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_birth: NaiveDate,
    pub can_be_contacted: bool,
    pub can_data_be_collected: bool,
    pub can_data_be_shared: bool,
}

/// Repository-level update. Has no `tenant_id`: a user never changes tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_staff: Option<bool>,
    pub date_birth: Option<NaiveDate>,
    pub can_be_contacted: Option<bool>,
    pub can_data_be_collected: Option<bool>,
    pub can_data_be_shared: Option<bool>,
}

/// Records that reference a user and block its deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DependentRecords {
    pub authored_comments: u64,
    pub authored_issues: u64,
    pub assigned_issues: u64,
    pub authored_projects: u64,
    pub memberships: u64,
}

impl DependentRecords {
    /// The first dependent kind still present, in reporting order.
    pub fn first_blocking(&self) -> Option<crate::error::DependentKind> {
        use crate::error::DependentKind;

        [
            (self.authored_comments, DependentKind::AuthoredComments),
            (self.authored_issues, DependentKind::AuthoredIssues),
            (self.assigned_issues, DependentKind::AssignedIssues),
            (self.authored_projects, DependentKind::AuthoredProjects),
            (self.memberships, DependentKind::ContributorMemberships),
        ]
        .into_iter()
        .find(|(count, _)| *count > 0)
        .map(|(_, kind)| kind)
    }
}
