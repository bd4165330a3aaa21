//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Every repository below the
//! tenant directory takes an explicit `tenant_id` and applies it as a
//! filter on every query; nothing is inferred through relationships.

use uuid::Uuid;

use crate::error::SoftdeskResult;
use crate::models::{
    comment::{Comment, CommentQuery, CreateComment, UpdateComment},
    contributor::MembershipRecord,
    issue::{CreateIssue, Issue, IssueQuery, UpdateIssue},
    project::{CreateProject, Project, ProjectQuery, UpdateProject},
    tenant::{CreateTenant, Tenant},
    user::{CreateUser, DependentRecords, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenant directory (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = SoftdeskResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = SoftdeskResult<Tenant>> + Send;
    /// Case-insensitive lookup of the tenant registered for `domain`.
    fn get_by_domain(&self, domain: &str)
    -> impl Future<Output = SoftdeskResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = SoftdeskResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant-scoped repositories
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = SoftdeskResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = SoftdeskResult<User>> + Send;
    fn get_by_username(
        &self,
        tenant_id: Uuid,
        username: &str,
    ) -> impl Future<Output = SoftdeskResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = SoftdeskResult<User>> + Send;
    /// Records still referencing the user.
    fn dependents(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = SoftdeskResult<DependentRecords>> + Send;
    /// Hard delete. Refuses with `HasDependentRecords` while any
    /// dependent exists; the check and the delete are one statement.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = SoftdeskResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = SoftdeskResult<PaginatedResult<User>>> + Send;
}

pub trait ProjectRepository: Send + Sync {
    /// Create the project and enroll its author as first contributor.
    fn create(&self, input: CreateProject)
    -> impl Future<Output = SoftdeskResult<Project>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        visible_only: bool,
    ) -> impl Future<Output = SoftdeskResult<Project>> + Send;
    /// Whether another project of the tenant already uses `name`.
    fn name_taken(
        &self,
        tenant_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> impl Future<Output = SoftdeskResult<bool>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateProject,
    ) -> impl Future<Output = SoftdeskResult<Project>> + Send;
    /// Set a new author, enrolling them as contributor when absent.
    fn transfer_author(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_author_id: Uuid,
    ) -> impl Future<Output = SoftdeskResult<Project>> + Send;
    /// Soft-delete: sets `is_active` to false. Rows are kept.
    fn deactivate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = SoftdeskResult<Project>> + Send;
    /// Ordered by ascending id.
    fn list(
        &self,
        query: ProjectQuery,
        pagination: Pagination,
    ) -> impl Future<Output = SoftdeskResult<PaginatedResult<Project>>> + Send;
}

pub trait ContributorRepository: Send + Sync {
    /// Fails with `DuplicateContributor` if the pair already exists.
    fn add(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = SoftdeskResult<MembershipRecord>> + Send;
    /// Fails with `NotAMember` or `LastContributor`; the contributor
    /// count check and the delete are one statement.
    fn remove(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = SoftdeskResult<()>> + Send;
    fn is_member(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = SoftdeskResult<bool>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = SoftdeskResult<PaginatedResult<MembershipRecord>>> + Send;
}

pub trait IssueRepository: Send + Sync {
    fn create(&self, input: CreateIssue) -> impl Future<Output = SoftdeskResult<Issue>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        visible_only: bool,
    ) -> impl Future<Output = SoftdeskResult<Issue>> + Send;
    /// Whether another issue of the project already uses `name`.
    fn name_taken(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> impl Future<Output = SoftdeskResult<bool>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateIssue,
    ) -> impl Future<Output = SoftdeskResult<Issue>> + Send;
    /// Deletes the issue together with its comments.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = SoftdeskResult<()>> + Send;
    fn list(
        &self,
        query: IssueQuery,
        pagination: Pagination,
    ) -> impl Future<Output = SoftdeskResult<PaginatedResult<Issue>>> + Send;
}

pub trait CommentRepository: Send + Sync {
    fn create(&self, input: CreateComment)
    -> impl Future<Output = SoftdeskResult<Comment>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        visible_only: bool,
    ) -> impl Future<Output = SoftdeskResult<Comment>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateComment,
    ) -> impl Future<Output = SoftdeskResult<Comment>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = SoftdeskResult<()>> + Send;
    fn list(
        &self,
        query: CommentQuery,
        pagination: Pagination,
    ) -> impl Future<Output = SoftdeskResult<PaginatedResult<Comment>>> + Send;
}
