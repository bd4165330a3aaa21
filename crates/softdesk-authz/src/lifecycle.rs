//! Soft-delete lifecycle.
//!
//! Projects are deactivated, never deleted; their issues and comments
//! stay in place and drop out of every `visible_only` read. Users are
//! hard-deleted, but only once nothing references them.

use softdesk_core::Principal;
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::project::Project;
use softdesk_core::repository::{ContributorRepository, ProjectRepository, UserRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::{Action, Target, authenticated, authorize};

pub struct LifecycleService<P, K, U> {
    projects: P,
    contributors: K,
    users: U,
}

impl<P, K, U> LifecycleService<P, K, U>
where
    P: ProjectRepository,
    K: ContributorRepository,
    U: UserRepository,
{
    pub fn new(projects: P, contributors: K, users: U) -> Self {
        Self {
            projects,
            contributors,
            users,
        }
    }

    /// Author-only. Deactivating an inactive project is a no-op.
    pub async fn deactivate_project(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
    ) -> SoftdeskResult<Project> {
        let principal = authenticated(principal)?;

        let project = self
            .projects
            .get_by_id(principal.tenant_id, project_id, false)
            .await?;
        let is_member = self
            .contributors
            .is_member(principal.tenant_id, project.id, principal.id)
            .await?;
        authorize(
            Some(principal),
            Action::DeactivateProject,
            &Target::object(project.author_id, is_member),
        )?;

        if !project.is_active {
            debug!(%project_id, "Project already inactive");
            return Ok(project);
        }

        let project = self
            .projects
            .deactivate(principal.tenant_id, project_id)
            .await?;
        info!(tenant_id = %principal.tenant_id, %project_id, "Project deactivated");
        Ok(project)
    }

    /// Staff-only. Refuses with the first dependent kind still present
    /// instead of cascading.
    pub async fn delete_user(
        &self,
        principal: Option<&Principal>,
        user_id: Uuid,
    ) -> SoftdeskResult<()> {
        authorize(principal, Action::DeleteUser, &Target::none())?;
        let principal = authenticated(principal)?;

        let user = self.users.get_by_id(principal.tenant_id, user_id).await?;

        let dependents = self.users.dependents(principal.tenant_id, user.id).await?;
        if let Some(kind) = dependents.first_blocking() {
            debug!(%user_id, %kind, "User deletion refused");
            return Err(SoftdeskError::HasDependentRecords(kind));
        }

        self.users.delete(principal.tenant_id, user.id).await?;
        info!(tenant_id = %principal.tenant_id, %user_id, "User deleted");
        Ok(())
    }
}
