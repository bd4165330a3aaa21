//! Contributor membership management.
//!
//! A project always keeps at least one contributor. The repository
//! enforces that in the delete statement itself; this service adds the
//! tenant and reference checks and the `IsObjectAuthorOrStaff` gate.

use softdesk_core::Principal;
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::contributor::MembershipRecord;
use softdesk_core::models::project::Project;
use softdesk_core::repository::{
    ContributorRepository, PaginatedResult, Pagination, ProjectRepository, UserRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::{Action, Target, authenticated, authorize};

pub struct MembershipService<P, K, U> {
    projects: P,
    contributors: K,
    users: U,
}

impl<P, K, U> MembershipService<P, K, U>
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

    /// Load the project in the principal's tenant and gate `action`.
    async fn authorized_project(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
        action: Action,
    ) -> SoftdeskResult<(Principal, Project)> {
        let principal = *authenticated(principal)?;

        let project = self
            .projects
            .get_by_id(principal.tenant_id, project_id, true)
            .await
            .map_err(|err| match err {
                SoftdeskError::NotFound { .. } => SoftdeskError::InvalidProjectReference {
                    project_id: project_id.to_string(),
                },
                other => other,
            })?;

        let is_member = self
            .contributors
            .is_member(principal.tenant_id, project.id, principal.id)
            .await?;
        authorize(
            Some(&principal),
            action,
            &Target::object(project.author_id, is_member),
        )
        .inspect_err(|denied| debug!(?action, %project_id, %denied, "Membership change refused"))?;

        Ok((principal, project))
    }

    /// The candidate must be a user of the project's tenant.
    async fn require_tenant_user(&self, tenant_id: Uuid, user_id: Uuid) -> SoftdeskResult<()> {
        match self.users.get_by_id(tenant_id, user_id).await {
            Ok(_) => Ok(()),
            Err(SoftdeskError::NotFound { .. }) => Err(SoftdeskError::InvalidContributorReference {
                user_id: user_id.to_string(),
            }),
            Err(other) => Err(other),
        }
    }

    pub async fn add_contributor(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
        candidate_id: Uuid,
    ) -> SoftdeskResult<MembershipRecord> {
        let (principal, project) = self
            .authorized_project(principal, project_id, Action::AddContributor)
            .await?;
        self.require_tenant_user(principal.tenant_id, candidate_id)
            .await?;

        let record = self
            .contributors
            .add(principal.tenant_id, project.id, candidate_id)
            .await?;

        info!(
            tenant_id = %principal.tenant_id,
            %project_id,
            contributor_id = %candidate_id,
            "Contributor added"
        );
        Ok(record)
    }

    pub async fn remove_contributor(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
        candidate_id: Uuid,
    ) -> SoftdeskResult<()> {
        let (principal, project) = self
            .authorized_project(principal, project_id, Action::RemoveContributor)
            .await?;
        self.require_tenant_user(principal.tenant_id, candidate_id)
            .await?;

        self.contributors
            .remove(principal.tenant_id, project.id, candidate_id)
            .await?;

        info!(
            tenant_id = %principal.tenant_id,
            %project_id,
            contributor_id = %candidate_id,
            "Contributor removed"
        );
        Ok(())
    }

    pub async fn list_contributors(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<MembershipRecord>> {
        let (principal, project) = self
            .authorized_project(principal, project_id, Action::ListContributors)
            .await?;
        self.contributors
            .list(principal.tenant_id, project.id, pagination)
            .await
    }
}
