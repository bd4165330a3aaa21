//! Project service: creation, reads and author-only management.

use serde::{Deserialize, Serialize};
use softdesk_core::Principal;
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::issue::{Issue, IssueQuery};
use softdesk_core::models::project::{CreateProject, Project, ProjectType, UpdateProject};
use softdesk_core::repository::{
    ContributorRepository, IssueRepository, Pagination, ProjectRepository, UserRepository,
};
use softdesk_core::validation::require_non_empty;
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::{Action, Target, authenticated, authorize};

const NAME_TAKEN: &str = "Project already exists";

/// A unique-index violation that slipped past the pre-check.
fn name_conflict(err: SoftdeskError) -> SoftdeskError {
    match err {
        SoftdeskError::AlreadyExists { .. } => SoftdeskError::validation("name", NAME_TAKEN),
        other => other,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
}

/// A project with the issues currently visible in it.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub issues: Vec<Issue>,
}

pub struct ProjectService<P, K, U, I> {
    projects: P,
    contributors: K,
    users: U,
    issues: I,
}

impl<P, K, U, I> ProjectService<P, K, U, I>
where
    P: ProjectRepository,
    K: ContributorRepository,
    U: UserRepository,
    I: IssueRepository,
{
    pub fn new(projects: P, contributors: K, users: U, issues: I) -> Self {
        Self {
            projects,
            contributors,
            users,
            issues,
        }
    }

    /// Load a project of the principal's tenant and gate `action` on it.
    async fn load_authorized(
        &self,
        principal: &Principal,
        project_id: Uuid,
        visible_only: bool,
        action: Action,
    ) -> SoftdeskResult<Project> {
        let project = self
            .projects
            .get_by_id(principal.tenant_id, project_id, visible_only)
            .await?;
        let is_member = self
            .contributors
            .is_member(principal.tenant_id, project.id, principal.id)
            .await?;
        authorize(
            Some(principal),
            action,
            &Target::object(project.author_id, is_member),
        )
        .inspect_err(|denied| debug!(?action, %project_id, %denied, "Project action refused"))?;
        Ok(project)
    }

    async fn ensure_name_free(
        &self,
        tenant_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> SoftdeskResult<()> {
        require_non_empty("name", name)?;
        if self.projects.name_taken(tenant_id, name, exclude).await? {
            return Err(SoftdeskError::validation("name", NAME_TAKEN));
        }
        Ok(())
    }

    /// Create a project authored by the principal, who becomes its first
    /// contributor.
    pub async fn create_project(
        &self,
        principal: Option<&Principal>,
        input: NewProject,
    ) -> SoftdeskResult<Project> {
        authorize(principal, Action::CreateProject, &Target::none())?;
        let principal = authenticated(principal)?;

        self.ensure_name_free(principal.tenant_id, &input.name, None)
            .await?;

        let project = self
            .projects
            .create(CreateProject {
                tenant_id: principal.tenant_id,
                author_id: principal.id,
                name: input.name,
                description: input.description,
                kind: input.kind,
            })
            .await
            .map_err(name_conflict)?;

        info!(
            tenant_id = %principal.tenant_id,
            project_id = %project.id,
            author_id = %principal.id,
            "Project created"
        );
        Ok(project)
    }

    pub async fn get_project(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
    ) -> SoftdeskResult<Project> {
        let principal = authenticated(principal)?;
        self.load_authorized(principal, project_id, true, Action::ReadProject)
            .await
    }

    /// The project together with its visible issues.
    pub async fn project_detail(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
        pagination: Pagination,
    ) -> SoftdeskResult<ProjectDetail> {
        let principal = authenticated(principal)?;
        let project = self
            .load_authorized(principal, project_id, true, Action::ReadProject)
            .await?;
        let issues = self
            .issues
            .list(
                IssueQuery {
                    tenant_id: principal.tenant_id,
                    project_id: project.id,
                    author_id: None,
                    visible_only: true,
                },
                pagination,
            )
            .await?;
        Ok(ProjectDetail {
            project,
            issues: issues.items,
        })
    }

    /// Author-only; applies to inactive projects too.
    pub async fn update_project(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
        input: UpdateProject,
    ) -> SoftdeskResult<Project> {
        let principal = authenticated(principal)?;
        let project = self
            .load_authorized(principal, project_id, false, Action::UpdateProject)
            .await?;

        if let Some(name) = input.name.as_deref().filter(|n| *n != project.name) {
            self.ensure_name_free(principal.tenant_id, name, Some(project.id))
                .await?;
        }

        let project = self
            .projects
            .update(principal.tenant_id, project.id, input)
            .await
            .map_err(name_conflict)?;
        info!(tenant_id = %principal.tenant_id, %project_id, "Project updated");
        Ok(project)
    }

    /// Hand the project to another user of the tenant, enrolling them as
    /// contributor when needed.
    pub async fn transfer_authorship(
        &self,
        principal: Option<&Principal>,
        project_id: Uuid,
        new_author_id: Uuid,
    ) -> SoftdeskResult<Project> {
        let principal = authenticated(principal)?;
        let project = self
            .load_authorized(
                principal,
                project_id,
                false,
                Action::TransferProjectAuthorship,
            )
            .await?;

        match self.users.get_by_id(principal.tenant_id, new_author_id).await {
            Ok(_) => {}
            Err(SoftdeskError::NotFound { .. }) => {
                return Err(SoftdeskError::InvalidContributorReference {
                    user_id: new_author_id.to_string(),
                });
            }
            Err(other) => return Err(other),
        }

        let project = self
            .projects
            .transfer_author(principal.tenant_id, project.id, new_author_id)
            .await?;
        info!(
            tenant_id = %principal.tenant_id,
            %project_id,
            %new_author_id,
            "Project authorship transferred"
        );
        Ok(project)
    }
}
