//! Issue service.
//!
//! Issue authors and assignees are always contributors of the issue's
//! project at the time they are set. An issue never moves to another
//! project.

use serde::{Deserialize, Serialize};
use softdesk_core::Principal;
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::issue::{
    Balise, CreateIssue, Issue, Priority, Progression, UpdateIssue,
};
use softdesk_core::repository::{ContributorRepository, IssueRepository, ProjectRepository};
use softdesk_core::validation::require_non_empty;
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::{Action, Target, authenticated, authorize};

const NAME_TAKEN: &str = "Issue already exists in this project";

/// A unique-index violation that slipped past the pre-check.
fn name_conflict(err: SoftdeskError) -> SoftdeskError {
    match err {
        SoftdeskError::AlreadyExists { .. } => SoftdeskError::validation("name", NAME_TAKEN),
        other => other,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
    /// Required; a missing project is rejected before any lookup.
    pub project_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    pub balise: Balise,
    #[serde(default)]
    pub progression: Progression,
    /// Assignee; defaults to the author.
    pub attribution_id: Option<Uuid>,
}

/// Content changes by the issue's author.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub balise: Option<Balise>,
    pub progression: Option<Progression>,
    /// Accepted only when equal to the stored project.
    pub project_id: Option<Uuid>,
}

/// New author and/or assignee.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueTransfer {
    pub author_id: Option<Uuid>,
    pub attribution_id: Option<Uuid>,
}

pub struct IssueService<P, K, I> {
    projects: P,
    contributors: K,
    issues: I,
}

impl<P, K, I> IssueService<P, K, I>
where
    P: ProjectRepository,
    K: ContributorRepository,
    I: IssueRepository,
{
    pub fn new(projects: P, contributors: K, issues: I) -> Self {
        Self {
            projects,
            contributors,
            issues,
        }
    }

    async fn is_member(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> SoftdeskResult<bool> {
        self.contributors
            .is_member(tenant_id, project_id, user_id)
            .await
    }

    /// `field` names the role the user is being given.
    async fn require_contributor(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        field: &str,
    ) -> SoftdeskResult<()> {
        if self.is_member(tenant_id, project_id, user_id).await? {
            Ok(())
        } else {
            Err(SoftdeskError::validation(
                field,
                "The user must be a contributor of the project.",
            ))
        }
    }

    async fn load_authorized(
        &self,
        principal: &Principal,
        issue_id: Uuid,
        action: Action,
    ) -> SoftdeskResult<Issue> {
        let issue = self
            .issues
            .get_by_id(principal.tenant_id, issue_id, true)
            .await?;
        let is_member = self
            .is_member(principal.tenant_id, issue.project_id, principal.id)
            .await?;
        authorize(
            Some(principal),
            action,
            &Target::object(issue.author_id, is_member),
        )
        .inspect_err(|denied| debug!(?action, %issue_id, %denied, "Issue action refused"))?;
        Ok(issue)
    }

    async fn ensure_name_free(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> SoftdeskResult<()> {
        require_non_empty("name", name)?;
        if self
            .issues
            .name_taken(tenant_id, project_id, name, exclude)
            .await?
        {
            return Err(SoftdeskError::validation("name", NAME_TAKEN));
        }
        Ok(())
    }

    /// File an issue in a project the principal contributes to.
    pub async fn create_issue(
        &self,
        principal: Option<&Principal>,
        input: NewIssue,
    ) -> SoftdeskResult<Issue> {
        let principal = authenticated(principal)?;
        let project_id = input
            .project_id
            .ok_or_else(|| SoftdeskError::validation("project", "This field is required."))?;

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
            .is_member(principal.tenant_id, project.id, principal.id)
            .await?;
        authorize(
            Some(principal),
            Action::CreateIssue,
            &Target::object(project.author_id, is_member),
        )?;

        let attribution_id = input.attribution_id.unwrap_or(principal.id);
        self.require_contributor(principal.tenant_id, project.id, attribution_id, "attribution")
            .await?;
        self.ensure_name_free(principal.tenant_id, project.id, &input.name, None)
            .await?;

        let issue = self
            .issues
            .create(CreateIssue {
                tenant_id: principal.tenant_id,
                project_id: project.id,
                name: input.name,
                description: input.description,
                priority: input.priority,
                balise: input.balise,
                progression: input.progression,
                author_id: principal.id,
                attribution_id,
            })
            .await
            .map_err(name_conflict)?;

        info!(
            tenant_id = %principal.tenant_id,
            %project_id,
            issue_id = %issue.id,
            "Issue created"
        );
        Ok(issue)
    }

    pub async fn get_issue(
        &self,
        principal: Option<&Principal>,
        issue_id: Uuid,
    ) -> SoftdeskResult<Issue> {
        let principal = authenticated(principal)?;
        self.load_authorized(principal, issue_id, Action::ReadIssue)
            .await
    }

    pub async fn update_issue(
        &self,
        principal: Option<&Principal>,
        issue_id: Uuid,
        changes: IssueChanges,
    ) -> SoftdeskResult<Issue> {
        let principal = authenticated(principal)?;
        let issue = self
            .load_authorized(principal, issue_id, Action::UpdateIssue)
            .await?;

        if changes.project_id.is_some_and(|p| p != issue.project_id) {
            return Err(SoftdeskError::validation(
                "project",
                "An issue cannot be moved to another project.",
            ));
        }
        if let Some(name) = changes.name.as_deref().filter(|n| *n != issue.name) {
            self.ensure_name_free(principal.tenant_id, issue.project_id, name, Some(issue.id))
                .await?;
        }

        let issue = self
            .issues
            .update(
                principal.tenant_id,
                issue.id,
                UpdateIssue {
                    name: changes.name,
                    description: changes.description,
                    priority: changes.priority,
                    balise: changes.balise,
                    progression: changes.progression,
                    author_id: None,
                    attribution_id: None,
                },
            )
            .await
            .map_err(name_conflict)?;
        info!(tenant_id = %principal.tenant_id, %issue_id, "Issue updated");
        Ok(issue)
    }

    /// Reassign author and/or assignee. Contributor membership is never
    /// changed by a transfer.
    pub async fn transfer_issue(
        &self,
        principal: Option<&Principal>,
        issue_id: Uuid,
        transfer: IssueTransfer,
    ) -> SoftdeskResult<Issue> {
        let principal = authenticated(principal)?;
        let issue = self
            .load_authorized(principal, issue_id, Action::TransferIssue)
            .await?;

        if let Some(author_id) = transfer.author_id {
            self.require_contributor(principal.tenant_id, issue.project_id, author_id, "author")
                .await?;
        }
        if let Some(attribution_id) = transfer.attribution_id {
            self.require_contributor(
                principal.tenant_id,
                issue.project_id,
                attribution_id,
                "attribution",
            )
            .await?;
        }

        let issue = self
            .issues
            .update(
                principal.tenant_id,
                issue.id,
                UpdateIssue {
                    author_id: transfer.author_id,
                    attribution_id: transfer.attribution_id,
                    ..Default::default()
                },
            )
            .await?;
        info!(
            tenant_id = %principal.tenant_id,
            %issue_id,
            author_id = %issue.author_id,
            attribution_id = %issue.attribution_id,
            "Issue transferred"
        );
        Ok(issue)
    }

    /// Author-only; the issue's comments go with it.
    pub async fn delete_issue(
        &self,
        principal: Option<&Principal>,
        issue_id: Uuid,
    ) -> SoftdeskResult<()> {
        let principal = authenticated(principal)?;
        let issue = self
            .load_authorized(principal, issue_id, Action::DeleteIssue)
            .await?;

        self.issues.delete(principal.tenant_id, issue.id).await?;
        info!(tenant_id = %principal.tenant_id, %issue_id, "Issue deleted");
        Ok(())
    }
}
