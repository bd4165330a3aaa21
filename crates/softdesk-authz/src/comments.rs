//! Comment service.

use serde::{Deserialize, Serialize};
use softdesk_core::Principal;
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::comment::{Comment, CreateComment, UpdateComment};
use softdesk_core::repository::{CommentRepository, ContributorRepository, IssueRepository};
use softdesk_core::validation::require_non_empty;
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::{Action, Target, authenticated, authorize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    /// Required; a missing issue is rejected before any lookup.
    pub issue_id: Option<Uuid>,
    pub description: String,
}

pub struct CommentService<K, I, C> {
    contributors: K,
    issues: I,
    comments: C,
}

impl<K, I, C> CommentService<K, I, C>
where
    K: ContributorRepository,
    I: IssueRepository,
    C: CommentRepository,
{
    pub fn new(contributors: K, issues: I, comments: C) -> Self {
        Self {
            contributors,
            issues,
            comments,
        }
    }

    async fn load_authorized(
        &self,
        principal: &Principal,
        comment_id: Uuid,
        action: Action,
    ) -> SoftdeskResult<Comment> {
        let comment = self
            .comments
            .get_by_id(principal.tenant_id, comment_id, true)
            .await?;
        let is_member = self
            .contributors
            .is_member(principal.tenant_id, comment.project_id, principal.id)
            .await?;
        authorize(
            Some(principal),
            action,
            &Target::object(comment.author_id, is_member),
        )
        .inspect_err(|denied| debug!(?action, %comment_id, %denied, "Comment action refused"))?;
        Ok(comment)
    }

    /// Comment on an issue of a project the principal contributes to.
    pub async fn create_comment(
        &self,
        principal: Option<&Principal>,
        input: NewComment,
    ) -> SoftdeskResult<Comment> {
        let principal = authenticated(principal)?;
        let issue_id = input
            .issue_id
            .ok_or_else(|| SoftdeskError::validation("issue", "This field is required."))?;
        require_non_empty("description", &input.description)?;

        let issue = self
            .issues
            .get_by_id(principal.tenant_id, issue_id, true)
            .await?;
        let is_member = self
            .contributors
            .is_member(principal.tenant_id, issue.project_id, principal.id)
            .await?;
        authorize(
            Some(principal),
            Action::CreateComment,
            &Target::object(issue.author_id, is_member),
        )?;

        let comment = self
            .comments
            .create(CreateComment {
                tenant_id: principal.tenant_id,
                project_id: issue.project_id,
                issue_id: issue.id,
                description: input.description,
                author_id: principal.id,
            })
            .await?;

        info!(
            tenant_id = %principal.tenant_id,
            %issue_id,
            comment_id = %comment.id,
            "Comment created"
        );
        Ok(comment)
    }

    pub async fn get_comment(
        &self,
        principal: Option<&Principal>,
        comment_id: Uuid,
    ) -> SoftdeskResult<Comment> {
        let principal = authenticated(principal)?;
        self.load_authorized(principal, comment_id, Action::ReadComment)
            .await
    }

    pub async fn update_comment(
        &self,
        principal: Option<&Principal>,
        comment_id: Uuid,
        description: String,
    ) -> SoftdeskResult<Comment> {
        let principal = authenticated(principal)?;
        let comment = self
            .load_authorized(principal, comment_id, Action::UpdateComment)
            .await?;
        require_non_empty("description", &description)?;

        let comment = self
            .comments
            .update(
                principal.tenant_id,
                comment.id,
                UpdateComment {
                    description: Some(description),
                    author_id: None,
                },
            )
            .await?;
        info!(tenant_id = %principal.tenant_id, %comment_id, "Comment updated");
        Ok(comment)
    }

    /// Hand the comment to another contributor of its project.
    pub async fn transfer_comment(
        &self,
        principal: Option<&Principal>,
        comment_id: Uuid,
        new_author_id: Uuid,
    ) -> SoftdeskResult<Comment> {
        let principal = authenticated(principal)?;
        let comment = self
            .load_authorized(principal, comment_id, Action::TransferComment)
            .await?;

        if !self
            .contributors
            .is_member(principal.tenant_id, comment.project_id, new_author_id)
            .await?
        {
            return Err(SoftdeskError::validation(
                "author",
                "The user must be a contributor of the project.",
            ));
        }

        let comment = self
            .comments
            .update(
                principal.tenant_id,
                comment.id,
                UpdateComment {
                    description: None,
                    author_id: Some(new_author_id),
                },
            )
            .await?;
        info!(
            tenant_id = %principal.tenant_id,
            %comment_id,
            %new_author_id,
            "Comment transferred"
        );
        Ok(comment)
    }

    pub async fn delete_comment(
        &self,
        principal: Option<&Principal>,
        comment_id: Uuid,
    ) -> SoftdeskResult<()> {
        let principal = authenticated(principal)?;
        let comment = self
            .load_authorized(principal, comment_id, Action::DeleteComment)
            .await?;

        self.comments.delete(principal.tenant_id, comment.id).await?;
        info!(tenant_id = %principal.tenant_id, %comment_id, "Comment deleted");
        Ok(())
    }
}
