//! Resource scoping: which rows of each resource type a principal may
//! list.
//!
//! Every view threads the principal's tenant as an explicit filter and
//! carries a `visible_only` flag that hides rows of deactivated projects.
//! Required list filters are validated before any query runs.

use softdesk_core::Principal;
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::comment::{Comment, CommentQuery};
use softdesk_core::models::issue::{Issue, IssueQuery};
use softdesk_core::models::project::{Project, ProjectQuery, ProjectType};
use softdesk_core::repository::{
    CommentRepository, ContributorRepository, IssueRepository, PaginatedResult, Pagination,
    ProjectRepository,
};
use softdesk_core::validation::require_id;
use tracing::debug;
use uuid::Uuid;

/// Raw list filters as received from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    /// Project type (`type` parameter).
    pub kind: Option<String>,
    /// Project id (`project` or `project_id` parameter).
    pub project: Option<String>,
    /// Issue id (`issue` parameter).
    pub issue: Option<String>,
}

impl ListFilters {
    /// Build from query-string pairs. Unknown keys are ignored; a later
    /// value for the same key wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut filters = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "type" => filters.kind = Some(value.into()),
                "project" | "project_id" => filters.project = Some(value.into()),
                "issue" => filters.issue = Some(value.into()),
                _ => {}
            }
        }
        filters
    }

    fn kind(&self) -> SoftdeskResult<Option<ProjectType>> {
        self.kind.as_deref().map(str::parse).transpose()
    }
}

/// Project views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectView {
    /// Projects the principal contributes to.
    Member,
    /// Projects the principal authored (management view).
    Authored,
}

/// Issue and comment views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueView {
    /// Rows the principal authored.
    Authored,
    /// Every row of a project the principal contributes to.
    Resume,
}

pub type CommentView = IssueView;

/// Resource types accepted by [`ScopingEngine::visible_set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Projects(ProjectView),
    Issues(IssueView),
    Comments(CommentView),
}

/// Result of [`ScopingEngine::visible_set`].
#[derive(Debug, Clone)]
pub enum VisibleSet {
    Projects(PaginatedResult<Project>),
    Issues(PaginatedResult<Issue>),
    Comments(PaginatedResult<Comment>),
}

impl VisibleSet {
    pub fn total(&self) -> u64 {
        match self {
            VisibleSet::Projects(page) => page.total,
            VisibleSet::Issues(page) => page.total,
            VisibleSet::Comments(page) => page.total,
        }
    }
}

/// Computes the visible set of each resource type for a principal.
pub struct ScopingEngine<P, K, I, C> {
    projects: P,
    contributors: K,
    issues: I,
    comments: C,
}

impl<P, K, I, C> ScopingEngine<P, K, I, C>
where
    P: ProjectRepository,
    K: ContributorRepository,
    I: IssueRepository,
    C: CommentRepository,
{
    pub fn new(projects: P, contributors: K, issues: I, comments: C) -> Self {
        Self {
            projects,
            contributors,
            issues,
            comments,
        }
    }

    /// Dispatch raw filters to the typed view of `kind`. Listings use
    /// `visible_only = true`.
    pub async fn visible_set(
        &self,
        principal: &Principal,
        kind: ResourceKind,
        filters: &ListFilters,
        pagination: Pagination,
    ) -> SoftdeskResult<VisibleSet> {
        match kind {
            ResourceKind::Projects(view) => {
                let project_kind = filters.kind()?;
                self.projects(principal, view, project_kind, true, pagination)
                    .await
                    .map(VisibleSet::Projects)
            }
            ResourceKind::Issues(view) => {
                let project_id = require_id("project", filters.project.as_deref())?;
                self.issues(principal, view, project_id, true, pagination)
                    .await
                    .map(VisibleSet::Issues)
            }
            ResourceKind::Comments(view) => {
                let issue_id = require_id("issue", filters.issue.as_deref())?;
                self.comments(principal, view, issue_id, true, pagination)
                    .await
                    .map(VisibleSet::Comments)
            }
        }
    }

    pub async fn projects(
        &self,
        principal: &Principal,
        view: ProjectView,
        kind: Option<ProjectType>,
        visible_only: bool,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<Project>> {
        let query = match view {
            ProjectView::Member => ProjectQuery {
                contributor_id: Some(principal.id),
                kind,
                visible_only,
                ..ProjectQuery::for_tenant(principal.tenant_id)
            },
            ProjectView::Authored => ProjectQuery {
                author_id: Some(principal.id),
                kind,
                visible_only,
                ..ProjectQuery::for_tenant(principal.tenant_id)
            },
        };
        self.projects.list(query, pagination).await
    }

    pub async fn issues(
        &self,
        principal: &Principal,
        view: IssueView,
        project_id: Uuid,
        visible_only: bool,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<Issue>> {
        let author_id = match view {
            IssueView::Authored => Some(principal.id),
            IssueView::Resume => {
                self.require_membership(principal, project_id).await?;
                None
            }
        };
        let query = IssueQuery {
            tenant_id: principal.tenant_id,
            project_id,
            author_id,
            visible_only,
        };
        self.issues.list(query, pagination).await
    }

    pub async fn comments(
        &self,
        principal: &Principal,
        view: CommentView,
        issue_id: Uuid,
        visible_only: bool,
        pagination: Pagination,
    ) -> SoftdeskResult<PaginatedResult<Comment>> {
        let author_id = match view {
            IssueView::Authored => Some(principal.id),
            IssueView::Resume => {
                let issue = self
                    .issues
                    .get_by_id(principal.tenant_id, issue_id, true)
                    .await?;
                self.require_membership(principal, issue.project_id).await?;
                None
            }
        };
        let query = CommentQuery {
            tenant_id: principal.tenant_id,
            issue_id,
            author_id,
            visible_only,
        };
        self.comments.list(query, pagination).await
    }

    /// Resume views of a project the principal does not contribute to
    /// present as a missing project.
    async fn require_membership(
        &self,
        principal: &Principal,
        project_id: Uuid,
    ) -> SoftdeskResult<()> {
        self.projects
            .get_by_id(principal.tenant_id, project_id, true)
            .await?;
        if self
            .contributors
            .is_member(principal.tenant_id, project_id, principal.id)
            .await?
        {
            Ok(())
        } else {
            debug!(%project_id, user_id = %principal.id, "Resume view refused");
            Err(SoftdeskError::not_found("project", project_id))
        }
    }
}
