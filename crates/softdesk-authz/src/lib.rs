//! SoftDesk Authz: capability rules, tenant-aware resource scoping and
//! the services that apply them to projects, issues, comments,
//! contributors and users.

pub mod capability;
pub mod comments;
pub mod config;
pub mod directory;
pub mod error;
pub mod issues;
pub mod lifecycle;
pub mod membership;
pub mod projects;
pub mod scope;
pub mod token;

pub use capability::{Action, Capability, Target, authorize, can};
pub use comments::{CommentService, NewComment};
pub use config::AuthzConfig;
pub use directory::{Directory, NewUser, ProfileUpdate, SignUp};
pub use error::{AuthzError, Denied};
pub use issues::{IssueChanges, IssueService, IssueTransfer, NewIssue};
pub use lifecycle::LifecycleService;
pub use membership::MembershipService;
pub use projects::{NewProject, ProjectDetail, ProjectService};
pub use scope::{
    CommentView, IssueView, ListFilters, ProjectView, ResourceKind, ScopingEngine, VisibleSet,
};
pub use token::{PrincipalClaims, decode_principal, issue_principal_token};
