//! Capability primitives and the per-action requirement table.
//!
//! Every [`Action`] declares an ordered slice of [`Capability`]
//! requirements. [`authorize`] evaluates them in order and stops at the
//! first one that fails, returning its [`Denied`] reason.
//!
//! Capabilities only look at the principal and at a pre-loaded
//! [`Target`]. Loading the target is the caller's job and always happens
//! through tenant-filtered queries, so an out-of-tenant object never
//! reaches this module.

use softdesk_core::Principal;
use uuid::Uuid;

use crate::error::Denied;

/// A single permission primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    IsAuthenticated,
    IsStaff,
    IsSuperUser,
    /// The target user is the principal.
    IsSelf,
    /// The target object's author is the principal.
    IsObjectAuthor,
    /// The principal contributes to the target's project.
    IsProjectContributor,
    IsObjectAuthorOrStaff,
}

/// Every operation gated by the authorization rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateProject,
    ReadProject,
    UpdateProject,
    DeactivateProject,
    TransferProjectAuthorship,
    ListContributors,
    AddContributor,
    RemoveContributor,
    CreateIssue,
    ReadIssue,
    UpdateIssue,
    DeleteIssue,
    TransferIssue,
    CreateComment,
    ReadComment,
    UpdateComment,
    DeleteComment,
    TransferComment,
    ListUsers,
    CreateUser,
    DeleteUser,
    PromoteToStaff,
    ReadProfile,
    UpdateProfile,
}

use Capability::*;

impl Action {
    /// Requirements evaluated in order by [`authorize`].
    pub fn requirements(self) -> &'static [Capability] {
        match self {
            Action::CreateProject => &[IsAuthenticated],
            Action::ReadProject
            | Action::CreateIssue
            | Action::ReadIssue
            | Action::CreateComment
            | Action::ReadComment => &[IsAuthenticated, IsProjectContributor],
            Action::UpdateProject
            | Action::DeactivateProject
            | Action::TransferProjectAuthorship
            | Action::UpdateIssue
            | Action::DeleteIssue
            | Action::TransferIssue
            | Action::UpdateComment
            | Action::DeleteComment
            | Action::TransferComment => &[IsAuthenticated, IsObjectAuthor],
            Action::ListContributors | Action::AddContributor | Action::RemoveContributor => {
                &[IsAuthenticated, IsObjectAuthorOrStaff]
            }
            Action::ListUsers | Action::CreateUser | Action::DeleteUser => {
                &[IsAuthenticated, IsStaff]
            }
            Action::PromoteToStaff => &[IsAuthenticated, IsSuperUser],
            Action::ReadProfile | Action::UpdateProfile => &[IsAuthenticated, IsSelf],
        }
    }
}

/// What a capability check needs to know about the object acted upon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target {
    /// Author of the project, issue or comment.
    pub author_id: Option<Uuid>,
    /// User whose profile is addressed.
    pub user_id: Option<Uuid>,
    /// Whether the principal contributes to the enclosing project.
    pub principal_is_contributor: bool,
}

impl Target {
    /// No object: creation actions and tenant-wide staff actions.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// A project, issue or comment together with the principal's
    /// membership of its project.
    pub fn object(author_id: Uuid, principal_is_contributor: bool) -> Self {
        Self {
            author_id: Some(author_id),
            principal_is_contributor,
            ..Self::default()
        }
    }
}

impl Capability {
    fn check(self, principal: Option<&Principal>, target: &Target) -> Result<(), Denied> {
        let Some(principal) = principal else {
            return Err(Denied::NotAuthenticated);
        };
        let is_author = target.author_id == Some(principal.id);

        match self {
            IsAuthenticated => Ok(()),
            IsStaff if principal.is_staff => Ok(()),
            IsStaff => Err(Denied::NotStaff),
            IsSuperUser if principal.is_superuser => Ok(()),
            IsSuperUser => Err(Denied::NotSuperUser),
            IsSelf if target.user_id == Some(principal.id) => Ok(()),
            IsSelf => Err(Denied::NotSelf),
            IsObjectAuthor if is_author => Ok(()),
            IsObjectAuthor => Err(Denied::NotObjectAuthor),
            IsProjectContributor if target.principal_is_contributor => Ok(()),
            IsProjectContributor => Err(Denied::NotProjectContributor),
            IsObjectAuthorOrStaff if is_author || principal.is_staff => Ok(()),
            IsObjectAuthorOrStaff => Err(Denied::NotObjectAuthorOrStaff),
        }
    }
}

/// Evaluate `action`'s requirements in order, short-circuiting on the
/// first failure.
pub fn authorize(
    principal: Option<&Principal>,
    action: Action,
    target: &Target,
) -> Result<(), Denied> {
    action
        .requirements()
        .iter()
        .try_for_each(|capability| capability.check(principal, target))
}

pub fn can(principal: Option<&Principal>, action: Action, target: &Target) -> bool {
    authorize(principal, action, target).is_ok()
}

/// `IsAuthenticated` on its own, returning the principal for the loads
/// that precede the remaining checks.
pub fn authenticated(principal: Option<&Principal>) -> Result<&Principal, Denied> {
    principal.ok_or(Denied::NotAuthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn every_action_requires_authentication_first() {
        let actions = [
            Action::CreateProject,
            Action::ReadProject,
            Action::UpdateProject,
            Action::DeactivateProject,
            Action::TransferProjectAuthorship,
            Action::ListContributors,
            Action::AddContributor,
            Action::RemoveContributor,
            Action::CreateIssue,
            Action::ReadIssue,
            Action::UpdateIssue,
            Action::DeleteIssue,
            Action::TransferIssue,
            Action::CreateComment,
            Action::ReadComment,
            Action::UpdateComment,
            Action::DeleteComment,
            Action::TransferComment,
            Action::ListUsers,
            Action::CreateUser,
            Action::DeleteUser,
            Action::PromoteToStaff,
            Action::ReadProfile,
            Action::UpdateProfile,
        ];
        for action in actions {
            assert_eq!(action.requirements()[0], IsAuthenticated, "{action:?}");
            assert_eq!(
                authorize(None, action, &Target::none()),
                Err(Denied::NotAuthenticated)
            );
        }
    }

    #[test]
    fn any_authenticated_user_may_create_a_project() {
        assert!(can(Some(&alice()), Action::CreateProject, &Target::none()));
    }

    #[test]
    fn only_the_author_updates_a_project() {
        let p = alice();
        let own = Target::object(p.id, true);
        let other = Target::object(Uuid::new_v4(), true);
        assert!(can(Some(&p), Action::UpdateProject, &own));
        assert_eq!(
            authorize(Some(&p), Action::UpdateProject, &other),
            Err(Denied::NotObjectAuthor)
        );
        // Staff status does not substitute for authorship here.
        assert!(!can(Some(&p.staff()), Action::DeactivateProject, &other));
    }

    #[test]
    fn contributors_read_but_do_not_edit_others_issues() {
        let p = alice();
        let issue = Target::object(Uuid::new_v4(), true);
        assert!(can(Some(&p), Action::ReadIssue, &issue));
        assert!(!can(Some(&p), Action::UpdateIssue, &issue));

        let outsider = Target::object(Uuid::new_v4(), false);
        assert_eq!(
            authorize(Some(&p), Action::ReadIssue, &outsider),
            Err(Denied::NotProjectContributor)
        );
    }

    #[test]
    fn staff_manage_contributors_of_any_project() {
        let p = alice();
        let project = Target::object(Uuid::new_v4(), false);
        assert_eq!(
            authorize(Some(&p), Action::AddContributor, &project),
            Err(Denied::NotObjectAuthorOrStaff)
        );
        assert!(can(Some(&p.staff()), Action::AddContributor, &project));
        assert!(can(
            Some(&p),
            Action::RemoveContributor,
            &Target::object(p.id, true)
        ));
    }

    #[test]
    fn user_administration_is_staff_only() {
        let p = alice();
        assert_eq!(
            authorize(Some(&p), Action::DeleteUser, &Target::none()),
            Err(Denied::NotStaff)
        );
        assert!(can(Some(&p.staff()), Action::ListUsers, &Target::none()));
    }

    #[test]
    fn promotion_requires_superuser_not_staff() {
        let staff = alice().staff();
        assert_eq!(
            authorize(Some(&staff), Action::PromoteToStaff, &Target::none()),
            Err(Denied::NotSuperUser)
        );
        assert!(can(
            Some(&staff.superuser()),
            Action::PromoteToStaff,
            &Target::none()
        ));
    }

    #[test]
    fn profile_is_self_service() {
        let p = alice();
        assert!(can(Some(&p), Action::UpdateProfile, &Target::user(p.id)));
        assert_eq!(
            authorize(
                Some(&p.staff()),
                Action::ReadProfile,
                &Target::user(Uuid::new_v4())
            ),
            Err(Denied::NotSelf)
        );
    }

    #[test]
    fn authenticated_returns_the_principal() {
        let p = alice();
        assert_eq!(authenticated(Some(&p)), Ok(&p));
        assert_eq!(authenticated(None), Err(Denied::NotAuthenticated));
    }
}
