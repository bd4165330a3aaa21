//! Authorization error types.

use softdesk_core::error::SoftdeskError;
use thiserror::Error;

/// Why a capability check refused an action. Returned by the first
/// failing requirement of the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denied {
    #[error("authentication credentials were not provided")]
    NotAuthenticated,

    #[error("only staff members may perform this action")]
    NotStaff,

    #[error("only superusers may perform this action")]
    NotSuperUser,

    #[error("you may only act on your own profile")]
    NotSelf,

    #[error("only the author may perform this action")]
    NotObjectAuthor,

    #[error("you are not a contributor of this project")]
    NotProjectContributor,

    #[error("only the author or a staff member may perform this action")]
    NotObjectAuthorOrStaff,
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error(transparent)]
    Denied(#[from] Denied),

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<Denied> for SoftdeskError {
    fn from(denied: Denied) -> Self {
        match denied {
            Denied::NotAuthenticated => SoftdeskError::AuthenticationFailed {
                reason: denied.to_string(),
            },
            _ => SoftdeskError::AuthorizationDenied {
                reason: denied.to_string(),
            },
        }
    }
}

impl From<AuthzError> for SoftdeskError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Denied(denied) => denied.into(),
            AuthzError::TokenExpired | AuthzError::TokenInvalid(_) => {
                SoftdeskError::AuthenticationFailed {
                    reason: err.to_string(),
                }
            }
            AuthzError::Crypto(msg) => SoftdeskError::Crypto(msg),
        }
    }
}
