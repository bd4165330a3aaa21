//! Tenant directory and user administration.
//!
//! A user's tenant is resolved once, from the email domain, when the
//! account is created. No later operation can move a user to another
//! tenant.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use softdesk_core::Principal;
use softdesk_core::error::{SoftdeskError, SoftdeskResult};
use softdesk_core::models::tenant::Tenant;
use softdesk_core::models::user::{CreateUser, UpdateUser, User};
use softdesk_core::repository::{PaginatedResult, Pagination, TenantRepository, UserRepository};
use softdesk_core::validation::{email_domain, require_non_empty, validate_min_age};
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::{Action, Target, authenticated, authorize};
use crate::config::AuthzConfig;

/// Self-registration input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUp {
    pub username: String,
    pub email: String,
    pub password: String,
    pub date_birth: NaiveDate,
    #[serde(default)]
    pub can_be_contacted: bool,
    #[serde(default)]
    pub can_data_be_collected: bool,
    #[serde(default)]
    pub can_data_be_shared: bool,
}

/// Staff-created account. `is_staff` may only be set by a superuser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(flatten)]
    pub account: SignUp,
    #[serde(default)]
    pub is_staff: bool,
}

/// Self-service profile changes.
///
/// `tenant_id` is accepted only so that an attempted change can be
/// rejected explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub date_birth: Option<NaiveDate>,
    pub can_be_contacted: Option<bool>,
    pub can_data_be_collected: Option<bool>,
    pub can_data_be_shared: Option<bool>,
    pub tenant_id: Option<Uuid>,
}

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "A user with that email already exists.";

/// Report a unique-index rejection on the field whose index fired.
fn account_conflict(err: SoftdeskError) -> SoftdeskError {
    match err {
        SoftdeskError::AlreadyExists {
            field: Some(field), ..
        } if field == "username" => SoftdeskError::validation("username", USERNAME_TAKEN),
        SoftdeskError::AlreadyExists {
            field: Some(field), ..
        } if field == "email" => SoftdeskError::validation("email", EMAIL_TAKEN),
        other => other,
    }
}

pub struct Directory<T, U> {
    tenants: T,
    users: U,
    config: AuthzConfig,
}

impl<T, U> Directory<T, U>
where
    T: TenantRepository,
    U: UserRepository,
{
    pub fn new(tenants: T, users: U, config: AuthzConfig) -> Self {
        Self {
            tenants,
            users,
            config,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Tenant registered for the domain after the last `@` of `email`.
    pub async fn resolve_tenant_for_email(&self, email: &str) -> SoftdeskResult<Tenant> {
        let domain = email_domain(email).ok_or_else(|| SoftdeskError::UnknownDomain {
            domain: email.trim().to_string(),
        })?;
        match self.tenants.get_by_domain(&domain).await {
            Ok(tenant) => Ok(tenant),
            Err(SoftdeskError::NotFound { .. }) => Err(SoftdeskError::UnknownDomain { domain }),
            Err(other) => Err(other),
        }
    }

    async fn register(&self, account: SignUp, is_staff: bool) -> SoftdeskResult<(Tenant, User)> {
        require_non_empty("username", &account.username)?;
        require_non_empty("password", &account.password)?;
        validate_min_age(account.date_birth, Self::today(), self.config.min_age_years)?;

        let tenant = self.resolve_tenant_for_email(&account.email).await?;

        match self.users.get_by_username(tenant.id, &account.username).await {
            Ok(_) => return Err(SoftdeskError::validation("username", USERNAME_TAKEN)),
            Err(SoftdeskError::NotFound { .. }) => {}
            Err(other) => return Err(other),
        }

        let user = self
            .users
            .create(CreateUser {
                tenant_id: tenant.id,
                username: account.username,
                email: account.email.trim().to_string(),
                password: account.password,
                is_staff,
                is_superuser: false,
                date_birth: account.date_birth,
                can_be_contacted: account.can_be_contacted,
                can_data_be_collected: account.can_data_be_collected,
                can_data_be_shared: account.can_data_be_shared,
            })
            .await
            .map_err(account_conflict)?;

        Ok((tenant, user))
    }

    /// Self-registration. The account is never staff.
    pub async fn sign_up(&self, input: SignUp) -> SoftdeskResult<User> {
        let (tenant, user) = self.register(input, false).await?;
        info!(tenant_id = %tenant.id, user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Staff-created account, restricted to the staff member's tenant.
    pub async fn create_user(
        &self,
        principal: Option<&Principal>,
        input: NewUser,
    ) -> SoftdeskResult<User> {
        authorize(principal, Action::CreateUser, &Target::none())?;
        let principal = authenticated(principal)?;

        if input.is_staff && !principal.is_superuser {
            return Err(SoftdeskError::AuthorizationDenied {
                reason: "only superusers may create staff accounts".into(),
            });
        }

        let tenant = self.resolve_tenant_for_email(&input.account.email).await?;
        if tenant.id != principal.tenant_id {
            debug!(staff_id = %principal.id, "Cross-tenant account creation refused");
            return Err(SoftdeskError::AuthorizationDenied {
                reason: "the email domain belongs to another client".into(),
            });
        }

        let (tenant, user) = self.register(input.account, input.is_staff).await?;
        info!(
            tenant_id = %tenant.id,
            user_id = %user.id,
            created_by = %principal.id,
            "User created"
        );
        Ok(user)
    }

    /// Staff lookup within the staff member's tenant.
    pub async fn get_user(
        &self,
        principal: Option<&Principal>,
        user_id: Uuid,
    ) -> SoftdeskResult<User> {
        authorize(principal, Action::ListUsers, &Target::none())?;
        let principal = authenticated(principal)?;
        self.users.get_by_id(principal.tenant_id, user_id).await
    }

    /// Users of the caller's tenant. Without `pagination` the first page of
    /// the configured default size is returned.
    pub async fn list_users(
        &self,
        principal: Option<&Principal>,
        pagination: Option<Pagination>,
    ) -> SoftdeskResult<PaginatedResult<User>> {
        authorize(principal, Action::ListUsers, &Target::none())?;
        let principal = authenticated(principal)?;
        let pagination = pagination.unwrap_or_else(|| self.config.first_page());
        self.users.list(principal.tenant_id, pagination).await
    }

    pub async fn read_profile(
        &self,
        principal: Option<&Principal>,
        user_id: Uuid,
    ) -> SoftdeskResult<User> {
        authorize(principal, Action::ReadProfile, &Target::user(user_id))?;
        let principal = authenticated(principal)?;
        self.users.get_by_id(principal.tenant_id, user_id).await
    }

    pub async fn update_profile(
        &self,
        principal: Option<&Principal>,
        user_id: Uuid,
        input: ProfileUpdate,
    ) -> SoftdeskResult<User> {
        authorize(principal, Action::UpdateProfile, &Target::user(user_id))?;
        let principal = authenticated(principal)?;

        if input.tenant_id.is_some_and(|t| t != principal.tenant_id) {
            return Err(SoftdeskError::validation(
                "tenant",
                "The client of a user cannot be changed.",
            ));
        }
        if let Some(username) = &input.username {
            require_non_empty("username", username)?;
        }
        if let Some(date_birth) = input.date_birth {
            validate_min_age(date_birth, Self::today(), self.config.min_age_years)?;
        }
        if let Some(email) = &input.email {
            let tenant = self.resolve_tenant_for_email(email).await?;
            if tenant.id != principal.tenant_id {
                return Err(SoftdeskError::validation(
                    "email",
                    "The email domain belongs to another client.",
                ));
            }
        }

        let user = self
            .users
            .update(
                principal.tenant_id,
                user_id,
                UpdateUser {
                    username: input.username,
                    email: input.email,
                    is_staff: None,
                    date_birth: input.date_birth,
                    can_be_contacted: input.can_be_contacted,
                    can_data_be_collected: input.can_data_be_collected,
                    can_data_be_shared: input.can_data_be_shared,
                },
            )
            .await
            .map_err(account_conflict)?;
        info!(tenant_id = %principal.tenant_id, %user_id, "Profile updated");
        Ok(user)
    }

    /// Superuser-only. The target is looked up in the superuser's tenant.
    pub async fn promote_to_staff(
        &self,
        principal: Option<&Principal>,
        user_id: Uuid,
    ) -> SoftdeskResult<User> {
        authorize(principal, Action::PromoteToStaff, &Target::none())?;
        let principal = authenticated(principal)?;

        let user = self.users.get_by_id(principal.tenant_id, user_id).await?;
        if user.is_staff {
            return Ok(user);
        }

        let user = self
            .users
            .update(
                principal.tenant_id,
                user.id,
                UpdateUser {
                    is_staff: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        info!(tenant_id = %principal.tenant_id, %user_id, "User promoted to staff");
        Ok(user)
    }
}
