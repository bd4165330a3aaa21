//! The authenticated actor of a request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and tenant membership of the caller, as supplied by the
/// authentication layer for every request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Principal {
    pub fn new(id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            id,
            tenant_id,
            is_staff: false,
            is_superuser: false,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }
}

impl From<&crate::models::user::User> for Principal {
    fn from(user: &crate::models::user::User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        }
    }
}
