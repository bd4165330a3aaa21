//! Tenant domain model.
//!
//! A tenant (a "client" organization) isolates its users and projects from
//! every other tenant. Users join a tenant through the domain of their
//! email address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization whose users and projects are isolated from other tenants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    pub description: String,
    /// Email domain registered for this tenant (lowercase, e.g. `acme.com`).
    pub domain: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub description: String,
    pub domain: String,
}
