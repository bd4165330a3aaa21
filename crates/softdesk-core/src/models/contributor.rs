//! Project membership model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A `(contributor, project)` pair. Unique per pair; a project always
/// keeps at least one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipRecord {
    pub project_id: Uuid,
    pub contributor_id: Uuid,
    pub created_at: DateTime<Utc>,
}
