//! Comment domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Opaque, randomly generated.
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Project of the comment's issue, copied at creation.
    pub project_id: Uuid,
    pub issue_id: Uuid,
    pub description: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub issue_id: Uuid,
    pub description: String,
    pub author_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateComment {
    pub description: Option<String>,
    pub author_id: Option<Uuid>,
}

/// Filter set for comment queries. `tenant_id` and `issue_id` are always
/// applied.
#[derive(Debug, Clone)]
pub struct CommentQuery {
    pub tenant_id: Uuid,
    pub issue_id: Uuid,
    pub author_id: Option<Uuid>,
    pub visible_only: bool,
}
