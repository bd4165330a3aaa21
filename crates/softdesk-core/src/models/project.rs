//! Project domain model.
//!
//! A project is owned by its author and shared with its contributors.
//! Projects are never deleted; deactivation hides them (and everything
//! filed under them) from non-administrative views.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SoftdeskError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProjectType {
    #[serde(rename = "Back-end")]
    Backend,
    #[serde(rename = "Front-end")]
    Frontend,
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "Android")]
    Android,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Backend => "Back-end",
            ProjectType::Frontend => "Front-end",
            ProjectType::Ios => "iOS",
            ProjectType::Android => "Android",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = SoftdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Back-end" => Ok(ProjectType::Backend),
            "Front-end" => Ok(ProjectType::Frontend),
            "iOS" => Ok(ProjectType::Ios),
            "Android" => Ok(ProjectType::Android),
            other => Err(SoftdeskError::validation(
                "type",
                format!("'{other}' is not a valid project type"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    /// Tenant of the author at creation time.
    pub tenant_id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    pub author_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a project. The author becomes its first
/// contributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub tenant_id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ProjectType>,
}

/// Filter set for project queries. `tenant_id` is always applied.
#[derive(Debug, Clone)]
pub struct ProjectQuery {
    pub tenant_id: Uuid,
    /// Only projects this user contributes to.
    pub contributor_id: Option<Uuid>,
    /// Only projects authored by this user.
    pub author_id: Option<Uuid>,
    pub kind: Option<ProjectType>,
    /// Exclude deactivated projects.
    pub visible_only: bool,
}

impl ProjectQuery {
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            contributor_id: None,
            author_id: None,
            kind: None,
            visible_only: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("Back-end".parse::<ProjectType>().unwrap(), ProjectType::Backend);
        assert_eq!("iOS".parse::<ProjectType>().unwrap(), ProjectType::Ios);
    }

    #[test]
    fn unknown_type_is_a_validation_error_on_type() {
        let err = "Desktop".parse::<ProjectType>().unwrap_err();
        assert_eq!(err.field(), "type");
    }

    #[test]
    fn serializes_kind_as_type() {
        let json = serde_json::to_value(UpdateProject {
            kind: Some(ProjectType::Frontend),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["type"], "Front-end");
    }
}
