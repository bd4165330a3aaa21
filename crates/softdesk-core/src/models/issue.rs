//! Issue domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SoftdeskError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl FromStr for Priority {
    type Err = SoftdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Priority::Low),
            "Medium" => Ok(Priority::Medium),
            "High" => Ok(Priority::High),
            other => Err(SoftdeskError::validation(
                "priority",
                format!("'{other}' is not a valid priority"),
            )),
        }
    }
}

/// Issue label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Balise {
    Bug,
    Task,
    Feature,
}

impl Balise {
    pub fn as_str(&self) -> &'static str {
        match self {
            Balise::Bug => "Bug",
            Balise::Task => "Task",
            Balise::Feature => "Feature",
        }
    }
}

impl FromStr for Balise {
    type Err = SoftdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bug" => Ok(Balise::Bug),
            "Task" => Ok(Balise::Task),
            "Feature" => Ok(Balise::Feature),
            other => Err(SoftdeskError::validation(
                "balise",
                format!("'{other}' is not a valid balise"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Progression {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    Finished,
}

impl Progression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Progression::ToDo => "To Do",
            Progression::InProgress => "In Progress",
            Progression::Finished => "Finished",
        }
    }
}

impl FromStr for Progression {
    type Err = SoftdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "To Do" => Ok(Progression::ToDo),
            "In Progress" => Ok(Progression::InProgress),
            "Finished" => Ok(Progression::Finished),
            other => Err(SoftdeskError::validation(
                "progression",
                format!("'{other}' is not a valid progression"),
            )),
        }
    }
}

impl fmt::Display for Progression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Fixed at creation; issues never move between projects.
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub balise: Balise,
    pub progression: Progression,
    pub author_id: Uuid,
    /// Assignee.
    pub attribution_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIssue {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub balise: Balise,
    pub progression: Progression,
    pub author_id: Uuid,
    pub attribution_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateIssue {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub balise: Option<Balise>,
    pub progression: Option<Progression>,
    pub author_id: Option<Uuid>,
    pub attribution_id: Option<Uuid>,
}

/// Filter set for issue queries. `tenant_id` and `project_id` are always
/// applied.
#[derive(Debug, Clone)]
pub struct IssueQuery {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    /// Only issues authored by this user.
    pub author_id: Option<Uuid>,
    /// Exclude issues of deactivated projects.
    pub visible_only: bool,
}
