/// Project model
///
/// Projects are named containers for tasks. The owner is fixed at creation;
/// deleting a project deletes its tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Owned;

/// Project record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owned for Project {
    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// A project together with the number of tasks it holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectWithTaskCount {
    #[serde(flatten)]
    pub project: Project,
    pub task_count: i64,
}

/// Input for creating a project
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProject {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub name: String,

    pub description: Option<String>,
}

/// Partial update of a project
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProjectChanges {
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
}

impl ProjectChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }

    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_length() {
        let empty = NewProject {
            name: String::new(),
            description: None,
        };
        assert!(empty.validate().is_err());

        let ok = NewProject {
            name: "Home".to_string(),
            description: None,
        };
        assert!(ok.validate().is_ok());

        let long = NewProject {
            name: "x".repeat(256),
            description: None,
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_changes_distinguish_null_from_absent() {
        let absent: ProjectChanges = serde_json::from_str(r#"{"name":"Work"}"#).unwrap();
        assert!(absent.description.is_none());

        let cleared: ProjectChanges = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let empty_name = ProjectChanges {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(empty_name.validate().is_err());
    }
}
