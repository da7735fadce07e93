/// Project service
///
/// Reads are owner-scoped: a project owned by someone else is reported as
/// `NotFound`, exactly like a missing one. Mutations take the project the
/// caller already fetched and refuse with `Forbidden` if the caller is not its
/// owner.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::{CoreError, CoreResult};
use crate::models::project::{NewProject, Project, ProjectChanges, ProjectWithTaskCount};
use crate::models::user::User;
use crate::models::Page;
use crate::store::ProjectStore;

/// Fails with `Forbidden` unless `caller` owns `owner_id`
pub(crate) fn ensure_owner(owner_id: Uuid, caller: &User) -> CoreResult<()> {
    if owner_id == caller.id {
        Ok(())
    } else {
        Err(CoreError::Forbidden)
    }
}

#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectStore>,
}

impl ProjectService {
    pub fn new(projects: Arc<dyn ProjectStore>) -> Self {
        Self { projects }
    }

    pub async fn get(&self, project_id: Uuid, caller: &User) -> CoreResult<Project> {
        self.projects
            .find_owned(project_id, caller.id)
            .await?
            .ok_or(CoreError::NotFound)
    }

    pub async fn get_with_task_count(
        &self,
        project_id: Uuid,
        caller: &User,
    ) -> CoreResult<ProjectWithTaskCount> {
        let project = self.get(project_id, caller).await?;
        let task_count = self.projects.count_project_tasks(project.id, caller.id).await?;
        Ok(ProjectWithTaskCount {
            project,
            task_count,
        })
    }

    /// Caller's projects in creation order, optionally filtered by a
    /// case-insensitive substring of name or description
    pub async fn list(
        &self,
        caller: &User,
        search: Option<&str>,
        page: Page,
    ) -> CoreResult<Vec<Project>> {
        page.validate()?;
        Ok(self.projects.list_projects(caller.id, search, page).await?)
    }

    pub async fn count(&self, caller: &User, search: Option<&str>) -> CoreResult<i64> {
        Ok(self.projects.count_projects(caller.id, search).await?)
    }

    pub async fn create(&self, caller: &User, input: NewProject) -> CoreResult<Project> {
        input.validate()?;
        let project = self.projects.create_project(caller.id, &input).await?;
        info!(user_id = %caller.id, project_id = %project.id, "Project created");
        Ok(project)
    }

    /// Partial update; only provided fields change
    pub async fn update(
        &self,
        project: &Project,
        caller: &User,
        changes: ProjectChanges,
    ) -> CoreResult<Project> {
        ensure_owner(project.owner_id, caller)?;
        changes.validate()?;

        if changes.is_empty() {
            return Ok(project.clone());
        }

        let updated = self
            .projects
            .update_project(project.id, caller.id, &changes)
            .await?
            .ok_or(CoreError::NotFound)?;

        info!(user_id = %caller.id, project_id = %updated.id, "Project updated");
        Ok(updated)
    }

    /// Deletes the project and, through the storage cascade, its tasks
    pub async fn delete(&self, project: &Project, caller: &User) -> CoreResult<()> {
        ensure_owner(project.owner_id, caller)?;

        if !self.projects.delete_owned(project.id, caller.id).await? {
            return Err(CoreError::NotFound);
        }

        info!(user_id = %caller.id, project_id = %project.id, "Project deleted");
        Ok(())
    }
}
